use agent_cli::config::ConfigManager;
use agent_cli::llm::Provider;
use agent_cli::repl::{self, LineReader};
use agent_cli::session::ChatSession;
use anyhow::Context;
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Chat with DeepSeek or OpenAI from the terminal.
#[derive(Parser, Debug)]
#[command(name = "agent", version, about)]
struct Cli {
    /// Specify config file path
    #[arg(long)]
    config: Option<PathBuf>,

    /// LLM provider to use (overrides config)
    #[arg(long)]
    provider: Option<String>,

    /// Model to use (overrides config)
    #[arg(long)]
    model: Option<String>,

    /// Override system prompt
    #[arg(long)]
    system: Option<String>,

    /// Prompt text (when used with pipe input)
    prompt: Vec<String>,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    // Logs go to stderr so they never interleave with streamed replies.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config_manager = ConfigManager::new()?;
    let mut config = config_manager
        .load(cli.config.as_deref())
        .context("failed to load configuration")?;

    if let Some(provider) = cli.provider {
        config.provider = provider;
    }
    if let Some(model) = cli.model {
        config.model = model;
    }
    if let Some(system) = cli.system {
        config.system_prompt = system;
    }

    let provider = Provider::from_name(&config.provider)?;
    let mut session = ChatSession::new(provider, config)?;

    if std::io::stdin().is_terminal() {
        let mut input = LineReader::stdin();
        repl::run_interactive(&mut session, &config_manager, &mut input).await?;
    } else {
        repl::run_piped(&mut session, &cli.prompt).await?;
        match LineReader::tty().await {
            Ok(mut input) => {
                repl::run_interactive(&mut session, &config_manager, &mut input).await?;
            }
            Err(_) => {
                println!(
                    "[Warning] Failed to reopen /dev/tty, \
                     interactive mode may not work as expected."
                );
            }
        }
    }

    Ok(())
}
