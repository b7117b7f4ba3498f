//! The session loop: read a line, classify it, dispatch, stream the reply.
//!
//! Two entry modes share one chat-turn path. Interactive mode reads from the
//! attached terminal until `exit` or Ctrl-C at the prompt. Piped mode consumes
//! everything on stdin as a single turn (with any trailing CLI words appended
//! as an instruction) and then tries to reacquire the terminal so the
//! conversation can continue interactively.

use crate::commands::{interpret, CommandOutcome};
use crate::config::ConfigManager;
use crate::error::Result;
use crate::session::ChatSession;
use crate::stream::{consume_stream, StreamOutcome};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};

pub const USER_PROMPT: &str = "\x1b[1;34mYou: \x1b[0m";
pub const FOLLOW_UP_PROMPT: &str = "\x1b[1;34mYour prompts: \x1b[0m";
const ASSISTANT_PREFIX: &str = "\x1b[1;33mAI: \x1b[0m";

/// Result of one prompt-and-read.
#[derive(Debug, PartialEq, Eq)]
pub enum ReadOutcome {
    Line(String),
    /// EOF, or Ctrl-C while waiting at the prompt.
    Closed,
}

/// Line-oriented input source: stdin, the reacquired terminal, or (in tests)
/// any async reader.
pub struct LineReader {
    reader: BufReader<Box<dyn AsyncRead + Send + Unpin>>,
}

impl LineReader {
    pub fn stdin() -> Self {
        Self::from_reader(Box::new(tokio::io::stdin()))
    }

    /// Reopen the controlling terminal, for continuing interactively after
    /// piped input exhausted stdin.
    pub async fn tty() -> Result<Self> {
        let file = tokio::fs::File::open("/dev/tty").await?;
        Ok(Self::from_reader(Box::new(file)))
    }

    pub fn from_reader(reader: Box<dyn AsyncRead + Send + Unpin>) -> Self {
        Self {
            reader: BufReader::new(reader),
        }
    }

    /// Print the prompt and read one line. Ctrl-C while blocked on the read
    /// counts as closing the input.
    pub async fn prompt_line(&mut self, prompt: &str) -> Result<ReadOutcome> {
        print!("{prompt}");
        std::io::stdout().flush()?;

        let mut line = String::new();
        tokio::select! {
            _ = tokio::signal::ctrl_c() => Ok(ReadOutcome::Closed),
            read = self.reader.read_line(&mut line) => {
                if read? == 0 {
                    Ok(ReadOutcome::Closed)
                } else {
                    Ok(ReadOutcome::Line(line.trim().to_string()))
                }
            }
        }
    }
}

/// Run one chat round-trip: stream the reply and, on clean completion,
/// append it to the history. Per-turn API failures are reported inline and
/// the session continues.
pub async fn chat_turn(session: &mut ChatSession, prompt: &str) {
    print!("{ASSISTANT_PREFIX}");
    let _ = std::io::stdout().flush();

    let stream = session.stream_turn(prompt);
    let mut out = std::io::stdout();

    match consume_stream(stream, &mut out).await {
        Ok(StreamOutcome::Completed(reply)) => {
            if !reply.is_empty() {
                session.record_reply(reply);
            }
        }
        // Partial text was already rendered; it is deliberately not recorded.
        Ok(StreamOutcome::Interrupted(_)) => {}
        Err(e) => println!("\n[Error] {e}"),
    }
}

/// Interactive mode: prompt, classify, dispatch, repeat until exit.
pub async fn run_interactive(
    session: &mut ChatSession,
    config_manager: &ConfigManager,
    input: &mut LineReader,
) -> Result<()> {
    loop {
        let line = match input.prompt_line(USER_PROMPT).await? {
            ReadOutcome::Closed => {
                println!("\nGoodbye!");
                return Ok(());
            }
            ReadOutcome::Line(line) => line,
        };

        match interpret(&line, session, config_manager, input).await {
            CommandOutcome::Handled => {}
            CommandOutcome::Exit => {
                println!("Session ended.");
                return Ok(());
            }
            CommandOutcome::Chat(prompt) => chat_turn(session, &prompt).await,
        }
    }
}

/// Piped mode: read all of stdin, append any trailing CLI words as an
/// instruction, and submit exactly one turn.
pub async fn run_piped(session: &mut ChatSession, trailing: &[String]) -> Result<()> {
    let mut stdin = tokio::io::stdin();
    let mut piped = String::new();
    stdin.read_to_string(&mut piped).await?;
    let piped = piped.trim();

    if piped.is_empty() {
        println!(
            "\x1b[1;33mWarning:\x1b[0m No input received from pipe. \
             The previous command may have failed or not produced any output."
        );
        println!("If the previous command produced error messages, you can redirect stderr to stdout using:");
        println!("  previous_command 2>&1 | agent");
        return Ok(());
    }

    let instruction = trailing.join(" ");
    let instruction = instruction.trim();
    let prompt = if instruction.is_empty() {
        piped.to_string()
    } else {
        format!("{piped}\n\n{instruction}")
    };

    chat_turn(session, &prompt).await;
    Ok(())
}
