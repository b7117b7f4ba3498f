//! In-session command interpretation and dispatch.
//!
//! Each input line is classified exactly once: empty lines re-prompt, a small
//! set of bare words (`exit`, `help`, `clear`) act on the session, lines
//! starting with `!` dispatch to a handler, and everything else — including an
//! unrecognized `!token` — is treated as a plain chat prompt.

use crate::config::{mask_api_key, ConfigManager};
use crate::llm::models::MessageRole;
use crate::llm::Conversation;
use crate::llm::Provider;
use crate::repl::{LineReader, ReadOutcome, FOLLOW_UP_PROMPT};
use crate::session::ChatSession;
use crate::shell::{run_shell_command, SHELL_TIMEOUT};
use std::path::Path;

const DEFAULT_SHELL_INSTRUCTION: &str = "Please help me understand or work with this output.";
const DEFAULT_FILE_INSTRUCTION: &str = "Please analyze these files and provide your observations.";
const PREVIEW_CHARS: usize = 200;
const SEPARATOR: &str = "----------------------------------------";

/// What the session loop should do with an interpreted line.
#[derive(Debug, PartialEq, Eq)]
pub enum CommandOutcome {
    /// The line was fully handled; read the next one.
    Handled,
    /// Terminate the session loop.
    Exit,
    /// Route this prompt through the normal chat path.
    Chat(String),
}

/// Classify one input line and run any side effects it requires.
pub async fn interpret(
    line: &str,
    session: &mut ChatSession,
    config_manager: &ConfigManager,
    input: &mut LineReader,
) -> CommandOutcome {
    if line.is_empty() {
        return CommandOutcome::Handled;
    }

    match line.to_lowercase().as_str() {
        "exit" | "quit" => return CommandOutcome::Exit,
        "help" => {
            print_help();
            return CommandOutcome::Handled;
        }
        "clear" => {
            session.clear_history();
            println!("Chat history cleared.");
            return CommandOutcome::Handled;
        }
        _ => {}
    }

    if line.starts_with('!') {
        let (cmd, args) = parse_command(line);
        match cmd.as_str() {
            "!config" => show_config(session),
            "!system" => change_system_prompt(session, args),
            "!save" => save_conversation(session, args),
            "!load" => println!("Loading conversations from files is not yet implemented."),
            "!provider" => switch_provider(session, args),
            "!model" => switch_model(session, args),
            "!apikey" => update_api_key(session, config_manager, args),
            "!bash" | "!sh" | "!cmd" => return handle_bash_command(args, input).await,
            "!file" | "!files" => return handle_file_command(args, input).await,
            // Not a known command: treat the line as literal chat text.
            _ => return CommandOutcome::Chat(line.to_string()),
        }
        return CommandOutcome::Handled;
    }

    CommandOutcome::Chat(line.to_string())
}

/// Split a bang-command line into its lower-cased command token and the
/// remainder, which keeps internal whitespace intact.
fn parse_command(line: &str) -> (String, &str) {
    match line.find(char::is_whitespace) {
        Some(idx) => (line[..idx].to_lowercase(), line[idx..].trim_start()),
        None => (line.to_lowercase(), ""),
    }
}

fn print_help() {
    println!("\n=== Agent CLI Help ===");
    println!("Available commands:");
    println!("  help          - Show this help message");
    println!("  clear         - Clear conversation history");
    println!("  exit, quit    - Exit the program");
    println!("  !config       - Show current configuration");
    println!("  !system TEXT  - Change system prompt for current session");
    println!("  !save PATH    - Save conversation history to file");
    println!("  !load PATH    - Load conversation history from file");
    println!("  !provider NAME - Switch provider");
    println!("  !model NAME   - Switch model");
    println!("  !apikey KEY   - Update API key in config file");
    println!("  !bash COMMAND - Execute bash command and include output in chat");
    println!("  !file PATH... - Load one or more files and discuss their content");
    println!("\nUsage tips:");
    println!("  - Press Ctrl+C to interrupt a long response");
    println!("  - Use pipes to process file content: cat file.txt | agent");
    println!("  - Add options to process file with instructions: cat file.txt | agent summarize this");
    println!("  - Execute commands and discuss results: !bash ls -la");
    println!("  - Analyze multiple files: !file file1.py file2.py \"path with spaces.txt\"");
    println!("==============================\n");
}

fn show_config(session: &ChatSession) {
    println!("\n=== Current Configuration ===");
    match serde_json::to_value(&session.config) {
        Ok(serde_json::Value::Object(fields)) => {
            for (key, value) in fields {
                if key == "api_key" {
                    println!("  {}: {}", key, mask_api_key(value.as_str().unwrap_or("")));
                } else if let Some(text) = value.as_str() {
                    println!("  {}: {}", key, text);
                } else {
                    println!("  {}: {}", key, value);
                }
            }
        }
        _ => println!("  (unavailable)"),
    }
    println!("==============================\n");
}

fn change_system_prompt(session: &mut ChatSession, prompt_text: &str) {
    if prompt_text.is_empty() {
        println!("System prompt cannot be empty. No changes made.");
        return;
    }

    session.set_system_prompt(prompt_text);
    println!("System prompt changed to: \"{prompt_text}\"");
    println!("Conversation history has been cleared with the new prompt.");
}

/// Render a conversation as the plain-text transcript format.
fn render_transcript(conversation: &Conversation) -> String {
    let mut out = String::new();
    for (i, msg) in conversation.snapshot().iter().enumerate() {
        match msg.role {
            MessageRole::System if i == 0 => {
                out.push_str(&format!("# System: {}\n\n", msg.content));
            }
            MessageRole::User => {
                out.push_str(&format!("## User:\n{}\n\n", msg.content));
            }
            MessageRole::Assistant => {
                out.push_str(&format!("## Assistant:\n{}\n\n", msg.content));
            }
            MessageRole::System => {}
        }
    }
    out
}

fn save_conversation(session: &ChatSession, filepath: &str) {
    if filepath.is_empty() {
        println!("Please specify a file path: !save /path/to/file.txt");
        return;
    }

    let transcript = render_transcript(session.conversation());
    match std::fs::write(filepath, transcript) {
        Ok(()) => println!("Conversation saved to {filepath}"),
        Err(e) => println!("Error saving conversation: {e}"),
    }
}

fn switch_provider(session: &mut ChatSession, provider_name: &str) {
    if provider_name.is_empty() {
        println!("Please specify a provider: !provider deepseek|openai");
        return;
    }

    let provider = match Provider::from_name(provider_name) {
        Ok(provider) => provider,
        Err(e) => {
            println!("Error: {e}");
            return;
        }
    };

    match session.switch_provider(provider) {
        Ok(next) => {
            *session = next;
            println!(
                "Switched to {} provider with model {}",
                provider, session.config.model
            );
        }
        Err(e) => println!("Error: {e}"),
    }
}

fn switch_model(session: &mut ChatSession, model_name: &str) {
    if model_name.is_empty() {
        println!("Please specify a model: !model MODEL_NAME");
        return;
    }

    session.config.model = model_name.to_string();
    println!("Switched to model: {model_name}");
    println!("Note: History is preserved, but model capabilities may differ");
}

fn update_api_key(session: &mut ChatSession, config_manager: &ConfigManager, api_key: &str) {
    if api_key.is_empty() {
        println!("Please provide an API key: !apikey YOUR_API_KEY_HERE");
        return;
    }

    session.config.api_key = api_key.to_string();

    match config_manager.persist_api_key(api_key, &session.config) {
        Ok(path) => {
            println!("API key updated and saved to {}", path.display());
            println!("New configuration will be used for future sessions and new API calls.");
            println!(
                "To apply the new API key to this session, use: !provider {}",
                session.config.provider
            );
        }
        Err(e) => println!("Error saving configuration: {e}"),
    }
}

/// Compose the structured prompt for a discussed shell command.
fn compose_shell_prompt(command: &str, output: &str, instruction: &str) -> String {
    let instruction = if instruction.is_empty() {
        DEFAULT_SHELL_INSTRUCTION
    } else {
        instruction
    };
    format!(
        "I executed the following bash command:\n```bash\n{command}\n```\n\n\
         Here's the output:\n```\n{output}\n```\n\n{instruction}"
    )
}

async fn handle_bash_command(command: &str, input: &mut LineReader) -> CommandOutcome {
    if command.is_empty() {
        println!("Please specify a command: !bash ls -la");
        return CommandOutcome::Handled;
    }

    println!("Executing: {command}");
    println!("{SEPARATOR}");

    let result = run_shell_command(command, SHELL_TIMEOUT).await;

    if !result.success && result.output.is_empty() {
        println!("Command failed: {}", result.error);
        return CommandOutcome::Handled;
    }

    if !result.output.is_empty() {
        println!("{}", result.output);
    }
    println!("{SEPARATOR}");

    let instruction = match input.prompt_line(FOLLOW_UP_PROMPT).await {
        Ok(ReadOutcome::Line(line)) => line,
        _ => {
            println!("\n[Cancelled]");
            return CommandOutcome::Handled;
        }
    };

    CommandOutcome::Chat(compose_shell_prompt(command, &result.output, &instruction))
}

/// Split file-command arguments into paths, honoring quoted segments so paths
/// with spaces survive. An unbalanced quote falls back to whitespace splitting.
fn split_file_tokens(args: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for ch in args.chars() {
        match quote {
            Some(q) if ch == q => quote = None,
            Some(_) => current.push(ch),
            None if ch == '"' || ch == '\'' => quote = Some(ch),
            None if ch.is_whitespace() => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            None => current.push(ch),
        }
    }

    if quote.is_some() {
        return args.split_whitespace().map(String::from).collect();
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest).to_string_lossy().into_owned();
        }
    }
    path.to_string()
}

/// Render one loaded file as a headed, language-fenced section.
fn render_file_section(path: &str, content: &str) -> String {
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("");

    if ext.is_empty() {
        format!("# Content of {path}:\n\n{content}\n")
    } else {
        format!("# Content of {path}:\n\n```{ext}\n{content}\n```\n")
    }
}

/// First `PREVIEW_CHARS` characters of the combined content, char-safe.
fn preview(content: &str) -> String {
    let truncated: String = content.chars().take(PREVIEW_CHARS).collect();
    if content.chars().count() > PREVIEW_CHARS {
        format!("{truncated}...")
    } else {
        truncated
    }
}

fn compose_file_prompt(combined: &str, instruction: &str) -> String {
    let instruction = if instruction.is_empty() {
        DEFAULT_FILE_INSTRUCTION
    } else {
        instruction
    };
    format!("{combined}\n\n{instruction}")
}

async fn handle_file_command(args: &str, input: &mut LineReader) -> CommandOutcome {
    if args.is_empty() {
        println!("Please specify at least one file path: !file path/to/file.txt [path/to/another.py]");
        return CommandOutcome::Handled;
    }

    let paths = split_file_tokens(args);
    if paths.is_empty() {
        println!("No valid file paths provided.");
        return CommandOutcome::Handled;
    }

    let mut sections = Vec::new();
    for path in &paths {
        println!("Loading file: {path}");
        match tokio::fs::read(expand_tilde(path)).await {
            Ok(bytes) => {
                // Undecodable bytes are replaced rather than rejected.
                let content = String::from_utf8_lossy(&bytes);
                sections.push(render_file_section(path, &content));
            }
            Err(e) => {
                println!("Error: Error reading file: {e}");
            }
        }
    }

    if sections.is_empty() {
        println!("No files were successfully loaded.");
        return CommandOutcome::Handled;
    }

    let combined = sections.join("\n\n");

    println!("\nPreview of loaded content:");
    println!("{SEPARATOR}");
    println!("{}", preview(&combined));
    println!("{SEPARATOR}");

    println!(
        "Loaded {} file(s). What would you like to ask or instruct about these files?",
        sections.len()
    );
    let instruction = match input.prompt_line(FOLLOW_UP_PROMPT).await {
        Ok(ReadOutcome::Line(line)) => line,
        _ => {
            println!("\n[Cancelled]");
            return CommandOutcome::Handled;
        }
    };

    println!("Sending files and instructions to AI...");
    CommandOutcome::Chat(compose_file_prompt(&combined, &instruction))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::error::Result;
    use crate::llm::gateway::{ChatGateway, TextStream};
    use crate::llm::models::ChatMessage;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct NullGateway;

    #[async_trait]
    impl ChatGateway for NullGateway {
        async fn complete(&self, _model: &str, _messages: &[ChatMessage]) -> Result<String> {
            Ok(String::new())
        }

        fn complete_stream<'a>(
            &'a self,
            _model: &'a str,
            _messages: &'a [ChatMessage],
        ) -> TextStream<'a> {
            Box::pin(futures::stream::empty())
        }
    }

    fn test_session() -> ChatSession {
        let config = Config {
            api_key: "sk-test-key-123456".to_string(),
            ..Config::default()
        };
        ChatSession::with_gateway(Provider::DeepSeek, Arc::new(NullGateway), config)
    }

    fn reader_with(input: &'static str) -> LineReader {
        LineReader::from_reader(Box::new(input.as_bytes()))
    }

    async fn interpret_line(line: &str, session: &mut ChatSession, input: &mut LineReader) -> CommandOutcome {
        let config_manager = ConfigManager::new().unwrap();
        interpret(line, session, &config_manager, input).await
    }

    #[test]
    fn test_parse_command_splits_on_first_whitespace() {
        assert_eq!(parse_command("!system You are terse"), ("!system".to_string(), "You are terse"));
        assert_eq!(parse_command("!BASH ls -la"), ("!bash".to_string(), "ls -la"));
        assert_eq!(parse_command("!config"), ("!config".to_string(), ""));
    }

    #[test]
    fn test_parse_command_keeps_internal_whitespace() {
        let (_, args) = parse_command("!bash echo  'two  spaces'");
        assert_eq!(args, "echo  'two  spaces'");
    }

    #[tokio::test]
    async fn test_empty_line_is_a_no_op() {
        let mut session = test_session();
        let mut input = reader_with("");
        let outcome = interpret_line("", &mut session, &mut input).await;
        assert_eq!(outcome, CommandOutcome::Handled);
    }

    #[tokio::test]
    async fn test_exit_and_quit_are_case_insensitive() {
        let mut session = test_session();
        let mut input = reader_with("");
        assert_eq!(interpret_line("exit", &mut session, &mut input).await, CommandOutcome::Exit);
        assert_eq!(interpret_line("QUIT", &mut session, &mut input).await, CommandOutcome::Exit);
        assert_eq!(interpret_line("Exit", &mut session, &mut input).await, CommandOutcome::Exit);
    }

    #[tokio::test]
    async fn test_clear_resets_history() {
        let mut session = test_session();
        session.record_reply("old reply");
        let mut input = reader_with("");

        let outcome = interpret_line("clear", &mut session, &mut input).await;

        assert_eq!(outcome, CommandOutcome::Handled);
        assert_eq!(session.conversation().len(), 1);
    }

    #[tokio::test]
    async fn test_plain_text_routes_to_chat() {
        let mut session = test_session();
        let mut input = reader_with("");

        let outcome = interpret_line("What is Rust?", &mut session, &mut input).await;

        assert_eq!(outcome, CommandOutcome::Chat("What is Rust?".to_string()));
    }

    #[tokio::test]
    async fn test_unrecognized_bang_falls_through_as_chat() {
        let mut session = test_session();
        let mut input = reader_with("");

        let outcome = interpret_line("!wat is this", &mut session, &mut input).await;

        assert_eq!(outcome, CommandOutcome::Chat("!wat is this".to_string()));
    }

    #[tokio::test]
    async fn test_system_command_resets_history() {
        let mut session = test_session();
        session.record_reply("old");
        let mut input = reader_with("");

        interpret_line("!system Answer briefly.", &mut session, &mut input).await;

        assert_eq!(session.conversation().len(), 1);
        assert_eq!(session.config.system_prompt, "Answer briefly.");
    }

    #[tokio::test]
    async fn test_system_command_without_text_changes_nothing() {
        let mut session = test_session();
        let before = session.config.system_prompt.clone();
        let mut input = reader_with("");

        interpret_line("!system", &mut session, &mut input).await;

        assert_eq!(session.config.system_prompt, before);
    }

    #[tokio::test]
    async fn test_model_command_preserves_history() {
        let mut session = test_session();
        session.record_reply("kept");
        let mut input = reader_with("");

        interpret_line("!model deepseek-reasoner", &mut session, &mut input).await;

        assert_eq!(session.config.model, "deepseek-reasoner");
        assert_eq!(session.conversation().len(), 2);
    }

    #[tokio::test]
    async fn test_provider_command_unknown_name_leaves_session_unchanged() {
        let mut session = test_session();
        let mut input = reader_with("");

        interpret_line("!provider mistral", &mut session, &mut input).await;

        assert_eq!(session.provider(), Provider::DeepSeek);
        assert_eq!(session.config.provider, "deepseek");
    }

    #[tokio::test]
    async fn test_provider_command_switches_and_keeps_history() {
        let mut session = test_session();
        session.record_reply("remembered");
        let mut input = reader_with("");

        interpret_line("!provider OpenAI", &mut session, &mut input).await;

        assert_eq!(session.provider(), Provider::OpenAi);
        assert_eq!(session.config.model, "gpt-3.5-turbo");
        assert_eq!(session.conversation().non_system().count(), 1);
    }

    #[tokio::test]
    async fn test_bash_echo_composes_prompt_with_fenced_output() {
        let mut session = test_session();
        // User declines a follow-up instruction; the default is used.
        let mut input = reader_with("\n");

        let outcome = interpret_line("!bash echo hello", &mut session, &mut input).await;

        match outcome {
            CommandOutcome::Chat(prompt) => {
                assert!(prompt.contains("```bash\necho hello\n```"));
                assert!(prompt.contains("```\nhello\n```"));
                assert!(prompt.contains(DEFAULT_SHELL_INSTRUCTION));
            }
            other => panic!("Expected Chat outcome, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_bash_failure_without_output_skips_the_model() {
        let mut session = test_session();
        let mut input = reader_with("\n");

        let outcome = interpret_line("!bash exit 7", &mut session, &mut input).await;

        assert_eq!(outcome, CommandOutcome::Handled);
    }

    #[tokio::test]
    async fn test_bash_without_command_gives_guidance() {
        let mut session = test_session();
        let mut input = reader_with("");

        let outcome = interpret_line("!bash", &mut session, &mut input).await;

        assert_eq!(outcome, CommandOutcome::Handled);
    }

    #[tokio::test]
    async fn test_file_with_nonexistent_path_skips_the_model() {
        let mut session = test_session();
        let mut input = reader_with("\n");

        let outcome =
            interpret_line("!file /no/such/file/anywhere.txt", &mut session, &mut input).await;

        assert_eq!(outcome, CommandOutcome::Handled);
    }

    #[tokio::test]
    async fn test_file_command_builds_fenced_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snippet.rs");
        std::fs::write(&path, "fn main() {}\n").unwrap();

        let mut session = test_session();
        let mut input = reader_with("explain this\n");
        let line = format!("!file {}", path.display());

        let outcome = interpret_line(&line, &mut session, &mut input).await;

        match outcome {
            CommandOutcome::Chat(prompt) => {
                assert!(prompt.contains(&format!("# Content of {}:", path.display())));
                assert!(prompt.contains("```rs\nfn main() {}"));
                assert!(prompt.ends_with("explain this"));
            }
            other => panic!("Expected Chat outcome, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_save_writes_transcript_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transcript.txt");

        let mut session = test_session();
        session.stream_turn("Hi"); // appends the user message
        session.record_reply("Hello");
        let mut input = reader_with("");
        let line = format!("!save {}", path.display());

        interpret_line(&line, &mut session, &mut input).await;

        let saved = std::fs::read_to_string(&path).unwrap();
        let user_pos = saved.find("## User:\nHi").unwrap();
        let assistant_pos = saved.find("## Assistant:\nHello").unwrap();
        assert!(saved.starts_with("# System: "));
        assert!(user_pos < assistant_pos);
    }

    #[test]
    fn test_split_file_tokens_plain() {
        assert_eq!(split_file_tokens("a.txt b.py"), vec!["a.txt", "b.py"]);
    }

    #[test]
    fn test_split_file_tokens_quoted_spaces() {
        assert_eq!(
            split_file_tokens("\"path with spaces.txt\" other.md"),
            vec!["path with spaces.txt", "other.md"]
        );
        assert_eq!(split_file_tokens("'single quoted.txt'"), vec!["single quoted.txt"]);
    }

    #[test]
    fn test_split_file_tokens_unbalanced_quote_falls_back() {
        assert_eq!(split_file_tokens("\"broken a.txt"), vec!["\"broken", "a.txt"]);
    }

    #[test]
    fn test_render_file_section_without_extension() {
        let section = render_file_section("Makefile", "all:\n");
        assert!(section.starts_with("# Content of Makefile:"));
        assert!(!section.contains("```"));
    }

    #[test]
    fn test_preview_truncates_long_content() {
        let long = "x".repeat(500);
        let p = preview(&long);
        assert_eq!(p.chars().count(), PREVIEW_CHARS + 3);
        assert!(p.ends_with("..."));
    }

    #[test]
    fn test_preview_is_char_safe_with_multibyte_text() {
        let long = "é".repeat(300);
        let p = preview(&long);
        assert!(p.ends_with("..."));
        assert_eq!(p.chars().count(), PREVIEW_CHARS + 3);
    }

    #[test]
    fn test_preview_keeps_short_content() {
        assert_eq!(preview("short"), "short");
    }

    #[test]
    fn test_compose_shell_prompt_with_explicit_instruction() {
        let prompt = compose_shell_prompt("ls", "a\nb", "what are these?");
        assert!(prompt.contains("```bash\nls\n```"));
        assert!(prompt.contains("```\na\nb\n```"));
        assert!(prompt.ends_with("what are these?"));
    }

    #[test]
    fn test_render_transcript_format() {
        let mut conversation = Conversation::new("Be helpful.");
        conversation.append(MessageRole::User, "Hi");
        conversation.append(MessageRole::Assistant, "Hello");

        let transcript = render_transcript(&conversation);

        assert_eq!(transcript, "# System: Be helpful.\n\n## User:\nHi\n\n## Assistant:\nHello\n\n");
    }
}
