pub mod commands;
pub mod config;
pub mod error;
pub mod llm;
pub mod repl;
pub mod session;
pub mod shell;
pub mod stream;

pub use error::{AgentError, Result};
