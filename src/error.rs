//! Error types and result alias for the agent CLI.
//!
//! This module defines the core error type [`AgentError`] and the [`Result`] alias
//! used throughout the crate. Startup failures (bad configuration, unknown
//! provider) terminate the process; everything else is caught at the session
//! loop boundary and reported inline.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    #[error("Failed to initialize provider: {0}")]
    ProviderInit(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Shell execution error: {0}")]
    ShellExec(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AgentError>;
