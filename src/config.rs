//! Configuration management for the agent CLI.
//!
//! Configuration is a JSON file holding the provider name, credentials, model
//! and system prompt. Discovery order: an explicit `--config` path, then
//! `./config.json`, then `~/.agent_cli/config.json`. When nothing usable is
//! found, an interactive first-run setup writes a fresh file.

use crate::error::{AgentError, Result};
use crate::llm::Provider;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// Persisted session configuration.
///
/// Owned by the active chat session; command handlers mutate it in place and
/// the gateway reads `model` per request, so changes apply on the next call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub provider: String,
    pub api_key: String,
    pub base_url: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub system_prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: Provider::DeepSeek.to_string(),
            api_key: String::new(),
            base_url: Provider::DeepSeek.default_base_url().to_string(),
            model: Provider::DeepSeek.default_model().to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            request_timeout_secs: None,
        }
    }
}

impl Config {
    /// Fill unset optional fields with provider-appropriate defaults.
    pub fn apply_defaults(&mut self) {
        if self.provider.is_empty() {
            self.provider = Provider::DeepSeek.to_string();
        }
        if self.model.is_empty() {
            let provider = Provider::from_name(&self.provider).unwrap_or(Provider::DeepSeek);
            self.model = provider.default_model().to_string();
        }
        if self.system_prompt.is_empty() {
            self.system_prompt = DEFAULT_SYSTEM_PROMPT.to_string();
        }
    }

    /// Whether the required fields carry real values rather than placeholders.
    pub fn is_usable(&self) -> bool {
        !self.api_key.is_empty()
            && !self.api_key.to_lowercase().starts_with("please")
            && !self.base_url.is_empty()
    }
}

/// Mask an API key for display: first 4 and last 4 characters only, or
/// `****` when the key is too short to mask meaningfully.
pub fn mask_api_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        "****".to_string()
    } else {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{head}...{tail}")
    }
}

/// Loads, creates, and updates the on-disk configuration.
pub struct ConfigManager {
    last_path: PathBuf,
}

impl ConfigManager {
    pub fn new() -> Result<Self> {
        Ok(Self {
            last_path: Self::default_config_path()?,
        })
    }

    /// `~/.agent_cli/config.json`, creating the directory when absent.
    pub fn default_config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| AgentError::Config("cannot determine home directory".to_string()))?;
        let config_dir = home.join(".agent_cli");
        if !config_dir.exists() {
            std::fs::create_dir_all(&config_dir)?;
        }
        Ok(config_dir.join("config.json"))
    }

    /// The path of the configuration file last read or written. `!apikey`
    /// persists back to this path.
    pub fn last_path(&self) -> &Path {
        &self.last_path
    }

    /// Load configuration, falling back to interactive first-run setup when no
    /// usable file is found.
    pub fn load(&mut self, explicit_path: Option<&Path>) -> Result<Config> {
        let local = Path::new("config.json");
        let config_file = match explicit_path {
            Some(path) if path.exists() => path.to_path_buf(),
            _ if local.exists() => local.to_path_buf(),
            _ => {
                let default_path = Self::default_config_path()?;
                if !default_path.exists() {
                    return self.interactive_setup(&default_path);
                }
                default_path
            }
        };
        debug!("Loading configuration from {}", config_file.display());

        let config = std::fs::read_to_string(&config_file)
            .ok()
            .and_then(|text| serde_json::from_str::<Config>(&text).ok());

        match config {
            Some(mut config) if config.is_usable() => {
                config.apply_defaults();
                self.last_path = config_file;
                Ok(config)
            }
            _ => {
                println!("Invalid configuration in {}", config_file.display());
                self.interactive_setup(&config_file)
            }
        }
    }

    /// Update the API key in the on-disk file, preserving any fields already
    /// present there and filling in the rest from the in-memory config.
    /// Returns the path written.
    pub fn persist_api_key(&self, api_key: &str, config: &Config) -> Result<PathBuf> {
        let mut on_disk: serde_json::Map<String, serde_json::Value> = self
            .last_path
            .exists()
            .then(|| std::fs::read_to_string(&self.last_path).ok())
            .flatten()
            .and_then(|text| serde_json::from_str(&text).ok())
            .unwrap_or_default();

        on_disk.insert("api_key".to_string(), serde_json::json!(api_key));

        if let serde_json::Value::Object(current) = serde_json::to_value(config)? {
            for (key, value) in current {
                on_disk.entry(key).or_insert(value);
            }
        }

        let text = serde_json::to_string_pretty(&on_disk)?;
        std::fs::write(&self.last_path, text + "\n")?;
        Ok(self.last_path.clone())
    }

    /// First-run setup: prompt for provider, credentials, model and system
    /// prompt, then write a fresh configuration file.
    fn interactive_setup(&mut self, path: &Path) -> Result<Config> {
        println!("\nNo valid config file found. Let's create one.");
        println!("\nAvailable providers:");
        println!("1. DeepSeek");
        println!("2. OpenAI");

        let choice = read_prompt("Select provider [1]: ")?;
        let provider = match choice.as_str() {
            "" | "1" => Provider::DeepSeek,
            "2" => Provider::OpenAi,
            _ => {
                println!("Invalid choice. Using DeepSeek as default.");
                Provider::DeepSeek
            }
        };

        let mut api_key = read_prompt(&format!("Please enter your {provider} API key: "))?;
        while api_key.is_empty() || api_key.to_lowercase().starts_with("please") {
            println!("Invalid API key. Please try again.");
            api_key = read_prompt(&format!("Please enter your {provider} API key: "))?;
        }

        let default_url = provider.default_base_url();
        let mut base_url =
            read_prompt(&format!("Please enter the API base URL [{default_url}]: "))?;
        if base_url.is_empty() {
            base_url = default_url.to_string();
        }

        let default_model = provider.default_model();
        let mut model = read_prompt(&format!("Please enter the model to use [{default_model}]: "))?;
        if model.is_empty() {
            model = default_model.to_string();
        }

        let mut system_prompt =
            read_prompt(&format!("Enter system prompt [{DEFAULT_SYSTEM_PROMPT}]: "))?;
        if system_prompt.is_empty() {
            system_prompt = DEFAULT_SYSTEM_PROMPT.to_string();
        }

        let config = Config {
            provider: provider.to_string(),
            api_key,
            base_url,
            model,
            system_prompt,
            request_timeout_secs: None,
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, serde_json::to_string_pretty(&config)? + "\n")?;
        println!("Configuration saved to {}.\n", path.display());

        self.last_path = path.to_path_buf();
        Ok(config)
    }
}

fn read_prompt(prompt: &str) -> Result<String> {
    print!("{prompt}");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}
