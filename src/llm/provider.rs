//! Provider selection and gateway construction.
//!
//! The set of backends is small and closed, so providers are a tagged enum
//! rather than trait objects per backend; both variants are served by the
//! shared OpenAI-compatible gateway and differ only in defaults and naming.

use crate::config::Config;
use crate::error::{AgentError, Result};
use crate::llm::gateways::OpenAiCompatGateway;
use std::fmt;
use std::time::Duration;

/// A named remote LLM backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    DeepSeek,
    OpenAi,
}

impl Provider {
    /// Resolve a provider from its configured name, case-insensitively.
    pub fn from_name(name: &str) -> Result<Self> {
        match name.to_lowercase().as_str() {
            "deepseek" => Ok(Provider::DeepSeek),
            "openai" => Ok(Provider::OpenAi),
            _ => Err(AgentError::UnknownProvider(name.to_string())),
        }
    }

    /// The model used when the configuration names none.
    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::DeepSeek => "deepseek-chat",
            Provider::OpenAi => "gpt-3.5-turbo",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Provider::DeepSeek => "https://api.deepseek.com",
            Provider::OpenAi => "https://api.openai.com/v1",
        }
    }

    /// Whether a model name looks like it belongs to this provider's family.
    ///
    /// Known rough edge: this is a plain name-prefix check, kept because the
    /// provider-switch rule depends on its observable behavior — on switch,
    /// the configured model is only overwritten when the outgoing provider
    /// claims it. A model the check misclassifies is carried over as-is.
    pub fn claims_model(&self, model: &str) -> bool {
        match self {
            Provider::DeepSeek => model.starts_with("deepseek"),
            Provider::OpenAi => model.starts_with("gpt-"),
        }
    }

    /// Build a gateway for this provider from the live configuration.
    pub fn build_gateway(&self, config: &Config) -> Result<OpenAiCompatGateway> {
        if config.api_key.is_empty() {
            return Err(AgentError::ProviderInit(format!(
                "no API key configured for {}",
                self
            )));
        }
        let base_url = if config.base_url.is_empty() {
            self.default_base_url()
        } else {
            &config.base_url
        };
        reqwest::Url::parse(base_url)
            .map_err(|e| AgentError::ProviderInit(format!("invalid base URL {base_url}: {e}")))?;

        let timeout = config.request_timeout_secs.map(Duration::from_secs);
        OpenAiCompatGateway::new(&config.api_key, base_url, timeout)
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::DeepSeek => write!(f, "deepseek"),
            Provider::OpenAi => write!(f, "openai"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_name_is_case_insensitive() {
        assert_eq!(Provider::from_name("deepseek").unwrap(), Provider::DeepSeek);
        assert_eq!(Provider::from_name("DeepSeek").unwrap(), Provider::DeepSeek);
        assert_eq!(Provider::from_name("OPENAI").unwrap(), Provider::OpenAi);
        assert_eq!(Provider::from_name("openai").unwrap(), Provider::OpenAi);
    }

    #[test]
    fn test_from_name_unknown_is_an_error() {
        match Provider::from_name("mistral") {
            Err(AgentError::UnknownProvider(name)) => assert_eq!(name, "mistral"),
            other => panic!("Expected UnknownProvider, got {:?}", other),
        }
    }

    #[test]
    fn test_default_models() {
        assert_eq!(Provider::DeepSeek.default_model(), "deepseek-chat");
        assert_eq!(Provider::OpenAi.default_model(), "gpt-3.5-turbo");
    }

    #[test]
    fn test_default_base_urls() {
        assert_eq!(Provider::DeepSeek.default_base_url(), "https://api.deepseek.com");
        assert_eq!(Provider::OpenAi.default_base_url(), "https://api.openai.com/v1");
    }

    #[test]
    fn test_claims_model() {
        assert!(Provider::DeepSeek.claims_model("deepseek-chat"));
        assert!(Provider::DeepSeek.claims_model("deepseek-reasoner"));
        assert!(!Provider::DeepSeek.claims_model("gpt-4"));

        assert!(Provider::OpenAi.claims_model("gpt-3.5-turbo"));
        assert!(Provider::OpenAi.claims_model("gpt-4o"));
        assert!(!Provider::OpenAi.claims_model("deepseek-chat"));
        assert!(!Provider::OpenAi.claims_model("o1"));
    }

    #[test]
    fn test_display_matches_config_names() {
        assert_eq!(Provider::DeepSeek.to_string(), "deepseek");
        assert_eq!(Provider::OpenAi.to_string(), "openai");
    }

    #[test]
    fn test_build_gateway_requires_api_key() {
        let config = Config {
            api_key: String::new(),
            ..Config::default()
        };

        match Provider::DeepSeek.build_gateway(&config) {
            Err(AgentError::ProviderInit(msg)) => assert!(msg.contains("deepseek")),
            other => panic!("Expected ProviderInit, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_build_gateway_rejects_bad_base_url() {
        let config = Config {
            api_key: "sk-test".to_string(),
            base_url: "not a url".to_string(),
            ..Config::default()
        };

        assert!(matches!(
            Provider::OpenAi.build_gateway(&config),
            Err(AgentError::ProviderInit(_))
        ));
    }

    #[test]
    fn test_build_gateway_falls_back_to_default_base_url() {
        let config = Config {
            api_key: "sk-test".to_string(),
            base_url: String::new(),
            ..Config::default()
        };

        assert!(Provider::DeepSeek.build_gateway(&config).is_ok());
    }
}
