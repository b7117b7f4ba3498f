//! Chat session: pairs a provider gateway with the live configuration and the
//! conversation history.
//!
//! A session is replaced wholesale on provider switch — a new value is built
//! from the updated configuration and the old history is replayed into it —
//! rather than mutated in place.

use crate::config::Config;
use crate::error::Result;
use crate::llm::gateway::ChatGateway;
use crate::llm::{Conversation, MessageRole, Provider, TextStream};
use futures::stream::StreamExt;
use std::sync::Arc;

pub struct ChatSession {
    provider: Provider,
    gateway: Arc<dyn ChatGateway>,
    pub config: Config,
    conversation: Conversation,
}

impl ChatSession {
    /// Build a session from configuration, constructing the provider gateway.
    pub fn new(provider: Provider, config: Config) -> Result<Self> {
        let gateway = Arc::new(provider.build_gateway(&config)?);
        Ok(Self::with_gateway(provider, gateway, config))
    }

    /// Build a session over an existing gateway. Used by tests to substitute
    /// a mock backend.
    pub fn with_gateway(provider: Provider, gateway: Arc<dyn ChatGateway>, config: Config) -> Self {
        let conversation = Conversation::new(&config.system_prompt);
        Self {
            provider,
            gateway,
            config,
            conversation,
        }
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Append the user prompt and stream the assistant reply.
    ///
    /// The returned stream owns a snapshot of the history, so the session may
    /// be borrowed again once the caller has consumed it. The caller appends
    /// the accumulated reply via [`record_reply`](Self::record_reply) only
    /// after clean completion; interrupted or failed turns append nothing.
    pub fn stream_turn(&mut self, prompt: &str) -> TextStream<'static> {
        self.conversation.append(MessageRole::User, prompt);

        let gateway = Arc::clone(&self.gateway);
        let model = self.config.model.clone();
        let messages = self.conversation.snapshot().to_vec();

        Box::pin(async_stream::stream! {
            let mut inner = gateway.complete_stream(&model, &messages);
            while let Some(item) = inner.next().await {
                yield item;
            }
        })
    }

    /// Record a completed assistant reply in the history.
    pub fn record_reply(&mut self, content: impl Into<String>) {
        self.conversation.append(MessageRole::Assistant, content);
    }

    /// Reset the conversation to the configured system prompt.
    pub fn clear_history(&mut self) {
        self.conversation.reset(&self.config.system_prompt);
    }

    /// Set a new system prompt and reset the history under it.
    pub fn set_system_prompt(&mut self, prompt: impl Into<String>) {
        self.config.system_prompt = prompt.into();
        self.conversation.reset(&self.config.system_prompt);
    }

    /// Build a replacement session on another provider, carrying the history.
    ///
    /// The configured model is overwritten with the new provider's default
    /// only when the outgoing provider claims the current name; an explicit
    /// model from another family is carried over untouched. All user and
    /// assistant turns are replayed in order; the system message is not.
    pub fn switch_provider(&self, provider: Provider) -> Result<ChatSession> {
        let mut config = self.config.clone();
        config.provider = provider.to_string();
        if self.provider.claims_model(&config.model) || config.model.is_empty() {
            config.model = provider.default_model().to_string();
        }

        let mut next = ChatSession::new(provider, config)?;
        for message in self.conversation.non_system() {
            next.conversation.append(message.role, &message.content);
        }
        Ok(next)
    }
}
