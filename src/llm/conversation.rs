//! Conversation history for a chat session.
//!
//! A conversation is a non-empty ordered message log whose first element is
//! always the active system prompt. Changing the system prompt resets the log
//! to a single new system message; prior history is deliberately discarded.

use crate::llm::models::{ChatMessage, MessageRole};

/// Ordered message log owned by the active chat session.
#[derive(Debug, Clone)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
}

impl Conversation {
    /// Create a conversation containing only the given system prompt.
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![ChatMessage::system(system_prompt)],
        }
    }

    /// Replace the log with a single system message.
    pub fn reset(&mut self, system_prompt: impl Into<String>) {
        self.messages = vec![ChatMessage::system(system_prompt)];
    }

    /// Append a message to the log.
    pub fn append(&mut self, role: MessageRole, content: impl Into<String>) {
        self.messages.push(ChatMessage {
            role,
            content: content.into(),
        });
    }

    /// The full ordered log, sent verbatim to the provider on every turn.
    pub fn snapshot(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// The user/assistant turns, in order. Used when replaying history into a
    /// freshly built session after a provider switch; the system message is
    /// never replayed.
    pub fn non_system(&self) -> impl Iterator<Item = &ChatMessage> {
        self.messages.iter().filter(|m| m.role != MessageRole::System)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
