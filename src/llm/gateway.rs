use crate::error::Result;
use crate::llm::models::ChatMessage;
use async_trait::async_trait;
use futures::stream::Stream;
use std::pin::Pin;

/// A stream of incremental assistant text fragments.
pub type TextStream<'a> = Pin<Box<dyn Stream<Item = Result<String>> + Send + 'a>>;

/// Abstract interface to a chat-completion backend.
///
/// Both supported providers speak the same OpenAI-compatible wire format, so a
/// single implementation serves them; the trait exists as the seam for tests
/// and keeps the session loop independent of the transport.
#[async_trait]
pub trait ChatGateway: Send + Sync {
    /// Complete a request, returning the full assistant reply at once.
    async fn complete(&self, model: &str, messages: &[ChatMessage]) -> Result<String>;

    /// Complete a request as a stream of incremental text fragments,
    /// terminated when the provider closes the stream.
    fn complete_stream<'a>(&'a self, model: &'a str, messages: &'a [ChatMessage])
        -> TextStream<'a>;
}
