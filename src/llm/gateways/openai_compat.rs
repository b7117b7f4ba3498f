//! Gateway for OpenAI-compatible chat completion APIs.
//!
//! Both supported providers (DeepSeek and OpenAI) expose the same
//! `/chat/completions` endpoint with bearer authentication, so one gateway
//! covers both; only the base URL and credentials differ.

use crate::error::{AgentError, Result};
use crate::llm::gateway::{ChatGateway, TextStream};
use crate::llm::models::ChatMessage;
use async_trait::async_trait;
use futures::stream::StreamExt;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// HTTP gateway to a single OpenAI-compatible endpoint.
pub struct OpenAiCompatGateway {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OpenAiCompatGateway {
    /// Build a gateway for the given endpoint.
    ///
    /// Fails with [`AgentError::ProviderInit`] when the transport cannot be
    /// constructed; an optional request timeout bounds each completion call.
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| AgentError::ProviderInit(e.to_string()))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into(),
        })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    async fn post_completion(&self, body: &Value) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(self.completions_url())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| AgentError::Api(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AgentError::Api(format!("{} - {}", status, error_text)));
        }

        Ok(response)
    }
}

#[async_trait]
impl ChatGateway for OpenAiCompatGateway {
    async fn complete(&self, model: &str, messages: &[ChatMessage]) -> Result<String> {
        debug!("Model: {}, message count: {}", model, messages.len());

        let body = serde_json::json!({
            "model": model,
            "messages": messages,
        });

        let response = self.post_completion(&body).await?;
        let response_body: Value =
            response.json().await.map_err(|e| AgentError::Api(e.to_string()))?;

        response_body["choices"][0]["message"]["content"]
            .as_str()
            .map(String::from)
            .ok_or_else(|| AgentError::Api("no content in response".to_string()))
    }

    fn complete_stream<'a>(
        &'a self,
        model: &'a str,
        messages: &'a [ChatMessage],
    ) -> TextStream<'a> {
        Box::pin(async_stream::stream! {
            debug!("Streaming; model: {}, message count: {}", model, messages.len());

            let body = serde_json::json!({
                "model": model,
                "messages": messages,
                "stream": true,
            });

            let response = match self.post_completion(&body).await {
                Ok(r) => r,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };

            // Process the SSE stream line by line
            let mut stream = response.bytes_stream();
            let mut buffer = String::new();

            while let Some(chunk_result) = stream.next().await {
                let bytes = match chunk_result {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        yield Err(AgentError::Api(e.to_string()));
                        return;
                    }
                };

                buffer.push_str(&String::from_utf8_lossy(&bytes));

                while let Some(line_end) = buffer.find('\n') {
                    let line = buffer[..line_end].trim().to_string();
                    buffer = buffer[line_end + 1..].to_string();

                    if line.is_empty() || !line.starts_with("data: ") {
                        continue;
                    }

                    let data = &line["data: ".len()..];
                    if data == "[DONE]" {
                        continue;
                    }

                    match serde_json::from_str::<Value>(data) {
                        Ok(json) => {
                            if let Some(content) =
                                json["choices"][0]["delta"]["content"].as_str()
                            {
                                if !content.is_empty() {
                                    yield Ok(content.to_string());
                                }
                            }
                        }
                        Err(e) => {
                            warn!("Failed to parse streaming chunk: {}", e);
                        }
                    }
                }
            }
        })
    }
}
