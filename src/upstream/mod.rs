//! Client for the upstream chat-completions API.
//!
//! One call per analysis: system prompt + user turn, JSON response format,
//! bearer auth. Upstream error statuses are passed through to the caller.

#[cfg(test)]
mod tests;
mod types;

pub use types::*;

use crate::error::RelayError;
use reqwest::Client;

/// Fallback message when the upstream error body carries none.
pub const GENERIC_UPSTREAM_ERROR: &str = "OpenAI API error";

/// Successful completion: the assistant text plus token usage when reported.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub content: String,
    pub usage: Option<Usage>,
}

/// Chat-completions client bound to one base URL, model and key.
#[derive(Clone)]
pub struct ChatClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl ChatClient {
    pub fn new(client: Client, base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            model: model.into(),
            api_key: None,
        }
    }

    /// Set the bearer key. Empty strings leave the client unconfigured.
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|k| !k.trim().is_empty());
        self
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    /// Send `messages` and return the first choice's content.
    pub async fn complete(&self, messages: Vec<ChatMessage>) -> Result<Completion, RelayError> {
        let api_key = self.api_key.as_deref().ok_or(RelayError::ApiKeyMissing)?;

        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages,
            response_format: ResponseFormat::json_object(),
        };

        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Upstream request failed: {}", e);
                RelayError::Request(e.to_string())
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| RelayError::Request(format!("failed to read body: {}", e)))?;

        if !status.is_success() {
            let message = upstream_error_message(&text);
            tracing::error!(status = status.as_u16(), "Upstream error: {}", message);
            return Err(RelayError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        let body: ChatCompletionResponse = serde_json::from_str(&text).map_err(|e| {
            RelayError::Parse(format!("{} | Response: {}", e, truncate(&text, 500)))
        })?;

        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| RelayError::Parse("upstream returned no message content".to_string()))?;

        Ok(Completion {
            content,
            usage: body.usage,
        })
    }
}

/// Pull `error.message` out of an upstream error body.
pub fn upstream_error_message(body: &str) -> String {
    serde_json::from_str::<UpstreamErrorBody>(body)
        .ok()
        .and_then(|b| b.error)
        .and_then(|e| e.message)
        .unwrap_or_else(|| GENERIC_UPSTREAM_ERROR.to_string())
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
