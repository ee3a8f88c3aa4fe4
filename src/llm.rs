//! Chat-completion client for the hosted model that writes reviews.
//!
//! Groq exposes the OpenAI chat-completions wire format, so any endpoint
//! speaking that format can be configured through `GROQ_BASE_URL`.

use async_trait::async_trait;
use serde_json::{json, Value};
use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_MODEL: &str = "llama-3.1-8b-instant";

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error (HTTP {status}): {body}")]
    Api { status: u16, body: String },
    #[error("Unexpected response: {0}")]
    ResponseParse(String),
    #[error("Missing API key: {0}")]
    MissingKey(String),
}

/// A stateless model: one system message plus one user message per call.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError>;
}

pub struct GroqClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GroqClient {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        api_key: String,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

fn parse_completion(body: &Value) -> Result<String, LlmError> {
    body.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| LlmError::ResponseParse("No message content in response".to_string()))
}

#[async_trait]
impl ChatModel for GroqClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
            "stream": false,
        });

        tracing::debug!(url = %url, model = %self.model, "Sending completion request");

        let resp = self.client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(LlmError::Api { status: status.as_u16(), body: text });
        }
        let json: Value = serde_json::from_str(&text)
            .map_err(|e| LlmError::ResponseParse(format!("Invalid JSON: {}", e)))?;
        parse_completion(&json)
    }
}
