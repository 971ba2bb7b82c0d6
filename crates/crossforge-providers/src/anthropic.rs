//! Anthropic messages API adapter.
//!
//! Registered as `claude` (architect, validator) and, with the same
//! credentials, as `dispatch`.

use async_trait::async_trait;
use crossforge_core::{Agent, AgentContext};
use serde_json::{json, Value};
use tracing::instrument;

use crate::error::{ProviderError, Result};
use crate::http;

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5";
pub const API_VERSION: &str = "2023-06-01";
pub const MAX_TOKENS: u32 = 8192;

pub struct AnthropicAgent {
    name: String,
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl AnthropicAgent {
    pub fn new(name: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            api_key: api_key.into(),
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            client: http::client()?,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        if self.api_key.is_empty() {
            return Err(ProviderError::MissingKey("anthropic".into()));
        }
        let request = self
            .client
            .post(http::join_url(&self.base_url, "messages"))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&build_request(&self.model, prompt));
        let body = http::send_json(request).await?;
        extract_text(&body)
    }
}

#[async_trait]
impl Agent for AnthropicAgent {
    #[instrument(skip_all, fields(agent = %self.name, model = %self.model))]
    async fn execute(&self, prompt: &str, _context: Option<&AgentContext>) -> crossforge_core::Result<String> {
        self.complete(prompt).await.map_err(|e| e.for_agent(&self.name))
    }

    async fn is_available(&self) -> bool {
        !self.api_key.is_empty()
    }
}

/// Messages API request body for a single user turn.
pub fn build_request(model: &str, prompt: &str) -> Value {
    json!({
        "model": model,
        "max_tokens": MAX_TOKENS,
        "messages": [{ "role": "user", "content": prompt }],
    })
}

/// Concatenated text of every `text` block in a messages API response.
pub fn extract_text(body: &Value) -> Result<String> {
    let blocks = body
        .get("content")
        .and_then(Value::as_array)
        .ok_or_else(|| ProviderError::Shape("missing 'content' array".into()))?;
    let text: String = blocks
        .iter()
        .filter(|b| b.get("type").and_then(Value::as_str).map_or(true, |t| t == "text"))
        .filter_map(|b| b.get("text").and_then(Value::as_str))
        .collect();
    if text.is_empty() && !blocks.is_empty() {
        return Err(ProviderError::Shape("no text block in 'content'".into()));
    }
    Ok(text)
}
