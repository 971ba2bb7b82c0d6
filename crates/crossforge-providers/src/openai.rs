//! OpenAI-compatible chat completions: the `codex` builder and the NVIDIA
//! NIM accelerator.

use async_trait::async_trait;
use crossforge_core::{Agent, AgentContext};
use futures::future::join_all;
use serde_json::{json, Value};
use tracing::{instrument, warn};

use crate::error::{ProviderError, Result};
use crate::http;

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_CODEX_MODEL: &str = "gpt-5-codex";
pub const CODEX_MAX_TOKENS: u32 = 8192;

pub const NIM_BASE_URL: &str = "https://integrate.api.nvidia.com/v1";
pub const DEFAULT_NIM_MODEL: &str = "nvidia/nemotron-4-340b";
pub const NIM_MAX_TOKENS: u32 = 4096;
pub const NIM_TEMPERATURE: f64 = 0.1;
pub const NIM_BATCH_SIZE: usize = 5;

/// Knobs for one chat completion call.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatParams {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: Option<f64>,
}

pub struct OpenAiAgent {
    name: String,
    api_key: String,
    base_url: String,
    params: ChatParams,
    client: reqwest::Client,
}

impl OpenAiAgent {
    /// Codex builder against the OpenAI API, or `base_url` when given.
    pub fn codex(api_key: impl Into<String>, model: impl Into<String>, base_url: Option<String>) -> Result<Self> {
        Ok(Self {
            name: "codex".to_string(),
            api_key: api_key.into(),
            base_url: base_url.unwrap_or_else(|| OPENAI_BASE_URL.to_string()),
            params: ChatParams {
                model: model.into(),
                max_tokens: CODEX_MAX_TOKENS,
                temperature: None,
            },
            client: http::client()?,
        })
    }

    /// NIM endpoint with its lower token cap and near-greedy sampling.
    pub fn nim(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        Ok(Self {
            name: "nim".to_string(),
            api_key: api_key.into(),
            base_url: NIM_BASE_URL.to_string(),
            params: ChatParams {
                model: model.into(),
                max_tokens: NIM_MAX_TOKENS,
                temperature: Some(NIM_TEMPERATURE),
            },
            client: http::client()?,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn params(&self) -> &ChatParams {
        &self.params
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        if self.api_key.is_empty() {
            return Err(ProviderError::MissingKey(self.name.clone()));
        }
        let request = self
            .client
            .post(http::join_url(&self.base_url, "chat/completions"))
            .bearer_auth(&self.api_key)
            .json(&build_request(&self.params, prompt));
        let body = http::send_json(request).await?;
        extract_text(&body)
    }
}

#[async_trait]
impl Agent for OpenAiAgent {
    #[instrument(skip_all, fields(agent = %self.name, model = %self.params.model))]
    async fn execute(&self, prompt: &str, _context: Option<&AgentContext>) -> crossforge_core::Result<String> {
        self.complete(prompt).await.map_err(|e| e.for_agent(&self.name))
    }

    async fn is_available(&self) -> bool {
        !self.api_key.is_empty()
    }
}

/// Chat completions request body for a single user turn.
pub fn build_request(params: &ChatParams, prompt: &str) -> Value {
    let mut body = json!({
        "model": params.model,
        "max_tokens": params.max_tokens,
        "messages": [{ "role": "user", "content": prompt }],
    });
    if let Some(t) = params.temperature {
        body["temperature"] = json!(t);
    }
    body
}

/// `choices[0].message.content`; a null content is an empty reply.
pub fn extract_text(body: &Value) -> Result<String> {
    let message = body
        .pointer("/choices/0/message")
        .ok_or_else(|| ProviderError::Shape("missing 'choices[0].message'".into()))?;
    Ok(message
        .get("content")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string())
}

/// Marker returned when the accelerator stage cannot run.
pub fn nim_skipped(prompt: &str) -> String {
    let head: String = prompt.chars().take(100).collect();
    format!("[NIM_UNAVAILABLE] Stage 4 skipped. Prompt: {head}...")
}

/// The accelerator stage. Never fails: provider errors degrade to the
/// [`nim_skipped`] marker so downstream stages still run.
pub struct NimAgent {
    inner: OpenAiAgent,
    batch_size: usize,
}

impl NimAgent {
    pub fn new(inner: OpenAiAgent) -> Self {
        Self {
            inner,
            batch_size: NIM_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Run `prompts` in concurrent chunks of the batch size, preserving order.
    /// A failed call yields `"NIM error: ..."` in its slot.
    pub async fn batch_execute(&self, prompts: &[String]) -> Vec<String> {
        if !self.inner.is_available().await {
            return prompts.iter().map(|p| nim_skipped(p)).collect();
        }
        let mut replies = Vec::with_capacity(prompts.len());
        for chunk in prompts.chunks(self.batch_size) {
            let results = join_all(chunk.iter().map(|p| self.inner.complete(p))).await;
            replies.extend(results.into_iter().map(|r| match r {
                Ok(text) => text,
                Err(e) => format!("NIM error: {e}"),
            }));
        }
        replies
    }
}

#[async_trait]
impl Agent for NimAgent {
    async fn execute(&self, prompt: &str, _context: Option<&AgentContext>) -> crossforge_core::Result<String> {
        if !self.inner.is_available().await {
            return Ok(nim_skipped(prompt));
        }
        match self.inner.complete(prompt).await {
            Ok(text) => Ok(text),
            Err(e) => {
                warn!(agent = "nim", error = %e, "accelerator call failed, skipping stage");
                Ok(nim_skipped(prompt))
            }
        }
    }

    async fn is_available(&self) -> bool {
        self.inner.is_available().await
    }
}
