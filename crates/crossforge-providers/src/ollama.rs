//! Local Ollama adapter for the specialist stage.
//!
//! When the call context carries a `task`, the model is chosen by
//! [`route_model`] from the task's domain keywords.

use async_trait::async_trait;
use crossforge_core::{Agent, AgentContext};
use serde_json::{json, Value};
use tracing::{debug, instrument};

use crate::error::{ProviderError, Result};
use crate::http;

pub const DEFAULT_HOST: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "Mcrowe1210/DeepParallel";

/// Domain → specialist model.
pub const DOMAIN_MODELS: &[(&str, &str)] = &[
    ("physics", "Mcrowe1210/DeepParallel-Physics"),
    ("engineering", "Mcrowe1210/DeepParallel-Engineering"),
    ("drug_discovery", "Mcrowe1210/DeepParallel-Nemotron-DrugDiscovery"),
    ("computational", "Mcrowe1210/DeepParallel-Computational"),
    ("scientific", "Mcrowe1210/DeepParallel-Scientific-v3"),
    ("lifesci", "Mcrowe1210/DeepParallel-LifeSci"),
];

/// Domain → lowercase keywords, matched as substrings.
pub const DOMAIN_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "physics",
        &[
            "physics", "particle", "quantum", "collision", "dynamics", "thermodynamic",
            "electromagnetic", "gravity", "wave", "photon", "momentum",
        ],
    ),
    (
        "engineering",
        &[
            "structural", "mechanical", "load", "bearing", "circuit", "cad",
            "manufacturing", "tolerance", "material strength", "civil",
        ],
    ),
    (
        "drug_discovery",
        &[
            "drug", "molecular", "binding", "affinity", "compound", "pharmacol",
            "protein folding", "receptor", "inhibitor", "therapeutic",
        ],
    ),
    (
        "computational",
        &[
            "algorithm", "matrix", "parallel computing", "optimization",
            "computational complexity", "gpu compute", "numerical",
        ],
    ),
    (
        "scientific",
        &[
            "experiment", "hypothesis", "research", "scientific method",
            "data analysis", "statistical", "peer review",
        ],
    ),
    (
        "lifesci",
        &[
            "gene", "rna", "dna", "protein", "cell", "biolog", "genomic",
            "sequencing", "microbi", "enzyme", "metabol",
        ],
    ),
];

/// Specialist model for `task`: the domain with the most keyword hits,
/// earliest-declared on ties, or [`DEFAULT_MODEL`] with no hits.
pub fn route_model(task: &str) -> &'static str {
    let lower = task.to_lowercase();
    let mut best: Option<(&str, usize)> = None;
    for (domain, keywords) in DOMAIN_KEYWORDS {
        let hits = keywords.iter().filter(|kw| lower.contains(*kw)).count();
        if hits > 0 && best.map_or(true, |(_, n)| hits > n) {
            best = Some((*domain, hits));
        }
    }
    best.and_then(|(domain, _)| DOMAIN_MODELS.iter().find(|(d, _)| *d == domain))
        .map_or(DEFAULT_MODEL, |(_, model)| *model)
}

pub struct OllamaAgent {
    host: String,
    model: String,
    client: reqwest::Client,
}

impl OllamaAgent {
    pub fn new(host: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        Ok(Self {
            host: host.into(),
            model: model.into(),
            client: http::client()?,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Model for this call: routed from `context["task"]` when present.
    pub fn model_for(&self, context: Option<&AgentContext>) -> String {
        match context.and_then(|c| c.get("task")) {
            Some(Value::String(task)) => route_model(task).to_string(),
            Some(other) => route_model(&other.to_string()).to_string(),
            None => self.model.clone(),
        }
    }

    async fn chat(&self, model: &str, prompt: &str) -> Result<String> {
        let request = self
            .client
            .post(http::join_url(&self.host, "api/chat"))
            .json(&build_request(model, prompt));
        let body = http::send_json(request).await?;
        extract_text(&body)
    }
}

#[async_trait]
impl Agent for OllamaAgent {
    #[instrument(skip_all, fields(agent = "ollama", host = %self.host))]
    async fn execute(&self, prompt: &str, context: Option<&AgentContext>) -> crossforge_core::Result<String> {
        let model = self.model_for(context);
        debug!(model = %model, "ollama model selected");
        self.chat(&model, prompt).await.map_err(|e| e.for_agent("ollama"))
    }

    /// Lists local models; any failure means unavailable.
    async fn is_available(&self) -> bool {
        let request = self.client.get(http::join_url(&self.host, "api/tags"));
        http::send_json(request).await.is_ok()
    }
}

/// Non-streaming chat request for a single user turn.
pub fn build_request(model: &str, prompt: &str) -> Value {
    json!({
        "model": model,
        "stream": false,
        "messages": [{ "role": "user", "content": prompt }],
    })
}

/// `message.content` of a chat response.
pub fn extract_text(body: &Value) -> Result<String> {
    body.pointer("/message/content")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ProviderError::Shape("missing 'message.content'".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_by_keyword_hits() {
        assert_eq!(route_model("simulate particle collision dynamics"), "Mcrowe1210/DeepParallel-Physics");
        assert_eq!(route_model("RNA sequencing pipeline"), "Mcrowe1210/DeepParallel-LifeSci");
        assert_eq!(route_model("a todo app"), DEFAULT_MODEL);
    }

    #[test]
    fn test_route_tie_prefers_earlier_domain() {
        // one physics hit ("wave"), one engineering hit ("circuit")
        assert_eq!(route_model("circuit wave"), "Mcrowe1210/DeepParallel-Physics");
    }

    #[test]
    fn test_model_for_uses_context_task() {
        let agent = OllamaAgent::new(DEFAULT_HOST, "local-model").unwrap();
        assert_eq!(agent.model_for(None), "local-model");

        let mut ctx = AgentContext::new();
        ctx.insert("task".into(), json!("drug binding affinity"));
        assert_eq!(
            agent.model_for(Some(&ctx)),
            "Mcrowe1210/DeepParallel-Nemotron-DrugDiscovery"
        );
    }

    #[test]
    fn test_request_and_reply_shapes() {
        let req = build_request("m", "review");
        assert_eq!(req["stream"], false);
        assert_eq!(req["messages"][0]["content"], "review");

        let body = json!({ "message": { "role": "assistant", "content": "looks fine" } });
        assert_eq!(extract_text(&body).unwrap(), "looks fine");
        assert!(extract_text(&json!({ "error": "model not found" })).is_err());
    }

    #[tokio::test]
    async fn test_unreachable_host_is_unavailable() {
        let agent = OllamaAgent::new("http://127.0.0.1:9", DEFAULT_MODEL).unwrap();
        assert!(!agent.is_available().await);
    }
}
