//! Crossforge provider adapters
//!
//! Concrete [`Agent`](crossforge_core::Agent) implementations for the model
//! vendors crossforge drives, plus credential discovery and the wiring that
//! turns available credentials into a role-keyed
//! [`AgentSet`](crossforge_core::AgentSet).
//!
//! | Role       | Backend                          |
//! |------------|----------------------------------|
//! | `claude`   | Anthropic messages API or CLI    |
//! | `codex`    | OpenAI chat completions or CLI   |
//! | `ollama`   | local Ollama server              |
//! | `nim`      | NVIDIA NIM (OpenAI-compatible)   |
//! | `dispatch` | Anthropic, same credentials      |

pub mod anthropic;
pub mod auth;
pub mod error;
pub mod http;
pub mod ollama;
pub mod openai;
pub mod passthrough;

use std::sync::Arc;

use crossforge_core::{roles, Agent, AgentSet};
use futures::future::join_all;
use tracing::{info, warn};

pub use anthropic::AnthropicAgent;
pub use auth::{AuthManager, AuthMethod, AuthStatus, ProviderAuth};
pub use error::{ProviderError, Result};
pub use ollama::OllamaAgent;
pub use openai::{NimAgent, OpenAiAgent};
pub use passthrough::CliAgent;

pub const CLAUDE_MODEL_VAR: &str = "CROSSFORGE_CLAUDE_MODEL";
pub const CODEX_MODEL_VAR: &str = "CROSSFORGE_CODEX_MODEL";
pub const NIM_MODEL_VAR: &str = "CROSSFORGE_NIM_MODEL";
pub const OLLAMA_MODEL_VAR: &str = "CROSSFORGE_OLLAMA_MODEL";
pub const OLLAMA_HOST_VAR: &str = "OLLAMA_HOST";
pub const OPENAI_BASE_URL_VAR: &str = "OPENAI_BASE_URL";

/// Model names and endpoints for each provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderSettings {
    pub claude_model: String,
    pub codex_model: String,
    pub nim_model: String,
    pub ollama_model: String,
    pub ollama_host: String,
    pub openai_base_url: Option<String>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            claude_model: anthropic::DEFAULT_MODEL.to_string(),
            codex_model: openai::DEFAULT_CODEX_MODEL.to_string(),
            nim_model: openai::DEFAULT_NIM_MODEL.to_string(),
            ollama_model: ollama::DEFAULT_MODEL.to_string(),
            ollama_host: ollama::DEFAULT_HOST.to_string(),
            openai_base_url: None,
        }
    }
}

impl ProviderSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();
        Self {
            claude_model: get(CLAUDE_MODEL_VAR).unwrap_or(defaults.claude_model),
            codex_model: get(CODEX_MODEL_VAR).unwrap_or(defaults.codex_model),
            nim_model: get(NIM_MODEL_VAR).unwrap_or(defaults.nim_model),
            ollama_model: get(OLLAMA_MODEL_VAR).unwrap_or(defaults.ollama_model),
            ollama_host: get(OLLAMA_HOST_VAR)
                .map(|h| with_scheme(&h))
                .unwrap_or(defaults.ollama_host),
            openai_base_url: get(OPENAI_BASE_URL_VAR),
        }
    }
}

/// `OLLAMA_HOST` is often given as `host:port`.
fn with_scheme(host: &str) -> String {
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("http://{host}")
    }
}

/// Agents for every provider `auth` reports available, with default settings.
pub fn detect_agents(auth: &AuthManager) -> AgentSet {
    detect_agents_with(auth, &ProviderSettings::from_env())
}

/// Agents for every provider `auth` reports available.
///
/// Registration order is `claude`, `codex`, `ollama`, `nim`, `dispatch`.
/// An adapter that cannot be constructed is logged and left out.
pub fn detect_agents_with(auth: &AuthManager, settings: &ProviderSettings) -> AgentSet {
    let mut agents = AgentSet::new();

    let anthropic = auth.get("anthropic");
    let claude = anthropic_agent(&anthropic, roles::CLAUDE, settings);
    let dispatch = anthropic_agent(&anthropic, roles::DISPATCH, settings);

    if let Some(agent) = claude {
        agents.insert(roles::CLAUDE, agent);
    }

    let openai_auth = auth.get("openai");
    let codex: Option<Arc<dyn Agent>> = match openai_auth.method {
        AuthMethod::ApiKey => build(
            roles::CODEX,
            OpenAiAgent::codex(
                openai_auth.api_key.clone(),
                settings.codex_model.clone(),
                settings.openai_base_url.clone(),
            ),
        ),
        AuthMethod::Cli => Some(Arc::new(CliAgent::openai(roles::CODEX, &settings.codex_model))),
        _ => None,
    };
    if let Some(agent) = codex {
        agents.insert(roles::CODEX, agent);
    }

    if auth.get("ollama").available {
        if let Some(agent) = build(
            roles::OLLAMA,
            OllamaAgent::new(settings.ollama_host.clone(), settings.ollama_model.clone()),
        ) {
            agents.insert(roles::OLLAMA, agent);
        }
    }

    let nvidia = auth.get("nvidia");
    if nvidia.method == AuthMethod::ApiKey {
        let nim = OpenAiAgent::nim(nvidia.api_key.clone(), settings.nim_model.clone()).map(NimAgent::new);
        if let Some(agent) = build(roles::NIM, nim) {
            agents.insert(roles::NIM, agent);
        }
    }

    if let Some(agent) = dispatch {
        agents.insert(roles::DISPATCH, agent);
    }

    info!(agents = ?agents.names(), "agents detected");
    agents
}

fn anthropic_agent(auth: &ProviderAuth, role: &str, settings: &ProviderSettings) -> Option<Arc<dyn Agent>> {
    match auth.method {
        AuthMethod::ApiKey => build(
            role,
            AnthropicAgent::new(role, auth.api_key.clone(), settings.claude_model.clone()),
        ),
        AuthMethod::Cli => Some(Arc::new(CliAgent::claude(role))),
        _ => None,
    }
}

fn build<A: Agent + 'static>(role: &str, agent: Result<A>) -> Option<Arc<dyn Agent>> {
    match agent {
        Ok(agent) => Some(Arc::new(agent)),
        Err(e) => {
            warn!(agent = %role, error = %e, "failed to construct agent");
            None
        }
    }
}

/// Keep only the agents whose liveness probe succeeds, probing concurrently.
pub async fn retain_available(agents: AgentSet) -> AgentSet {
    let probes = join_all(agents.iter().map(|(_, agent)| agent.is_available())).await;
    let mut live = AgentSet::new();
    for ((role, agent), ok) in agents.iter().zip(probes) {
        if ok {
            live.insert(role, agent.clone());
        } else {
            info!(agent = %role, "agent unavailable, dropped");
        }
    }
    live
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn manager(keys: &[(&str, &str)]) -> AuthManager {
        let map: HashMap<String, String> = keys
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AuthManager::from_auths(
            auth::PROVIDERS
                .iter()
                .map(|p| ProviderAuth::from_lookup(p, |k| map.get(k).cloned(), |_| false)),
        )
    }

    #[test]
    fn test_all_keys_register_every_role() {
        let auth = manager(&[
            ("ANTHROPIC_API_KEY", "a"),
            ("OPENAI_API_KEY", "o"),
            ("NVIDIA_API_KEY", "n"),
        ]);
        let agents = detect_agents_with(&auth, &ProviderSettings::default());
        assert_eq!(agents.names(), vec!["claude", "codex", "ollama", "nim", "dispatch"]);
    }

    #[test]
    fn test_no_keys_leaves_only_ollama() {
        let agents = detect_agents_with(&manager(&[]), &ProviderSettings::default());
        assert_eq!(agents.names(), vec!["ollama"]);
    }

    #[test]
    fn test_settings_from_lookup() {
        let vars: HashMap<&str, &str> = [
            (CLAUDE_MODEL_VAR, "claude-x"),
            (OLLAMA_HOST_VAR, "10.0.0.5:11434"),
            (OPENAI_BASE_URL_VAR, " "),
        ]
        .into_iter()
        .collect();
        let settings = ProviderSettings::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(settings.claude_model, "claude-x");
        assert_eq!(settings.ollama_host, "http://10.0.0.5:11434");
        assert_eq!(settings.openai_base_url, None);
        assert_eq!(settings.codex_model, openai::DEFAULT_CODEX_MODEL);
    }

    #[tokio::test]
    async fn test_retain_available_drops_dead_agents() {
        let settings = ProviderSettings {
            ollama_host: "http://127.0.0.1:9".to_string(),
            ..ProviderSettings::default()
        };
        let agents = detect_agents_with(&manager(&[("OPENAI_API_KEY", "o")]), &settings);
        assert_eq!(agents.names(), vec!["codex", "ollama"]);
        let live = retain_available(agents).await;
        assert_eq!(live.names(), vec!["codex"]);
    }
}
