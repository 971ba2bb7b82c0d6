//! Provider agents plugged into the core engine, against endpoints that refuse
//! connections.

use std::sync::Arc;

use crossforge_core::{roles, AgentSet, Consensus, Engine, ForgeConfig, ForgeError};
use crossforge_providers::{
    detect_agents_with, AnthropicAgent, AuthManager, NimAgent, OpenAiAgent, ProviderAuth,
    ProviderSettings,
};

const DEAD: &str = "http://127.0.0.1:9";

fn keyed_manager() -> AuthManager {
    let lookup = |k: &str| match k {
        "ANTHROPIC_API_KEY" | "OPENAI_API_KEY" => Some("test-key".to_string()),
        _ => None,
    };
    AuthManager::from_auths(
        ["anthropic", "openai", "ollama", "nvidia"]
            .iter()
            .map(|p| ProviderAuth::from_lookup(p, lookup, |_| false)),
    )
}

#[test]
fn test_detected_roles_cover_consensus() {
    let agents = detect_agents_with(&keyed_manager(), &ProviderSettings::default());
    assert_eq!(agents.names(), vec!["claude", "codex", "ollama", "dispatch"]);

    let engine = Engine::with_agents(ForgeConfig::default(), agents);
    assert!(engine.missing_stages(&Consensus).is_empty());
}

#[tokio::test]
async fn test_unreachable_vendor_fails_the_run_with_hint() {
    let mut agents = AgentSet::new();
    agents.insert(
        roles::CLAUDE,
        Arc::new(AnthropicAgent::new(roles::CLAUDE, "k", "m").unwrap().with_base_url(DEAD)),
    );
    agents.insert(
        roles::CODEX,
        Arc::new(OpenAiAgent::codex("k", "m", Some(DEAD.to_string())).unwrap()),
    );
    agents.insert(
        roles::DISPATCH,
        Arc::new(AnthropicAgent::new(roles::DISPATCH, "k", "m").unwrap().with_base_url(DEAD)),
    );

    let engine = Engine::with_agents(ForgeConfig::default(), agents);
    let err = engine.run(&Consensus, "add two numbers", None).await.unwrap_err();

    match &err {
        ForgeError::StrategyFailed { source, .. } => assert!(source.is_agent_failure()),
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().contains("credentials"));
}

#[tokio::test]
async fn test_nim_without_key_never_fails() {
    let nim = NimAgent::new(OpenAiAgent::nim("", "m").unwrap());
    let replies = nim
        .batch_execute(&["first".to_string(), "second".to_string()])
        .await;
    assert_eq!(replies.len(), 2);
    assert!(replies.iter().all(|r| r.starts_with("[NIM_UNAVAILABLE]")));
}
