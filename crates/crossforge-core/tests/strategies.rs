//! End-to-end behaviour of the built-in strategies against scripted agents.

use std::sync::Arc;

use crossforge_core::fakes::{FailingAgent, ScriptedAgent};
use crossforge_core::{
    Adversarial, AgentSet, CognitiveMesh, Consensus, Evolutionary, ForgeError, Pipeline, Strategy,
    VerificationLoop,
};

fn full_set() -> (AgentSet, Arc<ScriptedAgent>, Arc<ScriptedAgent>) {
    let claude = ScriptedAgent::fixed("claude code");
    let codex = ScriptedAgent::fixed("codex code");
    let agents = AgentSet::new()
        .with("claude", claude.clone())
        .with("codex", codex.clone())
        .with("ollama", ScriptedAgent::fixed("ollama review"))
        .with("dispatch", ScriptedAgent::fixed("final"));
    (agents, claude, codex)
}

#[tokio::test]
async fn adversarial_rounds_drive_build_and_attack_counts() {
    for rounds in 1..=3 {
        let (agents, claude, codex) = full_set();
        let out = Adversarial::new(rounds)
            .execute("parse a header", &agents, None)
            .await
            .unwrap();

        assert_eq!(out.get_u64("total_attacks"), Some(rounds as u64));
        assert_eq!(out.get_u64("rounds"), Some(rounds as u64));
        // one initial build plus a hardening pass between rounds
        assert_eq!(claude.call_count(), rounds);
        assert_eq!(codex.call_count(), rounds);
        assert_eq!(out.get_str("dispatch_output"), Some("final"));
    }
}

#[tokio::test]
async fn evolutionary_pads_short_crossover_output() {
    let claude = ScriptedAgent::fixed("only-one");
    let agents = AgentSet::new()
        .with("claude", claude)
        .with("codex", ScriptedAgent::fixed("b"))
        .with("dispatch", ScriptedAgent::fixed("winner"));

    let out = Evolutionary::new(4, 2)
        .execute("sort", &agents, None)
        .await
        .unwrap();
    let candidates = out.get_str_list("candidates");
    assert_eq!(candidates.len(), 4);
    assert!(candidates.iter().all(|c| c == "only-one"));
    assert_eq!(out.get_u64("generations"), Some(2));
    assert_eq!(out.get_u64("total_candidates_evaluated"), Some(8));
}

#[tokio::test]
async fn evolutionary_truncates_long_crossover_output() {
    let claude = ScriptedAgent::fixed("a\n---CANDIDATE---\nb\n---CANDIDATE---\nc\n---CANDIDATE---\nd");
    let agents = AgentSet::new()
        .with("claude", claude)
        .with("codex", ScriptedAgent::fixed("x"))
        .with("dispatch", ScriptedAgent::fixed("winner"));

    let out = Evolutionary::new(2, 3)
        .execute("sort", &agents, None)
        .await
        .unwrap();
    assert_eq!(out.get_str_list("candidates"), vec!["a", "b"]);
}

#[tokio::test]
async fn verification_loop_alternates_fixer_roles() {
    let (agents, claude, codex) = full_set();
    let out = VerificationLoop::new(3)
        .execute("rate limiter", &agents, None)
        .await
        .unwrap();

    // iteration 1: codex fixes, claude tests; iteration 2: claude fixes, codex tests
    let claude_prompts = claude.prompts();
    let codex_prompts = codex.prompts();
    assert_eq!(claude_prompts.len(), 3);
    assert_eq!(codex_prompts.len(), 3);
    assert!(codex_prompts[1].starts_with("Review this code against these tests."));
    assert!(claude_prompts[1].starts_with("The code has been updated."));
    assert!(claude_prompts[2].starts_with("Review this code against these tests."));
    assert!(codex_prompts[2].starts_with("The code has been updated."));
    assert_eq!(out.get_u64("code_versions"), Some(3));
    assert_eq!(out.get_u64("test_versions"), Some(3));
}

#[tokio::test]
async fn mesh_consults_every_worker() {
    let (agents, _, _) = full_set();
    let out = CognitiveMesh.execute("cache", &agents, None).await.unwrap();
    assert_eq!(out.get_u64("agents_consulted"), Some(3));
    let mut names: Vec<&str> = out.agent_outputs().map(|(name, _)| name).collect();
    names.sort_unstable();
    assert_eq!(names, vec!["claude", "codex", "dispatch", "ollama"]);
}

#[tokio::test]
async fn pipeline_without_specialist_skips_ollama() {
    let agents = AgentSet::new()
        .with("claude", ScriptedAgent::fixed("design"))
        .with("codex", ScriptedAgent::fixed("impl"))
        .with("dispatch", ScriptedAgent::fixed("ok"));
    let out = Pipeline::new(false).execute("queue", &agents, None).await.unwrap();
    assert_eq!(out.get_u64("stages_run"), Some(3));
    assert_eq!(out.get_str("build_output"), Some("impl"));
}

#[tokio::test]
async fn missing_role_fails_before_any_call() {
    let claude = ScriptedAgent::fixed("x");
    let agents = AgentSet::new().with("claude", claude.clone());
    let err = Consensus.execute("task", &agents, None).await.unwrap_err();
    assert!(matches!(err, ForgeError::MissingRole { ref role } if role == "codex"));
    assert_eq!(claude.call_count(), 0);
}

#[tokio::test]
async fn agent_failure_aborts_the_strategy() {
    let agents = AgentSet::new()
        .with("claude", ScriptedAgent::fixed("x"))
        .with("codex", FailingAgent::new("quota exceeded"))
        .with("dispatch", ScriptedAgent::fixed("y"));
    let err = Consensus.execute("task", &agents, None).await.unwrap_err();
    assert!(err.is_agent_failure());
}
