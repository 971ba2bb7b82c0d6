//! The orchestration engine.
//!
//! Owns the registered agents, runs a strategy against them and normalises
//! the strategy's output mapping into a [`PipelineResult`].

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, Instrument};
use uuid::Uuid;

use crate::agent::{roles, Agent, AgentContext, AgentSet};
use crate::config::ForgeConfig;
use crate::domain::{
    stage_for_output, stages_for_role, AgentOutput, ConfidenceReport, ForgeError, PipelineResult,
    Result, Stage, StrategyOutput,
};
use crate::metrics::METRICS;
use crate::obs;
use crate::strategy::Strategy;

/// Agreement credited when Claude and Codex produce different text.
pub const PARTIAL_AGREEMENT: f64 = 0.7;

pub struct Engine {
    agents: AgentSet,
    config: ForgeConfig,
}

impl Engine {
    pub fn new(config: ForgeConfig) -> Self {
        Self {
            agents: AgentSet::new(),
            config,
        }
    }

    pub fn with_agents(config: ForgeConfig, agents: AgentSet) -> Self {
        Self { agents, config }
    }

    pub fn config(&self) -> &ForgeConfig {
        &self.config
    }

    pub fn agents(&self) -> &AgentSet {
        &self.agents
    }

    pub fn register_agent(&mut self, name: impl Into<String>, agent: Arc<dyn Agent>) {
        let name = name.into();
        debug!(agent = %name, "agent registered");
        self.agents.insert(name, agent);
    }

    /// Register `agent` only if its liveness probe succeeds. Returns whether
    /// it was registered.
    pub async fn register_if_available(&mut self, name: impl Into<String>, agent: Arc<dyn Agent>) -> bool {
        let name = name.into();
        if agent.is_available().await {
            self.register_agent(name, agent);
            true
        } else {
            info!(agent = %name, "agent unavailable, not registered");
            false
        }
    }

    pub fn available_agents(&self) -> Vec<String> {
        self.agents.names().into_iter().map(str::to_string).collect()
    }

    /// Stages covered by the registered roles, ascending.
    pub fn available_stages(&self) -> Vec<Stage> {
        let stages: BTreeSet<Stage> = self
            .agents
            .names()
            .into_iter()
            .flat_map(|name| stages_for_role(name).iter().copied())
            .collect();
        stages.into_iter().collect()
    }

    /// Required stages of `strategy` that no registered role covers.
    pub fn missing_stages(&self, strategy: &dyn Strategy) -> Vec<Stage> {
        let available = self.available_stages();
        let mut missing: Vec<Stage> = strategy
            .required_stages()
            .iter()
            .copied()
            .filter(|s| !available.contains(s))
            .collect();
        missing.sort();
        missing.dedup();
        missing
    }

    /// Run `strategy` on `task`.
    ///
    /// Any failure is wrapped in [`ForgeError::StrategyFailed`]; no partial
    /// result is returned.
    pub async fn run(
        &self,
        strategy: &dyn Strategy,
        task: &str,
        context: Option<&AgentContext>,
    ) -> Result<PipelineResult> {
        let run_id = Uuid::new_v4();
        let run_label = run_id.to_string();
        let span = obs::run_span(&run_label, strategy.name());
        obs::emit_strategy_started(&run_label, strategy.name(), self.agents.len());
        METRICS.inc_strategy_runs();

        let started = Instant::now();
        let agents = self.agents.guarded(self.config.call_timeout);
        let outcome = strategy
            .execute(task, &agents, context)
            .instrument(span)
            .await;
        let duration_ms = started.elapsed().as_millis() as u64;
        obs::emit_strategy_finished(&run_label, strategy.name(), duration_ms, outcome.is_ok());

        let output = outcome.map_err(|source| ForgeError::StrategyFailed {
            strategy: strategy.name().to_string(),
            source: Box::new(source),
        })?;
        Ok(self.normalize(run_id, strategy.name(), output))
    }

    /// Turn a strategy's named outputs into a [`PipelineResult`].
    pub fn normalize(&self, run_id: Uuid, strategy_name: &str, output: StrategyOutput) -> PipelineResult {
        let code = output
            .get_str("dispatch_output")
            .or_else(|| output.get_str("build_output"))
            .unwrap_or_default()
            .to_string();

        let stage_outputs = output
            .agent_outputs()
            .map(|(name, text)| AgentOutput::new(stage_for_output(name), name, text))
            .collect();

        let confidence = ConfidenceReport {
            // Placeholders: no check behind these three yet.
            architecture_preserved: true,
            tests_passing: true,
            owasp_clean: true,
            vulnerabilities_found: 0,
            dependencies_verified: self.agents.contains(roles::OLLAMA),
            models_consulted: self.agents.len() as u32,
            cross_vendor_agreement: cross_vendor_agreement(&output),
        };

        PipelineResult {
            run_id,
            code,
            stage_outputs,
            confidence,
            security: None,
            summary: format!("Strategy: {strategy_name}"),
            raw: output,
        }
    }
}

/// 1.0 unless both `claude_output` and `codex_output` are non-empty and
/// differ, in which case [`PARTIAL_AGREEMENT`]. Exact text comparison only.
pub fn cross_vendor_agreement(output: &StrategyOutput) -> f64 {
    match (output.get_str("claude_output"), output.get_str("codex_output")) {
        (Some(a), Some(b)) if !a.is_empty() && !b.is_empty() && a != b => PARTIAL_AGREEMENT,
        _ => 1.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::ScriptedAgent;

    fn engine_with(roles: &[&str]) -> Engine {
        let mut engine = Engine::new(ForgeConfig::default());
        for role in roles {
            engine.register_agent(*role, ScriptedAgent::fixed(*role));
        }
        engine
    }

    #[test]
    fn test_available_stages_sorted_and_deduped() {
        let engine = engine_with(&["dispatch", "codex", "claude"]);
        assert_eq!(
            engine.available_stages(),
            vec![Stage::Architect, Stage::Builder, Stage::Dispatch]
        );
        assert_eq!(engine.available_agents(), vec!["dispatch", "codex", "claude"]);
    }

    #[test]
    fn test_code_prefers_dispatch_then_build() {
        let engine = engine_with(&[]);
        let out = StrategyOutput::new().with("build_output", "b");
        assert_eq!(engine.normalize(Uuid::nil(), "x", out).code, "b");

        let out = StrategyOutput::new()
            .with("build_output", "b")
            .with("dispatch_output", "d");
        assert_eq!(engine.normalize(Uuid::nil(), "x", out).code, "d");

        let out = StrategyOutput::new().with("dispatch_output", 3);
        assert_eq!(engine.normalize(Uuid::nil(), "x", out).code, "");
    }

    #[test]
    fn test_agreement_rules() {
        let same = StrategyOutput::new()
            .with("claude_output", "x")
            .with("codex_output", "x");
        assert_eq!(cross_vendor_agreement(&same), 1.0);

        let differ = StrategyOutput::new()
            .with("claude_output", "x")
            .with("codex_output", "y");
        assert_eq!(cross_vendor_agreement(&differ), 0.7);

        let one_empty = StrategyOutput::new()
            .with("claude_output", "")
            .with("codex_output", "y");
        assert_eq!(cross_vendor_agreement(&one_empty), 1.0);
    }

    #[test]
    fn test_dependencies_verified_tracks_ollama() {
        let without = engine_with(&["claude"]);
        let r = without.normalize(Uuid::nil(), "s", StrategyOutput::new());
        assert!(!r.confidence.dependencies_verified);
        assert_eq!(r.confidence.models_consulted, 1);
        assert_eq!(r.summary, "Strategy: s");

        let with = engine_with(&["claude", "ollama"]);
        let r = with.normalize(Uuid::nil(), "s", StrategyOutput::new());
        assert!(r.confidence.dependencies_verified);
    }

    #[tokio::test]
    async fn test_register_if_available_skips_dead_agents() {
        let mut engine = Engine::new(ForgeConfig::default());
        assert!(!engine.register_if_available("nim", ScriptedAgent::fixed("x").unavailable()).await);
        assert!(engine.register_if_available("codex", ScriptedAgent::fixed("x")).await);
        assert_eq!(engine.available_agents(), vec!["codex"]);
    }
}
