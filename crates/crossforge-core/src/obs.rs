//! Structured lifecycle events for strategy runs.
//!
//! Every event carries an `event` field (`strategy.started`, `agent.call`,
//! ...) so JSON logs can be filtered without parsing messages.

use tracing::{debug, info, warn, Span};

/// Span for one strategy run. Attach it to the run's future with
/// `tracing::Instrument` so every event inside carries the run id.
pub fn run_span(run_id: &str, strategy: &str) -> Span {
    tracing::info_span!("crossforge.run", run_id = %run_id, strategy = %strategy)
}

pub fn emit_strategy_started(run_id: &str, strategy: &str, agents: usize) {
    info!(event = "strategy.started", run_id = %run_id, strategy = %strategy, agents = agents);
}

pub fn emit_strategy_finished(run_id: &str, strategy: &str, duration_ms: u64, success: bool) {
    info!(
        event = "strategy.finished",
        run_id = %run_id,
        strategy = %strategy,
        duration_ms = duration_ms,
        success = success,
    );
}

/// Emitted once per agent call, after it returns.
pub fn emit_agent_call(agent: &str, prompt_chars: usize, reply_chars: usize, duration_ms: u64) {
    debug!(
        event = "agent.call",
        agent = %agent,
        prompt_chars = prompt_chars,
        reply_chars = reply_chars,
        duration_ms = duration_ms,
    );
}

pub fn emit_agent_failed(agent: &str, error: &dyn std::fmt::Display) {
    warn!(event = "agent.failed", agent = %agent, error = %error);
}

/// `source` is `history`, `signal`, `default` or `first`.
pub fn emit_route_selected(strategy: &str, source: &str, signals: &[String]) {
    info!(
        event = "route.selected",
        strategy = %strategy,
        source = %source,
        signals = ?signals,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_span_create() {
        let _entered = run_span("run-1", "consensus").entered();
        emit_strategy_started("run-1", "consensus", 3);
        emit_route_selected("consensus", "default", &[]);
    }
}
