//! Picks a strategy per task and delegates to it.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::instrument;

use super::{Strategy, StrategyKind, StrategyRegistry};
use crate::agent::{AgentContext, AgentSet};
use crate::domain::{ForgeError, Result, Stage, StrategyOutput};
use crate::obs;
use crate::routing::{default_strategy_for, extract_signals, RoutingHistory, TASK_SIGNALS};

pub const NAME: &str = "adaptive_router";

/// Learns which strategy works best per kind of task.
///
/// Selection order: best historical average for an overlapping signal, then
/// the static default of the first matching signal, then `consensus`, then
/// whichever strategy was registered first. Candidates that are not
/// registered are skipped at every step.
pub struct AdaptiveRouter {
    strategies: StrategyRegistry,
    history: Arc<RoutingHistory>,
}

impl AdaptiveRouter {
    pub fn new(strategies: StrategyRegistry, history: Arc<RoutingHistory>) -> Self {
        Self {
            strategies,
            history,
        }
    }

    /// Router over every built-in strategy with default parameters.
    pub fn with_builtins(history: Arc<RoutingHistory>) -> Self {
        let mut strategies = StrategyRegistry::new();
        for kind in StrategyKind::BUILTIN {
            if kind != StrategyKind::AdaptiveRouter {
                strategies.register(kind.build(history.clone()));
            }
        }
        Self::new(strategies, history)
    }

    pub fn register_strategy(&mut self, strategy: Arc<dyn Strategy>) {
        self.strategies.register(strategy);
    }

    pub fn strategies(&self) -> &StrategyRegistry {
        &self.strategies
    }

    pub fn history(&self) -> &Arc<RoutingHistory> {
        &self.history
    }

    pub fn select_strategy(&self, task: &str) -> Result<Arc<dyn Strategy>> {
        let signals = extract_signals(task);

        if let Some(learned) = self.history.best_strategy_for(task) {
            if let Ok(strategy) = self.strategies.get(&learned) {
                obs::emit_route_selected(&learned, "history", &signals);
                return Ok(strategy);
            }
        }

        let lower = task.to_lowercase();
        for (signal, keywords) in TASK_SIGNALS {
            if !keywords.iter().any(|kw| lower.contains(kw)) {
                continue;
            }
            if let Some(recommended) = default_strategy_for(signal) {
                if let Ok(strategy) = self.strategies.get(recommended) {
                    obs::emit_route_selected(recommended, "signal", &signals);
                    return Ok(strategy);
                }
            }
        }

        if let Ok(strategy) = self.strategies.get(super::consensus::NAME) {
            obs::emit_route_selected(super::consensus::NAME, "default", &signals);
            return Ok(strategy);
        }

        let first = self.strategies.first().ok_or(ForgeError::NoStrategies)?;
        obs::emit_route_selected(first.name(), "first", &signals);
        Ok(first)
    }

    /// Append the outcome of a routed run to history.
    pub fn record_outcome(&self, task: &str, strategy: &str, score: f64) {
        self.history.record_outcome(task, strategy, score);
    }
}

#[async_trait]
impl Strategy for AdaptiveRouter {
    fn name(&self) -> &str {
        NAME
    }

    fn required_stages(&self) -> &[Stage] {
        &[Stage::Architect, Stage::Dispatch]
    }

    #[instrument(skip(self, agents, context), fields(strategy = NAME))]
    async fn execute(
        &self,
        task: &str,
        agents: &AgentSet,
        context: Option<&AgentContext>,
    ) -> Result<StrategyOutput> {
        let selected = self.select_strategy(task)?;
        let mut out = selected.execute(task, agents, context).await?;
        out.insert("routed_to", selected.name());
        out.insert("strategy", NAME);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::{Consensus, Pipeline};

    #[test]
    fn test_static_route_by_first_matching_signal() {
        let router = AdaptiveRouter::with_builtins(Arc::new(RoutingHistory::in_memory()));
        // "performance" is declared before "testing"
        let s = router.select_strategy("benchmark and test the parser").unwrap();
        assert_eq!(s.name(), "evolutionary");
    }

    #[test]
    fn test_unregistered_recommendation_falls_through_to_consensus() {
        let mut registry = StrategyRegistry::new();
        registry.register(Arc::new(Pipeline::default()));
        registry.register(Arc::new(Consensus));
        let router = AdaptiveRouter::new(registry, Arc::new(RoutingHistory::in_memory()));
        assert_eq!(router.select_strategy("xss scan").unwrap().name(), "consensus");
        assert_eq!(router.select_strategy("a poem").unwrap().name(), "consensus");
    }

    #[test]
    fn test_first_registered_is_last_resort() {
        let mut registry = StrategyRegistry::new();
        registry.register(Arc::new(Pipeline::default()));
        let router = AdaptiveRouter::new(registry, Arc::new(RoutingHistory::in_memory()));
        assert_eq!(router.select_strategy("a poem").unwrap().name(), "pipeline");
    }

    #[test]
    fn test_empty_router_errors() {
        let router = AdaptiveRouter::new(StrategyRegistry::new(), Arc::new(RoutingHistory::in_memory()));
        assert!(matches!(
            router.select_strategy("anything").err(),
            Some(ForgeError::NoStrategies)
        ));
    }
}
