//! Multi-agent strategies.
//!
//! # Module layout
//!
//! - [`consensus`]: two generators in parallel, dispatch merges
//! - [`adversarial`]: build, attack, fuzz, harden
//! - [`pipeline`]: architect → builder → specialist → dispatch
//! - [`mesh`]: every worker in parallel, dispatch merges
//! - [`evolutionary`]: population search with crossover
//! - [`verification`]: code and tests written by alternating roles
//! - [`router`]: picks one of the above per task

pub mod adversarial;
pub mod consensus;
pub mod evolutionary;
pub mod mesh;
pub mod pipeline;
pub mod router;
pub mod verification;

use std::sync::Arc;

use async_trait::async_trait;

use crate::agent::{AgentContext, AgentSet};
use crate::domain::{ForgeError, Result, Stage, StrategyOutput};
use crate::routing::history::RoutingHistory;

pub use adversarial::Adversarial;
pub use consensus::Consensus;
pub use evolutionary::Evolutionary;
pub use mesh::CognitiveMesh;
pub use pipeline::Pipeline;
pub use router::AdaptiveRouter;
pub use verification::VerificationLoop;

/// A named orchestration over an [`AgentSet`].
///
/// `execute` is stateless apart from the agent calls it makes; only the
/// router keeps state across runs, in its routing history.
#[async_trait]
pub trait Strategy: Send + Sync {
    fn name(&self) -> &str;

    /// Stages this strategy expects the registered agents to cover.
    fn required_stages(&self) -> &[Stage];

    /// Required stage numbers, sorted.
    fn stages_needed(&self) -> Vec<u8> {
        let mut stages: Vec<u8> = self.required_stages().iter().map(|s| s.number()).collect();
        stages.sort_unstable();
        stages
    }

    async fn execute(
        &self,
        task: &str,
        agents: &AgentSet,
        context: Option<&AgentContext>,
    ) -> Result<StrategyOutput>;
}

/// The built-in strategies with their parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    Consensus,
    Adversarial { rounds: usize },
    Pipeline { include_specialist: bool },
    CognitiveMesh,
    Evolutionary { population: usize, generations: usize },
    VerificationLoop { iterations: usize },
    AdaptiveRouter,
}

impl StrategyKind {
    /// Every built-in kind with default parameters, router last.
    pub const BUILTIN: [StrategyKind; 7] = [
        StrategyKind::Consensus,
        StrategyKind::Adversarial { rounds: 1 },
        StrategyKind::Pipeline {
            include_specialist: true,
        },
        StrategyKind::CognitiveMesh,
        StrategyKind::Evolutionary {
            population: 3,
            generations: 2,
        },
        StrategyKind::VerificationLoop { iterations: 2 },
        StrategyKind::AdaptiveRouter,
    ];

    /// Parse a strategy name; parameters take their defaults.
    pub fn from_name(name: &str) -> Option<StrategyKind> {
        StrategyKind::BUILTIN
            .into_iter()
            .find(|kind| kind.name() == name)
    }

    pub fn name(&self) -> &'static str {
        match self {
            StrategyKind::Consensus => consensus::NAME,
            StrategyKind::Adversarial { .. } => adversarial::NAME,
            StrategyKind::Pipeline { .. } => pipeline::NAME,
            StrategyKind::CognitiveMesh => mesh::NAME,
            StrategyKind::Evolutionary { .. } => evolutionary::NAME,
            StrategyKind::VerificationLoop { .. } => verification::NAME,
            StrategyKind::AdaptiveRouter => router::NAME,
        }
    }

    /// Instantiate the strategy.
    ///
    /// The router gets every other built-in strategy and `history`.
    pub fn build(self, history: Arc<RoutingHistory>) -> Arc<dyn Strategy> {
        match self {
            StrategyKind::Consensus => Arc::new(Consensus),
            StrategyKind::Adversarial { rounds } => Arc::new(Adversarial::new(rounds)),
            StrategyKind::Pipeline { include_specialist } => {
                Arc::new(Pipeline::new(include_specialist))
            }
            StrategyKind::CognitiveMesh => Arc::new(CognitiveMesh),
            StrategyKind::Evolutionary {
                population,
                generations,
            } => Arc::new(Evolutionary::new(population, generations)),
            StrategyKind::VerificationLoop { iterations } => {
                Arc::new(VerificationLoop::new(iterations))
            }
            StrategyKind::AdaptiveRouter => Arc::new(AdaptiveRouter::with_builtins(history)),
        }
    }
}

/// Name-keyed strategy collection, in registration order.
///
/// The extension point for strategies beyond the built-ins: callers build
/// their own `Strategy` values and register them here.
#[derive(Clone, Default)]
pub struct StrategyRegistry {
    strategies: Vec<Arc<dyn Strategy>>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every built-in strategy except the router.
    pub fn builtins() -> Self {
        let mut registry = Self::new();
        let history = Arc::new(RoutingHistory::in_memory());
        for kind in StrategyKind::BUILTIN {
            if kind != StrategyKind::AdaptiveRouter {
                registry.register(kind.build(history.clone()));
            }
        }
        registry
    }

    /// Add `strategy`, replacing any registered one with the same name.
    pub fn register(&mut self, strategy: Arc<dyn Strategy>) {
        match self
            .strategies
            .iter_mut()
            .find(|s| s.name() == strategy.name())
        {
            Some(slot) => *slot = strategy,
            None => self.strategies.push(strategy),
        }
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Strategy>> {
        self.strategies
            .iter()
            .find(|s| s.name() == name)
            .cloned()
            .ok_or_else(|| ForgeError::UnknownStrategy(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.strategies.iter().any(|s| s.name() == name)
    }

    pub fn names(&self) -> Vec<String> {
        self.strategies.iter().map(|s| s.name().to_string()).collect()
    }

    pub fn first(&self) -> Option<Arc<dyn Strategy>> {
        self.strategies.first().cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Strategy>> {
        self.strategies.iter()
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_name_round_trips_every_builtin() {
        for kind in StrategyKind::BUILTIN {
            assert_eq!(StrategyKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(StrategyKind::from_name("nope"), None);
    }

    #[test]
    fn test_built_strategy_reports_kind_name() {
        let history = Arc::new(RoutingHistory::in_memory());
        for kind in StrategyKind::BUILTIN {
            assert_eq!(kind.build(history.clone()).name(), kind.name());
        }
    }

    #[test]
    fn test_stages_needed_sorted() {
        let history = Arc::new(RoutingHistory::in_memory());
        let s = StrategyKind::from_name("adversarial").unwrap().build(history);
        assert_eq!(s.stages_needed(), vec![1, 2, 3, 5]);
    }

    #[test]
    fn test_registry_replaces_by_name() {
        let mut registry = StrategyRegistry::builtins();
        assert_eq!(registry.len(), 6);
        assert!(!registry.contains("adaptive_router"));

        registry.register(Arc::new(Adversarial::new(4)));
        assert_eq!(registry.len(), 6);
        assert_eq!(registry.names()[1], "adversarial");
        assert!(matches!(
            registry.get("missing").err(),
            Some(ForgeError::UnknownStrategy(_))
        ));
    }
}
