//! Process-wide counters.
//!
//! Incremented at the call site; [`Metrics::flush`] reports them as one
//! `info!` event, which the CLI does once per command.

use std::sync::atomic::{AtomicU64, Ordering};

pub static METRICS: Metrics = Metrics::new();

pub struct Metrics {
    strategy_runs: AtomicU64,
    agent_calls: AtomicU64,
    agent_failures: AtomicU64,
    routes_learned: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            strategy_runs: AtomicU64::new(0),
            agent_calls: AtomicU64::new(0),
            agent_failures: AtomicU64::new(0),
            routes_learned: AtomicU64::new(0),
        }
    }

    pub fn inc_strategy_runs(&self) {
        self.strategy_runs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_agent_calls(&self) {
        self.agent_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_agent_failures(&self) {
        self.agent_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// A routing outcome was appended to history.
    pub fn inc_routes_learned(&self) {
        self.routes_learned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            strategy_runs = self.strategy_runs(),
            agent_calls = self.agent_calls(),
            agent_failures = self.agent_failures(),
            routes_learned = self.routes_learned(),
        );
    }

    pub fn strategy_runs(&self) -> u64 {
        self.strategy_runs.load(Ordering::Relaxed)
    }

    pub fn agent_calls(&self) -> u64 {
        self.agent_calls.load(Ordering::Relaxed)
    }

    pub fn agent_failures(&self) -> u64 {
        self.agent_failures.load(Ordering::Relaxed)
    }

    pub fn routes_learned(&self) -> u64 {
        self.routes_learned.load(Ordering::Relaxed)
    }

    /// Zero every counter (tests).
    pub fn reset(&self) {
        self.strategy_runs.store(0, Ordering::Relaxed);
        self.agent_calls.store(0, Ordering::Relaxed);
        self.agent_failures.store(0, Ordering::Relaxed);
        self.routes_learned.store(0, Ordering::Relaxed);
    }
}
