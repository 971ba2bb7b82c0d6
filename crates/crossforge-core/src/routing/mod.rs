//! Routing intelligence: task signals, local history, team sync.

pub mod history;
pub mod sync;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::short_digest;

pub use history::RoutingHistory;
pub use sync::{RoutingSync, SyncStats, TeamRoutingProfile};

/// Keyword lists per task signal, in matching order.
pub const TASK_SIGNALS: [(&str, &[&str]); 5] = [
    (
        "security",
        &["security", "auth", "encrypt", "xss", "injection", "owasp", "vulnerability"],
    ),
    (
        "performance",
        &["optimize", "fast", "performance", "benchmark", "cache", "latency"],
    ),
    ("simple", &["simple", "basic", "hello", "print", "trivial", "small"]),
    (
        "complex",
        &["architecture", "system", "distributed", "microservice", "pipeline"],
    ),
    ("testing", &["test", "coverage", "verify", "validate", "assert"]),
];

/// Static strategy per signal, used when history has nothing to say.
pub fn default_strategy_for(signal: &str) -> Option<&'static str> {
    match signal {
        "security" => Some("adversarial"),
        "performance" => Some("evolutionary"),
        "simple" => Some("consensus"),
        "complex" => Some("pipeline"),
        "testing" => Some("verification_loop"),
        _ => None,
    }
}

/// Signals whose keywords occur in `task` (case-insensitive substring match),
/// in [`TASK_SIGNALS`] order.
pub fn extract_signals(task: &str) -> Vec<String> {
    let lower = task.to_lowercase();
    TASK_SIGNALS
        .iter()
        .filter(|(_, keywords)| keywords.iter().any(|kw| lower.contains(kw)))
        .map(|(signal, _)| signal.to_string())
        .collect()
}

/// First 16 hex chars of the task's SHA-256.
pub fn task_hash(task: &str) -> String {
    short_digest(task)
}

/// One routing decision and its outcome score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingEntry {
    pub task_hash: String,
    pub task_signals: Vec<String>,
    pub strategy: String,
    pub score: f64,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub team_id: String,
}

impl RoutingEntry {
    /// Entry for `task` stamped now.
    pub fn for_task(task: &str, strategy: impl Into<String>, score: f64) -> Self {
        Self {
            task_hash: task_hash(task),
            task_signals: extract_signals(task),
            strategy: strategy.into(),
            score,
            timestamp: Utc::now(),
            user_id: String::new(),
            team_id: String::new(),
        }
    }
}

/// Strategy with the highest average score; on a tie the first one seen wins.
pub(crate) fn best_by_average<'a>(
    scores: impl IntoIterator<Item = (&'a str, f64)>,
) -> Option<String> {
    let mut tally: Vec<(&str, f64, usize)> = Vec::new();
    for (strategy, score) in scores {
        match tally.iter_mut().find(|(s, _, _)| *s == strategy) {
            Some(slot) => {
                slot.1 += score;
                slot.2 += 1;
            }
            None => tally.push((strategy, score, 1)),
        }
    }
    let mut best: Option<(&str, f64)> = None;
    for (strategy, sum, count) in tally {
        let avg = sum / count as f64;
        if best.map_or(true, |(_, b)| avg > b) {
            best = Some((strategy, avg));
        }
    }
    best.map(|(s, _)| s.to_string())
}
