//! Append-only routing history used by the adaptive router.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, warn};

use super::{best_by_average, extract_signals, RoutingEntry};
use crate::metrics::METRICS;
use crate::store;

/// Routing outcomes, optionally backed by a JSON file.
///
/// Every mutation holds the lock for the whole append-and-save, so concurrent
/// recorders in one process never lose each other's entries.
#[derive(Debug, Default)]
pub struct RoutingHistory {
    path: Option<PathBuf>,
    entries: Mutex<Vec<RoutingEntry>>,
}

impl RoutingHistory {
    /// History that lives only in memory.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load from `path` (missing or corrupt → empty) and save there on every
    /// record.
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let entries: Vec<RoutingEntry> = store::load_or_default(&path);
        debug!(path = %path.display(), entries = entries.len(), "routing history loaded");
        Self {
            path: Some(path),
            entries: Mutex::new(entries),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Append an entry.
    pub fn record(&self, entry: RoutingEntry) {
        let Ok(mut entries) = self.entries.lock() else {
            warn!(strategy = %entry.strategy, "routing history lock poisoned, outcome dropped");
            return;
        };
        entries.push(entry);
        METRICS.inc_routes_learned();
        if let Some(path) = &self.path {
            store::save_or_warn(path, &*entries);
        }
    }

    /// Append the outcome of running `strategy` on `task`.
    pub fn record_outcome(&self, task: &str, strategy: &str, score: f64) {
        self.record(RoutingEntry::for_task(task, strategy, score));
    }

    /// Best average-scoring strategy among entries sharing at least one signal
    /// with `task`. `None` when the task has no signals or nothing overlaps.
    pub fn best_strategy_for(&self, task: &str) -> Option<String> {
        let signals = extract_signals(task);
        if signals.is_empty() {
            return None;
        }
        let entries = self.entries.lock().ok()?;
        let best = best_by_average(
            entries
                .iter()
                .filter(|e| e.task_signals.iter().any(|s| signals.contains(s)))
                .map(|e| (e.strategy.as_str(), e.score)),
        );
        best
    }

    pub fn entries(&self) -> Vec<RoutingEntry> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_poisoned_lock_drops_entry_without_saving() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        let history = Arc::new(RoutingHistory::open(&path));

        let poisoner = Arc::clone(&history);
        let joined = std::thread::spawn(move || {
            let _guard = poisoner.entries.lock().unwrap();
            panic!("poison the lock");
        })
        .join();
        assert!(joined.is_err());

        history.record_outcome("secure the login", "adversarial", 90.0);
        assert!(history.entries().is_empty());
        assert!(!path.exists());
    }

    #[test]
    fn test_no_signals_means_no_opinion() {
        let history = RoutingHistory::in_memory();
        history.record_outcome("secure the login", "consensus", 95.0);
        assert_eq!(history.best_strategy_for("write a poem"), None);
    }

    #[test]
    fn test_overlapping_signal_picks_best_average() {
        let history = RoutingHistory::in_memory();
        history.record_outcome("fix auth bug", "adversarial", 60.0);
        history.record_outcome("encrypt tokens", "consensus", 90.0);
        history.record_outcome("benchmark loop", "evolutionary", 100.0);
        assert_eq!(
            history.best_strategy_for("xss review").as_deref(),
            Some("consensus")
        );
    }

    #[test]
    fn test_persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("routing/history.json");
        {
            let history = RoutingHistory::open(&path);
            history.record_outcome("security audit", "adversarial", 80.0);
        }
        let reloaded = RoutingHistory::open(&path);
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded.entries()[0].strategy, "adversarial");
    }

    #[test]
    fn test_concurrent_records_are_not_lost() {
        let history = Arc::new(RoutingHistory::in_memory());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let h = history.clone();
                std::thread::spawn(move || h.record_outcome("test it", "verification_loop", i as f64))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(history.len(), 8);
    }
}
