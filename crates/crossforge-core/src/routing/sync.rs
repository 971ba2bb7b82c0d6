//! Team-level routing profile shared between users.
//!
//! Only the local half exists: entries are kept in a per-team JSON file and
//! can be exported and merged by whatever transport the caller has.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{best_by_average, RoutingEntry};
use crate::store;

/// A team's routing entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeamRoutingProfile {
    pub team_id: String,
    #[serde(default)]
    pub entries: Vec<RoutingEntry>,
}

impl TeamRoutingProfile {
    pub fn new(team_id: impl Into<String>) -> Self {
        Self {
            team_id: team_id.into(),
            entries: Vec::new(),
        }
    }

    /// Best average-scoring strategy for every signal seen.
    pub fn best_strategies(&self) -> BTreeMap<String, String> {
        let mut signals: Vec<&str> = Vec::new();
        for entry in &self.entries {
            for signal in &entry.task_signals {
                if !signals.contains(&signal.as_str()) {
                    signals.push(signal);
                }
            }
        }
        signals
            .into_iter()
            .filter_map(|signal| {
                let best = best_by_average(
                    self.entries
                        .iter()
                        .filter(|e| e.task_signals.iter().any(|s| s == signal))
                        .map(|e| (e.strategy.as_str(), e.score)),
                )?;
                Some((signal.to_string(), best))
            })
            .collect()
    }

    pub fn total_runs(&self) -> usize {
        self.entries.len()
    }

    pub fn average_score(&self) -> f64 {
        if self.entries.is_empty() {
            return 0.0;
        }
        self.entries.iter().map(|e| e.score).sum::<f64>() / self.entries.len() as f64
    }
}

/// Counts reported by [`RoutingSync::sync`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStats {
    pub uploaded: usize,
    pub downloaded: usize,
    pub local_entries: usize,
}

/// Local store of one team's routing profile.
#[derive(Debug)]
pub struct RoutingSync {
    team_id: String,
    path: Option<PathBuf>,
    profile: TeamRoutingProfile,
}

impl RoutingSync {
    pub fn in_memory(team_id: impl Into<String>) -> Self {
        let team_id = team_id.into();
        Self {
            profile: TeamRoutingProfile::new(team_id.clone()),
            team_id,
            path: None,
        }
    }

    /// Load `<dir>/<team_id>.json`.
    pub fn open(team_id: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        let team_id = team_id.into();
        let path = dir.into().join(format!("{team_id}.json"));
        let mut profile: TeamRoutingProfile = store::load_or_default(&path);
        profile.team_id = team_id.clone();
        Self {
            team_id,
            path: Some(path),
            profile,
        }
    }

    pub fn team_id(&self) -> &str {
        &self.team_id
    }

    pub fn profile(&self) -> &TeamRoutingProfile {
        &self.profile
    }

    /// Append `entry`, stamped with this team's id.
    pub fn record(&mut self, mut entry: RoutingEntry) {
        entry.team_id = self.team_id.clone();
        self.profile.entries.push(entry);
        self.save();
    }

    /// Strategy for the first of `signals` that has a known best.
    pub fn recommendation(&self, signals: &[String]) -> Option<String> {
        let best = self.profile.best_strategies();
        signals.iter().find_map(|s| best.get(s).cloned())
    }

    /// Add remote entries not already present (by task hash and timestamp).
    /// Returns how many were added.
    pub fn merge_remote(&mut self, remote: Vec<RoutingEntry>) -> usize {
        let mut added = 0;
        for entry in remote {
            let known = self
                .profile
                .entries
                .iter()
                .any(|e| e.task_hash == entry.task_hash && e.timestamp == entry.timestamp);
            if !known {
                self.profile.entries.push(entry);
                added += 1;
            }
        }
        if added > 0 {
            self.save();
        }
        added
    }

    /// Entries recorded at or after `since`.
    pub fn export_entries(&self, since: Option<DateTime<Utc>>) -> Vec<RoutingEntry> {
        self.profile
            .entries
            .iter()
            .filter(|e| since.map_or(true, |t| e.timestamp >= t))
            .cloned()
            .collect()
    }

    /// Local statistics; nothing is transferred.
    pub async fn sync(&self) -> SyncStats {
        SyncStats {
            uploaded: 0,
            downloaded: 0,
            local_entries: self.profile.entries.len(),
        }
    }

    fn save(&self) {
        if let Some(path) = &self.path {
            store::save_or_warn(path, &self.profile);
        }
    }
}
