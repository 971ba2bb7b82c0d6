//! Security and confidence history per project, aggregated per team.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::security::SecurityAttestation;
use crate::store;

/// One project's security posture at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSnapshot {
    pub project_name: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub security_score: u32,
    #[serde(default)]
    pub confidence_score: u32,
    #[serde(default)]
    pub strategy_used: String,
    #[serde(default)]
    pub owasp_clean: bool,
    #[serde(default)]
    pub supply_chain_safe: bool,
    #[serde(default)]
    pub compliance_pass_rate: f64,
    #[serde(default)]
    pub threats_count: usize,
    #[serde(default)]
    pub agents_used: Vec<String>,
}

impl ProjectSnapshot {
    pub fn new(project_name: impl Into<String>) -> Self {
        Self {
            project_name: project_name.into(),
            timestamp: Utc::now(),
            security_score: 0,
            confidence_score: 0,
            strategy_used: String::new(),
            owasp_clean: false,
            supply_chain_safe: false,
            compliance_pass_rate: 0.0,
            threats_count: 0,
            agents_used: Vec::new(),
        }
    }

    /// Snapshot of `attestation`; checks that did not run count as failed
    /// or zero.
    pub fn from_attestation(
        project_name: impl Into<String>,
        attestation: &SecurityAttestation,
        confidence_score: u32,
    ) -> Self {
        Self {
            security_score: attestation.overall_score(),
            confidence_score,
            strategy_used: attestation.metadata.strategy_used.clone(),
            owasp_clean: attestation.owasp.as_ref().is_some_and(|r| r.is_clean),
            supply_chain_safe: attestation.supply_chain.as_ref().is_some_and(|r| r.is_safe()),
            compliance_pass_rate: attestation.compliance.as_ref().map_or(0.0, |r| r.pass_rate()),
            threats_count: attestation.threat_model.as_ref().map_or(0, |m| m.threats.len()),
            agents_used: attestation.metadata.agents_used.clone(),
            ..Self::new(project_name)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Improving,
    Declining,
    Stable,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Trend::Improving => "improving",
            Trend::Declining => "declining",
            Trend::Stable => "stable",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSummary {
    pub latest_score: u32,
    pub trend: Trend,
    pub runs: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub team_id: String,
    pub total_projects: usize,
    pub total_runs: usize,
    /// Rounded to one decimal.
    pub average_security_score: f64,
    pub average_confidence_score: f64,
    /// Whole percent, e.g. `"75%"`.
    pub owasp_compliance_rate: String,
    pub projects: BTreeMap<String, ProjectSummary>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeamDashboard {
    #[serde(default)]
    pub team_id: String,
    #[serde(default)]
    pub snapshots: Vec<ProjectSnapshot>,
}

impl TeamDashboard {
    pub fn new(team_id: impl Into<String>) -> Self {
        Self {
            team_id: team_id.into(),
            snapshots: Vec::new(),
        }
    }

    /// Distinct project names, sorted.
    pub fn projects(&self) -> Vec<String> {
        self.snapshots
            .iter()
            .map(|s| s.project_name.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn total_runs(&self) -> usize {
        self.snapshots.len()
    }

    pub fn average_security_score(&self) -> f64 {
        self.mean(|s| s.security_score as f64)
    }

    pub fn average_confidence_score(&self) -> f64 {
        self.mean(|s| s.confidence_score as f64)
    }

    /// Fraction of snapshots with a clean OWASP scan.
    pub fn owasp_compliance_rate(&self) -> f64 {
        self.mean(|s| if s.owasp_clean { 1.0 } else { 0.0 })
    }

    fn mean(&self, f: impl Fn(&ProjectSnapshot) -> f64) -> f64 {
        if self.snapshots.is_empty() {
            return 0.0;
        }
        self.snapshots.iter().map(f).sum::<f64>() / self.snapshots.len() as f64
    }

    /// Most recent snapshot; the earliest recorded wins a timestamp tie.
    pub fn latest_snapshot(&self, project: &str) -> Option<&ProjectSnapshot> {
        self.snapshots
            .iter()
            .filter(|s| s.project_name == project)
            .fold(None, |best: Option<&ProjectSnapshot>, s| match best {
                Some(b) if b.timestamp >= s.timestamp => Some(b),
                _ => Some(s),
            })
    }

    /// Snapshots of `project`, oldest first.
    pub fn project_history(&self, project: &str) -> Vec<&ProjectSnapshot> {
        let mut history: Vec<&ProjectSnapshot> = self
            .snapshots
            .iter()
            .filter(|s| s.project_name == project)
            .collect();
        history.sort_by_key(|s| s.timestamp);
        history
    }

    /// Direction of the last two security scores.
    pub fn trend(&self, project: &str) -> Trend {
        match self.project_history(project).as_slice() {
            [.., previous, recent] if recent.security_score > previous.security_score => Trend::Improving,
            [.., previous, recent] if recent.security_score < previous.security_score => Trend::Declining,
            _ => Trend::Stable,
        }
    }

    pub fn summary(&self) -> DashboardSummary {
        let projects = self.projects();
        let per_project = projects
            .iter()
            .map(|name| {
                let summary = ProjectSummary {
                    latest_score: self.latest_snapshot(name).map_or(0, |s| s.security_score),
                    trend: self.trend(name),
                    runs: self.project_history(name).len(),
                };
                (name.clone(), summary)
            })
            .collect();
        DashboardSummary {
            team_id: self.team_id.clone(),
            total_projects: projects.len(),
            total_runs: self.total_runs(),
            average_security_score: round1(self.average_security_score()),
            average_confidence_score: round1(self.average_confidence_score()),
            owasp_compliance_rate: format!("{:.0}%", self.owasp_compliance_rate() * 100.0),
            projects: per_project,
        }
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// A team dashboard kept in `<dir>/<team>.json`.
#[derive(Debug)]
pub struct DashboardStore {
    path: Option<PathBuf>,
    dashboard: TeamDashboard,
}

impl DashboardStore {
    pub fn in_memory(team_id: impl Into<String>) -> Self {
        Self {
            path: None,
            dashboard: TeamDashboard::new(team_id),
        }
    }

    pub fn open(team_id: impl Into<String>, dir: impl AsRef<Path>) -> Self {
        let team_id = team_id.into();
        let path = dir.as_ref().join(format!("{team_id}.json"));
        let mut dashboard: TeamDashboard = store::load_or_default(&path);
        dashboard.team_id = team_id;
        debug!(path = %path.display(), snapshots = dashboard.snapshots.len(), "dashboard loaded");
        Self {
            path: Some(path),
            dashboard,
        }
    }

    pub fn record_snapshot(&mut self, snapshot: ProjectSnapshot) {
        self.dashboard.snapshots.push(snapshot);
        if let Some(path) = &self.path {
            store::save_or_warn(path, &self.dashboard);
        }
    }

    /// Record a snapshot built from `attestation` and return it.
    pub fn record_attestation(
        &mut self,
        project: &str,
        attestation: &SecurityAttestation,
        confidence_score: u32,
    ) -> ProjectSnapshot {
        let snapshot = ProjectSnapshot::from_attestation(project, attestation, confidence_score);
        self.record_snapshot(snapshot.clone());
        snapshot
    }

    pub fn dashboard(&self) -> &TeamDashboard {
        &self.dashboard
    }

    pub fn summary(&self) -> DashboardSummary {
        self.dashboard.summary()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn snap(project: &str, score: u32, minutes_ago: i64, owasp_clean: bool) -> ProjectSnapshot {
        ProjectSnapshot {
            security_score: score,
            confidence_score: 80,
            owasp_clean,
            timestamp: Utc::now() - Duration::minutes(minutes_ago),
            ..ProjectSnapshot::new(project)
        }
    }

    #[test]
    fn test_trend_uses_last_two_by_time() {
        let mut dash = TeamDashboard::new("core");
        dash.snapshots.push(snap("api", 70, 1, true));
        dash.snapshots.push(snap("api", 90, 10, true));
        assert_eq!(dash.trend("api"), Trend::Declining);
        assert_eq!(dash.latest_snapshot("api").unwrap().security_score, 70);
        assert_eq!(dash.trend("web"), Trend::Stable);
    }

    #[test]
    fn test_summary_aggregates() {
        let mut dash = TeamDashboard::new("core");
        dash.snapshots.push(snap("api", 60, 20, false));
        dash.snapshots.push(snap("api", 75, 10, true));
        dash.snapshots.push(snap("web", 50, 5, true));
        dash.snapshots.push(snap("web", 50, 1, false));

        let summary = dash.summary();
        assert_eq!(summary.total_projects, 2);
        assert_eq!(summary.total_runs, 4);
        assert_eq!(summary.average_security_score, 58.8);
        assert_eq!(summary.owasp_compliance_rate, "50%");
        assert_eq!(summary.projects["api"].trend, Trend::Improving);
        assert_eq!(summary.projects["web"].trend, Trend::Stable);
        assert_eq!(summary.projects["api"].latest_score, 75);
    }

    #[test]
    fn test_empty_dashboard() {
        let summary = TeamDashboard::new("core").summary();
        assert_eq!(summary.average_security_score, 0.0);
        assert_eq!(summary.owasp_compliance_rate, "0%");
        assert!(summary.projects.is_empty());
    }

    #[test]
    fn test_store_persists_per_team() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut store = DashboardStore::open("core", dir.path());
            store.record_snapshot(snap("api", 88, 0, true));
        }
        let store = DashboardStore::open("core", dir.path());
        assert_eq!(store.dashboard().total_runs(), 1);
        assert_eq!(store.dashboard().team_id, "core");
        assert_eq!(DashboardStore::open("other", dir.path()).dashboard().total_runs(), 0);
    }
}
