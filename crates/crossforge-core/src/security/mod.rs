//! Security review by cross-vendor agents.
//!
//! Each scanner sends one prompt to every worker role (all but `dispatch`)
//! concurrently and merges the free-text replies by keyword matching.
//! Unrecognised replies contribute nothing; they never error.

pub mod attestation;
pub mod compliance;
pub mod owasp;
pub mod supply_chain;
pub mod threat_model;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::agent::{fan_out, AgentSet};
use crate::domain::Result;

pub use attestation::{
    run_audit, AttestationGenerator, AttestationMetadata, AuditOptions, SecurityAttestation, Verdict,
};
pub use compliance::{
    ComplianceCheck, ComplianceFramework, ComplianceMapper, ComplianceReport, ComplianceStatus,
};
pub use owasp::{OwaspFinding, OwaspReport, OwaspScanner};
pub use supply_chain::{DependencyInfo, RiskLevel, SupplyChainReport, SupplyChainVerifier};
pub use threat_model::{StrideCategory, Threat, ThreatModel, ThreatModelEngine, ThreatStatus};

/// Finding severity, most severe first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

impl Severity {
    pub const ALL: [Severity; 5] = [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
        Severity::Info,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
            Severity::Info => "info",
        }
    }

    /// First severity (most severe first) whose name appears anywhere in
    /// `line`, case-insensitively, among `allowed`.
    pub fn detect(line: &str, allowed: &[Severity]) -> Option<Severity> {
        let upper = line.to_uppercase();
        allowed
            .iter()
            .copied()
            .find(|sev| upper.contains(&sev.as_str().to_uppercase()))
    }

    /// Ordering weight, higher is worse; `Info` is 0.
    pub fn rank(self) -> u8 {
        match self {
            Severity::Critical => 4,
            Severity::High => 3,
            Severity::Medium => 2,
            Severity::Low => 1,
            Severity::Info => 0,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Send `prompt` to every worker concurrently; `(role, reply)` in
/// registration order.
pub(crate) async fn ask_workers(agents: &AgentSet, prompt: &str) -> Result<Vec<(String, String)>> {
    let workers = agents.workers();
    let handles: Vec<_> = workers.iter().map(|(_, agent)| *agent).collect();
    let replies = fan_out(&handles, prompt).await?;
    Ok(workers
        .iter()
        .map(|(name, _)| name.to_string())
        .zip(replies)
        .collect())
}

/// `Context: ...` paragraph, or nothing for an empty context.
pub(crate) fn context_block(context: &str) -> String {
    if context.is_empty() {
        String::new()
    } else {
        format!("Context: {context}\n\n")
    }
}
