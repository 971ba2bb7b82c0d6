//! SOC 2, HIPAA and PCI-DSS control mapping.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use super::{ask_workers, context_block};
use crate::agent::AgentSet;
use crate::domain::Result;
use crate::parse::window;

/// Bytes of reply text after a control id searched for its status.
const STATUS_WINDOW: usize = 200;

const SOC2_CONTROLS: &[(&str, &str)] = &[
    ("CC6.1", "Logical and physical access controls"),
    ("CC6.2", "Prior to issuing system credentials, registration/authorization"),
    ("CC6.3", "Role-based access control"),
    ("CC6.6", "Measures against threats outside system boundaries"),
    ("CC6.7", "Restrict transmission/movement of data to authorized users"),
    ("CC6.8", "Prevent/detect unauthorized software"),
    ("CC7.1", "Monitoring for security events"),
    ("CC7.2", "Monitor system components for anomalies"),
    ("CC8.1", "Change management processes"),
];

const HIPAA_CONTROLS: &[(&str, &str)] = &[
    ("164.312(a)(1)", "Access control: unique user identification"),
    ("164.312(a)(2)(iv)", "Encryption and decryption"),
    ("164.312(b)", "Audit controls"),
    ("164.312(c)(1)", "Integrity: protect ePHI from improper alteration"),
    ("164.312(d)", "Person or entity authentication"),
    ("164.312(e)(1)", "Transmission security"),
    ("164.308(a)(1)", "Security management process"),
    ("164.308(a)(5)", "Security awareness and training"),
];

const PCI_DSS_CONTROLS: &[(&str, &str)] = &[
    ("Req 2", "Do not use vendor-supplied defaults"),
    ("Req 3", "Protect stored cardholder data"),
    ("Req 4", "Encrypt transmission of cardholder data"),
    ("Req 6", "Develop and maintain secure systems"),
    ("Req 7", "Restrict access by business need to know"),
    ("Req 8", "Identify and authenticate access"),
    ("Req 10", "Track and monitor all access"),
    ("Req 11", "Regularly test security systems"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceFramework {
    Soc2,
    Hipaa,
    PciDss,
}

impl ComplianceFramework {
    pub const ALL: [ComplianceFramework; 3] = [
        ComplianceFramework::Soc2,
        ComplianceFramework::Hipaa,
        ComplianceFramework::PciDss,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ComplianceFramework::Soc2 => "soc2",
            ComplianceFramework::Hipaa => "hipaa",
            ComplianceFramework::PciDss => "pci_dss",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.as_str() == name)
    }

    /// Known frameworks among `names`, unknown ones dropped. Empty input
    /// means every framework.
    pub fn select(names: &[String]) -> Vec<Self> {
        if names.is_empty() {
            return Self::ALL.to_vec();
        }
        names.iter().filter_map(|n| Self::from_name(n)).collect()
    }

    /// `(control id, control name)` pairs in assessment order.
    pub fn controls(self) -> &'static [(&'static str, &'static str)] {
        match self {
            ComplianceFramework::Soc2 => SOC2_CONTROLS,
            ComplianceFramework::Hipaa => HIPAA_CONTROLS,
            ComplianceFramework::PciDss => PCI_DSS_CONTROLS,
        }
    }
}

impl fmt::Display for ComplianceFramework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceStatus {
    Pass,
    Fail,
    Partial,
    NotApplicable,
}

impl ComplianceStatus {
    /// Status read from the text following a control id (already uppercased).
    fn read(upper_window: &str) -> Self {
        if upper_window.contains("FAIL") {
            ComplianceStatus::Fail
        } else if upper_window.contains("PARTIAL") {
            ComplianceStatus::Partial
        } else if upper_window.contains("NOT_APPLICABLE") || upper_window.contains("N/A") {
            ComplianceStatus::NotApplicable
        } else {
            ComplianceStatus::Pass
        }
    }

    /// Conservative merge: any fail, then any partial. Only unanimous (or
    /// absent) not-applicable votes stay not applicable.
    pub fn merge(votes: &[ComplianceStatus]) -> Self {
        if votes.contains(&ComplianceStatus::Fail) {
            ComplianceStatus::Fail
        } else if votes.contains(&ComplianceStatus::Partial) {
            ComplianceStatus::Partial
        } else if votes.iter().all(|v| *v == ComplianceStatus::NotApplicable) {
            ComplianceStatus::NotApplicable
        } else {
            ComplianceStatus::Pass
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceCheck {
    pub framework: ComplianceFramework,
    pub control_id: String,
    pub control_name: String,
    pub status: ComplianceStatus,
    #[serde(default)]
    pub evidence: String,
    #[serde(default)]
    pub recommendation: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComplianceReport {
    pub checks: Vec<ComplianceCheck>,
    pub frameworks_assessed: Vec<ComplianceFramework>,
    pub agents_used: Vec<String>,
}

impl ComplianceReport {
    /// Passed over applicable checks; 1.0 when nothing applies.
    pub fn pass_rate(&self) -> f64 {
        let applicable: Vec<_> = self
            .checks
            .iter()
            .filter(|c| c.status != ComplianceStatus::NotApplicable)
            .collect();
        if applicable.is_empty() {
            return 1.0;
        }
        let passed = applicable
            .iter()
            .filter(|c| c.status == ComplianceStatus::Pass)
            .count();
        passed as f64 / applicable.len() as f64
    }

    pub fn failing_checks(&self) -> Vec<&ComplianceCheck> {
        self.checks
            .iter()
            .filter(|c| c.status == ComplianceStatus::Fail)
            .collect()
    }

    pub fn summary(&self) -> String {
        let passed = self
            .checks
            .iter()
            .filter(|c| c.status == ComplianceStatus::Pass)
            .count();
        format!(
            "Compliance: {}/{} passed, {} failed, {:.0}% pass rate",
            passed,
            self.checks.len(),
            self.failing_checks().len(),
            self.pass_rate() * 100.0
        )
    }

    /// Whether each assessed framework has no failing control.
    pub fn framework_results(&self) -> BTreeMap<ComplianceFramework, bool> {
        self.frameworks_assessed
            .iter()
            .map(|fw| {
                let clean = !self
                    .checks
                    .iter()
                    .any(|c| c.framework == *fw && c.status == ComplianceStatus::Fail);
                (*fw, clean)
            })
            .collect()
    }
}

pub struct ComplianceMapper<'a> {
    agents: &'a AgentSet,
}

impl<'a> ComplianceMapper<'a> {
    pub fn new(agents: &'a AgentSet) -> Self {
        Self { agents }
    }

    /// Assess `code` against each framework in turn; every worker answers
    /// each framework concurrently.
    #[instrument(skip_all, fields(frameworks = frameworks.len()))]
    pub async fn assess(
        &self,
        code: &str,
        frameworks: &[ComplianceFramework],
        context: &str,
    ) -> Result<ComplianceReport> {
        let frameworks = if frameworks.is_empty() {
            ComplianceFramework::ALL.to_vec()
        } else {
            frameworks.to_vec()
        };

        let mut checks = Vec::new();
        for framework in &frameworks {
            let replies = ask_workers(self.agents, &assessment_prompt(code, *framework, context)).await?;
            checks.extend(merge_assessments(
                *framework,
                replies.iter().map(|(_, reply)| reply.as_str()),
            ));
        }

        let report = ComplianceReport {
            checks,
            frameworks_assessed: frameworks,
            agents_used: self
                .agents
                .workers()
                .into_iter()
                .map(|(name, _)| name.to_string())
                .collect(),
        };
        info!(
            event = "security.compliance.assessed",
            checks = report.checks.len(),
            failed = report.failing_checks().len(),
            pass_rate = report.pass_rate(),
        );
        Ok(report)
    }
}

pub fn assessment_prompt(code: &str, framework: ComplianceFramework, context: &str) -> String {
    let controls = framework
        .controls()
        .iter()
        .map(|(id, name)| format!("- {id}: {name}"))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Assess this code against {fw} compliance controls.\n\n\
         Code:\n```\n{code}\n```\n\n\
         {ctx}Controls to check:\n{controls}\n\n\
         For each control, report:\n\
         - Control ID\n\
         - Status: PASS, FAIL, PARTIAL, or NOT_APPLICABLE\n\
         - Evidence or reasoning\n\
         - Recommendation if failing\n\n\
         Format: CONTROL_ID: STATUS - evidence | RECOMMENDATION: suggestion",
        fw = framework.as_str().to_uppercase(),
        ctx = context_block(context),
    )
}

/// One check per control of `framework`, voting across `replies`.
///
/// A reply votes on a control only if it mentions the control id; the vote
/// is read from the text following the id's first mention.
pub fn merge_assessments<'r>(
    framework: ComplianceFramework,
    replies: impl IntoIterator<Item = &'r str>,
) -> Vec<ComplianceCheck> {
    let controls = framework.controls();
    let mut votes: Vec<Vec<ComplianceStatus>> = vec![Vec::new(); controls.len()];

    for reply in replies {
        let upper = reply.to_uppercase();
        for (slot, (id, _)) in votes.iter_mut().zip(controls) {
            if !reply.contains(id) {
                continue;
            }
            let status = match upper.find(&id.to_uppercase()) {
                Some(idx) => ComplianceStatus::read(window(&upper, idx, STATUS_WINDOW)),
                None => ComplianceStatus::Pass,
            };
            slot.push(status);
        }
    }

    controls
        .iter()
        .zip(votes)
        .map(|((id, name), votes)| ComplianceCheck {
            framework,
            control_id: id.to_string(),
            control_name: name.to_string(),
            status: ComplianceStatus::merge(&votes),
            evidence: String::new(),
            recommendation: String::new(),
        })
        .collect()
}
