//! Security attestation: one scored verdict over whichever scans ran.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::info;

use super::{
    ComplianceFramework, ComplianceMapper, ComplianceReport, OwaspReport, OwaspScanner,
    SupplyChainReport, SupplyChainVerifier, ThreatModel, ThreatModelEngine, ThreatStatus,
};
use crate::agent::AgentSet;
use crate::domain::{short_digest, Result};

/// Points each performed check contributes at most.
const CHECK_POINTS: f64 = 25.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Strong,
    Acceptable,
    NeedsImprovement,
    CriticalIssues,
}

impl Verdict {
    pub fn from_score(score: u32) -> Self {
        match score {
            90.. => Verdict::Strong,
            70..=89 => Verdict::Acceptable,
            50..=69 => Verdict::NeedsImprovement,
            _ => Verdict::CriticalIssues,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Strong => "STRONG",
            Verdict::Acceptable => "ACCEPTABLE",
            Verdict::NeedsImprovement => "NEEDS_IMPROVEMENT",
            Verdict::CriticalIssues => "CRITICAL_ISSUES",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttestationMetadata {
    pub timestamp: DateTime<Utc>,
    pub version: String,
    #[serde(default)]
    pub agents_used: Vec<String>,
    /// First 16 hex chars of the code's SHA-256.
    pub code_hash: String,
    #[serde(default)]
    pub strategy_used: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityAttestation {
    pub metadata: AttestationMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owasp: Option<OwaspReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supply_chain: Option<SupplyChainReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threat_model: Option<ThreatModel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compliance: Option<ComplianceReport>,
}

impl SecurityAttestation {
    /// 0-100. Each present report is worth up to 25 points; the sum is
    /// scaled by `4 / checks` and capped at 100.
    pub fn overall_score(&self) -> u32 {
        let mut score = 0u32;
        let mut checks = 0u32;

        if let Some(owasp) = &self.owasp {
            checks += 1;
            score += if owasp.is_clean {
                25
            } else {
                let penalty = (owasp.vulnerability_count.saturating_mul(5)).min(25) as u32;
                25 - penalty
            };
        }
        if let Some(supply) = &self.supply_chain {
            checks += 1;
            score += if supply.is_safe() {
                25
            } else {
                points(supply.verified_count() as f64 / supply.total_deps().max(1) as f64)
            };
        }
        if let Some(model) = &self.threat_model {
            checks += 1;
            score += if model.critical_threats().is_empty() {
                25
            } else {
                let mitigated = model
                    .threats
                    .iter()
                    .filter(|t| t.status == ThreatStatus::Mitigated)
                    .count();
                points(mitigated as f64 / model.threats.len().max(1) as f64)
            };
        }
        if let Some(compliance) = &self.compliance {
            checks += 1;
            score += points(compliance.pass_rate());
        }

        if checks == 0 {
            return 0;
        }
        ((score as f64 * 4.0 / checks as f64).floor() as u32).min(100)
    }

    pub fn verdict(&self) -> Verdict {
        Verdict::from_score(self.overall_score())
    }

    pub fn summary(&self) -> String {
        let mut lines = vec![format!(
            "Security Attestation: {} ({}/100)",
            self.verdict(),
            self.overall_score()
        )];
        if let Some(r) = &self.owasp {
            lines.push(r.summary.clone());
        }
        if let Some(r) = &self.supply_chain {
            lines.push(r.summary());
        }
        if let Some(r) = &self.threat_model {
            lines.push(r.summary());
        }
        if let Some(r) = &self.compliance {
            lines.push(r.summary());
        }
        lines.join("\n")
    }

    /// Compact report: metadata, score, verdict and one small object per
    /// performed check.
    pub fn to_report(&self) -> Value {
        let mut report = Map::new();
        report.insert("metadata".into(), json!(self.metadata));
        report.insert("overall_score".into(), json!(self.overall_score()));
        report.insert("verdict".into(), json!(self.verdict()));
        if let Some(r) = &self.owasp {
            report.insert(
                "owasp".into(),
                json!({ "clean": r.is_clean, "findings": r.vulnerability_count }),
            );
        }
        if let Some(r) = &self.supply_chain {
            report.insert(
                "supply_chain".into(),
                json!({
                    "safe": r.is_safe(),
                    "verified": r.verified_count(),
                    "total": r.total_deps(),
                    "risks": r.risk_count(),
                }),
            );
        }
        if let Some(r) = &self.threat_model {
            report.insert(
                "threat_model".into(),
                json!({
                    "total_threats": r.threats.len(),
                    "critical": r.critical_threats().len(),
                    "unmitigated": r.unmitigated_count(),
                }),
            );
        }
        if let Some(r) = &self.compliance {
            report.insert(
                "compliance".into(),
                json!({ "pass_rate": r.pass_rate(), "frameworks": r.framework_results() }),
            );
        }
        Value::Object(report)
    }
}

fn points(ratio: f64) -> u32 {
    (CHECK_POINTS * ratio).floor().max(0.0) as u32
}

/// Which scans [`run_audit`] performs.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditOptions {
    pub owasp: bool,
    pub threats: bool,
    /// Compliance frameworks; empty skips compliance.
    pub frameworks: Vec<ComplianceFramework>,
    /// Requirements to verify; empty skips supply chain.
    pub dependencies: Vec<String>,
    pub ecosystem: String,
    pub context: String,
    pub strategy: String,
}

impl Default for AuditOptions {
    fn default() -> Self {
        Self {
            owasp: true,
            threats: true,
            frameworks: Vec::new(),
            dependencies: Vec::new(),
            ecosystem: "pypi".to_string(),
            context: String::new(),
            strategy: String::new(),
        }
    }
}

pub struct AttestationGenerator {
    version: String,
}

impl Default for AttestationGenerator {
    fn default() -> Self {
        Self::new(crate::VERSION)
    }
}

impl AttestationGenerator {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn generate(
        &self,
        code: &str,
        owasp: Option<OwaspReport>,
        supply_chain: Option<SupplyChainReport>,
        threat_model: Option<ThreatModel>,
        compliance: Option<ComplianceReport>,
        agents_used: Vec<String>,
        strategy: &str,
    ) -> SecurityAttestation {
        SecurityAttestation {
            metadata: AttestationMetadata {
                timestamp: Utc::now(),
                version: self.version.clone(),
                agents_used,
                code_hash: short_digest(code),
                strategy_used: strategy.to_string(),
            },
            owasp,
            supply_chain,
            threat_model,
            compliance,
        }
    }
}

/// Run the selected scans on `code` one after another and attest the result.
pub async fn run_audit(agents: &AgentSet, code: &str, options: &AuditOptions) -> Result<SecurityAttestation> {
    let owasp = if options.owasp {
        Some(OwaspScanner::new(agents).scan(code, &options.context).await?)
    } else {
        None
    };
    let supply_chain = if options.dependencies.is_empty() {
        None
    } else {
        Some(
            SupplyChainVerifier::new(agents)
                .verify(&options.dependencies, &options.ecosystem)
                .await?,
        )
    };
    let threat_model = if options.threats {
        Some(ThreatModelEngine::new(agents).analyze(code, &options.context).await?)
    } else {
        None
    };
    let compliance = if options.frameworks.is_empty() {
        None
    } else {
        Some(
            ComplianceMapper::new(agents)
                .assess(code, &options.frameworks, &options.context)
                .await?,
        )
    };

    let agents_used = agents
        .workers()
        .into_iter()
        .map(|(name, _)| name.to_string())
        .collect();
    let attestation = AttestationGenerator::default().generate(
        code,
        owasp,
        supply_chain,
        threat_model,
        compliance,
        agents_used,
        &options.strategy,
    );
    info!(
        event = "security.attested",
        score = attestation.overall_score(),
        verdict = %attestation.verdict(),
    );
    Ok(attestation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::{DependencyInfo, OwaspFinding, RiskLevel, Severity, Threat, StrideCategory};

    fn generator() -> AttestationGenerator {
        AttestationGenerator::new("test")
    }

    fn dirty_owasp(confirmed: usize) -> OwaspReport {
        let finding = OwaspFinding {
            category_id: "A03".into(),
            category_name: "Injection".into(),
            severity: Severity::Critical,
            description: "x".into(),
            found_by: "claude".into(),
            confirmed_by: vec!["codex".into()],
            cross_validated: true,
        };
        OwaspReport::from_findings(vec![finding; confirmed], vec![])
    }

    #[test]
    fn test_no_checks_scores_zero() {
        let a = generator().generate("x", None, None, None, None, vec![], "");
        assert_eq!(a.overall_score(), 0);
        assert_eq!(a.verdict(), Verdict::CriticalIssues);
        assert_eq!(a.metadata.code_hash.len(), 16);
    }

    #[test]
    fn test_owasp_partial_credit_scaled() {
        // 2 confirmed → 15 of 25, scaled by 4
        let a = generator().generate("x", Some(dirty_owasp(2)), None, None, None, vec![], "");
        assert_eq!(a.overall_score(), 60);
        assert_eq!(a.verdict(), Verdict::NeedsImprovement);

        let a = generator().generate("x", Some(dirty_owasp(9)), None, None, None, vec![], "");
        assert_eq!(a.overall_score(), 0);
    }

    #[test]
    fn test_mixed_checks() {
        let supply = SupplyChainReport {
            dependencies: vec![
                DependencyInfo {
                    verified: true,
                    ..DependencyInfo::from_requirement("flask", "pypi")
                },
                DependencyInfo {
                    risk_level: RiskLevel::Critical,
                    ..DependencyInfo::from_requirement("evil", "pypi")
                },
                DependencyInfo::from_requirement("numpy", "pypi"),
            ],
            agents_used: vec![],
            slopsquatting_suspects: vec![],
        };
        let threats = ThreatModel {
            threats: vec![Threat {
                id: "T001".into(),
                name: "Spoofing threat".into(),
                category: StrideCategory::Spoofing,
                description: "d".into(),
                severity: Severity::Low,
                mitigation: String::new(),
                status: ThreatStatus::Identified,
            }],
            ..ThreatModel::default()
        };
        // owasp clean 25 + supply floor(25/3)=8 + threats 25 = 58; ×4/3 = 77
        let owasp = OwaspReport::from_findings(vec![], vec![]);
        let a = generator().generate("x", Some(owasp), Some(supply), Some(threats), None, vec![], "s");
        assert_eq!(a.overall_score(), 77);
        assert_eq!(a.verdict(), Verdict::Acceptable);
        assert!(a.summary().starts_with("Security Attestation: ACCEPTABLE (77/100)\nOWASP Scan:"));

        let report = a.to_report();
        assert_eq!(report["verdict"], "ACCEPTABLE");
        assert_eq!(report["supply_chain"]["risks"], 1);
        assert_eq!(report["threat_model"]["unmitigated"], 1);
        assert!(report.get("compliance").is_none());
    }

    #[test]
    fn test_attestation_round_trips() {
        let a = generator().generate("x", Some(dirty_owasp(1)), None, None, None, vec!["claude".into()], "");
        let value = serde_json::to_value(&a).unwrap();
        let back: SecurityAttestation = serde_json::from_value(value).unwrap();
        assert_eq!(back, a);
    }
}
