//! Dependency verification with local slopsquatting heuristics.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use super::ask_workers;
use crate::agent::AgentSet;
use crate::domain::Result;
use crate::parse::window;

/// Names that look like squats but are well-known packages.
pub const KNOWN_SAFE: [&str; 5] = [
    "python-dateutil",
    "python-dotenv",
    "python-jose",
    "python-multipart",
    "python-json-logger",
];

const TYPOS: [(&str, &[&str]); 7] = [
    ("requests", &["requets", "reqeusts", "request", "requsts"]),
    ("numpy", &["numppy", "numpi", "nympy"]),
    ("pandas", &["pandsa", "pnadas", "pandass"]),
    ("flask", &["flaskk", "flaask"]),
    ("django", &["djnago", "dajngo", "djangoo"]),
    ("pytest", &["pytets", "pytset"]),
    ("pydantic", &["pydanctic", "pydanticv"]),
];

const VERSION_OPERATORS: [&str; 5] = [">=", "==", "<=", "~=", "!="];

/// Bytes of reply text after a package name searched for its rating.
const RATING_WINDOW: usize = 200;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Safe,
    Low,
    Medium,
    High,
    Critical,
    #[default]
    Unknown,
}

impl RiskLevel {
    pub fn is_risky(self) -> bool {
        matches!(self, RiskLevel::High | RiskLevel::Critical)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Safe => "safe",
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
            RiskLevel::Unknown => "unknown",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rating keywords in the order they are searched, with the level each maps to.
const RATINGS: [(&str, RiskLevel); 5] = [
    ("critical", RiskLevel::Critical),
    ("high_risk", RiskLevel::High),
    ("medium_risk", RiskLevel::Medium),
    ("low_risk", RiskLevel::Low),
    ("safe", RiskLevel::Safe),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyInfo {
    pub name: String,
    #[serde(default)]
    pub version: String,
    /// Ecosystem, e.g. `pypi`.
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub risk_reasons: Vec<String>,
    #[serde(default)]
    pub verified_by: Vec<String>,
}

impl DependencyInfo {
    /// Parse a requirement such as `requests>=2.31` and run the local
    /// squatting checks on its name.
    pub fn from_requirement(requirement: &str, ecosystem: &str) -> Self {
        let (name, version) = split_requirement(requirement);
        let risk_reasons = detect_slopsquatting(&name);
        let risk_level = if risk_reasons.is_empty() {
            RiskLevel::Unknown
        } else {
            RiskLevel::High
        };
        Self {
            name,
            version,
            source: ecosystem.to_string(),
            verified: false,
            risk_level,
            risk_reasons,
            verified_by: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SupplyChainReport {
    pub dependencies: Vec<DependencyInfo>,
    pub agents_used: Vec<String>,
    pub slopsquatting_suspects: Vec<String>,
}

impl SupplyChainReport {
    pub fn total_deps(&self) -> usize {
        self.dependencies.len()
    }

    pub fn verified_count(&self) -> usize {
        self.dependencies.iter().filter(|d| d.verified).count()
    }

    pub fn risk_count(&self) -> usize {
        self.dependencies.iter().filter(|d| d.risk_level.is_risky()).count()
    }

    pub fn is_safe(&self) -> bool {
        self.risk_count() == 0 && self.slopsquatting_suspects.is_empty()
    }

    pub fn summary(&self) -> String {
        format!(
            "Supply Chain: {}/{} verified, {} risks, {} slopsquatting suspects",
            self.verified_count(),
            self.total_deps(),
            self.risk_count(),
            self.slopsquatting_suspects.len()
        )
    }
}

/// `(name, version)` of a requirement string. The version is whatever
/// follows the first operator present.
pub fn split_requirement(requirement: &str) -> (String, String) {
    let name = requirement
        .split(">=")
        .next()
        .and_then(|s| s.split("==").next())
        .and_then(|s| s.split("<=").next())
        .unwrap_or_default()
        .trim()
        .to_string();
    let version = VERSION_OPERATORS
        .iter()
        .find_map(|op| requirement.split_once(op))
        .map(|(_, v)| v.trim().to_string())
        .unwrap_or_default();
    (name, version)
}

/// Reasons `name` looks like a squatted package; empty when it looks fine.
pub fn detect_slopsquatting(name: &str) -> Vec<String> {
    if KNOWN_SAFE.contains(&name) {
        return Vec::new();
    }
    let mut reasons = Vec::new();
    if name.starts_with("python-") {
        reasons.push("python- prefix often used in typosquatting".to_string());
    }
    if name.ends_with("-python") {
        reasons.push("-python suffix often used in typosquatting".to_string());
    }
    if has_run_of(name, 4) {
        reasons.push("excessive repeated characters".to_string());
    }
    for (legit, typos) in TYPOS {
        if typos.contains(&name) {
            reasons.push(format!("possible typosquat of '{legit}'"));
        }
    }
    reasons
}

fn has_run_of(text: &str, len: usize) -> bool {
    let mut run = 0;
    let mut prev = None;
    for c in text.chars() {
        run = if Some(c) == prev { run + 1 } else { 1 };
        if run >= len {
            return true;
        }
        prev = Some(c);
    }
    false
}

pub fn verify_prompt(deps: &[DependencyInfo], ecosystem: &str) -> String {
    let list = deps
        .iter()
        .map(|d| {
            if d.version.is_empty() {
                format!("- {}", d.name)
            } else {
                format!("- {} {}", d.name, d.version)
            }
        })
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Verify these {ecosystem} dependencies for supply chain safety.\n\n\
         Dependencies:\n{list}\n\n\
         For each dependency, assess:\n\
         1. Is this a real, legitimate package?\n\
         2. Is the name a possible typosquat of a popular package?\n\
         3. Are there known security advisories?\n\
         4. Is the maintainer trustworthy?\n\n\
         Rate each: SAFE, LOW_RISK, MEDIUM_RISK, HIGH_RISK, or CRITICAL\n\
         Format: PACKAGE_NAME: RISK_LEVEL - reason"
    )
}

/// Fold one agent's reply into `deps`.
///
/// A dependency counts as seen when its name appears anywhere in the reply.
/// The first rating keyword found shortly after the first mention replaces
/// its risk level. Two distinct agents seeing it marks it verified.
pub fn merge_verification(deps: &mut [DependencyInfo], reply: &str, agent: &str) {
    let reply = reply.to_lowercase();
    for dep in deps.iter_mut() {
        let name = dep.name.to_lowercase();
        let Some(idx) = reply.find(&name) else {
            continue;
        };
        if !dep.verified_by.iter().any(|a| a == agent) {
            dep.verified_by.push(agent.to_string());
        }
        let near = window(&reply, idx, RATING_WINDOW);
        if let Some((_, level)) = RATINGS
            .iter()
            .find(|(kw, _)| near.contains(kw) || near.contains(&kw.replace('_', " ")))
        {
            dep.risk_level = *level;
        }
        if dep.verified_by.len() >= 2 {
            dep.verified = true;
        }
    }
}

pub struct SupplyChainVerifier<'a> {
    agents: &'a AgentSet,
}

impl<'a> SupplyChainVerifier<'a> {
    pub fn new(agents: &'a AgentSet) -> Self {
        Self { agents }
    }

    #[instrument(skip_all, fields(ecosystem = %ecosystem, deps = requirements.len()))]
    pub async fn verify(&self, requirements: &[String], ecosystem: &str) -> Result<SupplyChainReport> {
        let mut deps: Vec<DependencyInfo> = requirements
            .iter()
            .map(|r| DependencyInfo::from_requirement(r, ecosystem))
            .collect();
        let slopsquatting_suspects: Vec<String> = deps
            .iter()
            .filter(|d| !d.risk_reasons.is_empty())
            .map(|d| d.name.clone())
            .collect();
        for name in &slopsquatting_suspects {
            warn!(event = "security.supply_chain.suspect", package = %name);
        }

        let replies = ask_workers(self.agents, &verify_prompt(&deps, ecosystem)).await?;
        for (agent, reply) in &replies {
            merge_verification(&mut deps, reply, agent);
        }

        let report = SupplyChainReport {
            dependencies: deps,
            agents_used: replies.into_iter().map(|(name, _)| name).collect(),
            slopsquatting_suspects,
        };
        info!(
            event = "security.supply_chain.verified",
            total = report.total_deps(),
            verified = report.verified_count(),
            risks = report.risk_count(),
        );
        Ok(report)
    }
}
