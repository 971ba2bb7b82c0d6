//! STRIDE threat modelling that can evolve with the code.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use super::{ask_workers, context_block, Severity};
use crate::agent::AgentSet;
use crate::domain::{ForgeError, Result};
use crate::store;

const THREAT_SEVERITIES: [Severity; 4] = [
    Severity::Critical,
    Severity::High,
    Severity::Medium,
    Severity::Low,
];

const MITIGATION_MARKER: &str = "MITIGATION:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StrideCategory {
    #[serde(rename = "S")]
    Spoofing,
    #[serde(rename = "T")]
    Tampering,
    #[serde(rename = "R")]
    Repudiation,
    #[serde(rename = "I")]
    InformationDisclosure,
    #[serde(rename = "D")]
    DenialOfService,
    #[serde(rename = "E")]
    ElevationOfPrivilege,
}

impl StrideCategory {
    pub const ALL: [StrideCategory; 6] = [
        StrideCategory::Spoofing,
        StrideCategory::Tampering,
        StrideCategory::Repudiation,
        StrideCategory::InformationDisclosure,
        StrideCategory::DenialOfService,
        StrideCategory::ElevationOfPrivilege,
    ];

    pub fn letter(self) -> char {
        match self {
            StrideCategory::Spoofing => 'S',
            StrideCategory::Tampering => 'T',
            StrideCategory::Repudiation => 'R',
            StrideCategory::InformationDisclosure => 'I',
            StrideCategory::DenialOfService => 'D',
            StrideCategory::ElevationOfPrivilege => 'E',
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            StrideCategory::Spoofing => "Spoofing",
            StrideCategory::Tampering => "Tampering",
            StrideCategory::Repudiation => "Repudiation",
            StrideCategory::InformationDisclosure => "Information Disclosure",
            StrideCategory::DenialOfService => "Denial of Service",
            StrideCategory::ElevationOfPrivilege => "Elevation of Privilege",
        }
    }

    /// First category whose `[X]` tag appears in `line`.
    fn tagged_in(line: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|c| line.contains(&format!("[{}]", c.letter())))
    }
}

impl fmt::Display for StrideCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreatStatus {
    #[default]
    Identified,
    Mitigated,
    Accepted,
    Transferred,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Threat {
    pub id: String,
    pub name: String,
    pub category: StrideCategory,
    pub description: String,
    pub severity: Severity,
    #[serde(default)]
    pub mitigation: String,
    #[serde(default)]
    pub status: ThreatStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThreatModel {
    #[serde(default)]
    pub threats: Vec<Threat>,
    #[serde(default)]
    pub assets: Vec<String>,
    #[serde(default)]
    pub trust_boundaries: Vec<String>,
    #[serde(default)]
    pub data_flows: Vec<String>,
}

impl ThreatModel {
    pub fn unmitigated_count(&self) -> usize {
        self.threats
            .iter()
            .filter(|t| t.status == ThreatStatus::Identified)
            .count()
    }

    pub fn critical_threats(&self) -> Vec<&Threat> {
        self.threats
            .iter()
            .filter(|t| t.severity == Severity::Critical)
            .collect()
    }

    pub fn summary(&self) -> String {
        format!(
            "Threat Model: {} threats ({} critical, {} unmitigated)",
            self.threats.len(),
            self.critical_threats().len(),
            self.unmitigated_count()
        )
    }
}

/// Builds threat models from worker replies and optionally persists the
/// latest one.
pub struct ThreatModelEngine<'a> {
    agents: &'a AgentSet,
    persist_path: Option<PathBuf>,
}

impl<'a> ThreatModelEngine<'a> {
    pub fn new(agents: &'a AgentSet) -> Self {
        Self {
            agents,
            persist_path: None,
        }
    }

    /// Save every analysed model to `path`.
    pub fn with_persistence(mut self, path: impl Into<PathBuf>) -> Self {
        self.persist_path = Some(path.into());
        self
    }

    #[instrument(skip_all, fields(code_chars = code.len()))]
    pub async fn analyze(&self, code: &str, context: &str) -> Result<ThreatModel> {
        let replies = ask_workers(self.agents, &analysis_prompt(code, context)).await?;
        let model = merge_replies(replies.iter().map(|(_, reply)| reply.as_str()));
        info!(
            event = "security.threats.analyzed",
            threats = model.threats.len(),
            critical = model.critical_threats().len(),
        );
        if let Some(path) = &self.persist_path {
            store::save_json(path, &model)?;
            debug!(path = %path.display(), "threat model saved");
        }
        Ok(model)
    }

    /// Ask the first worker for threats introduced by `new_code` and append
    /// those not already named in `existing`.
    #[instrument(skip_all, fields(existing = existing.threats.len()))]
    pub async fn evolve(&self, existing: &ThreatModel, new_code: &str) -> Result<ThreatModel> {
        let (_, agent) = self
            .agents
            .workers()
            .into_iter()
            .next()
            .ok_or_else(|| ForgeError::MissingRole {
                role: "any non-dispatch agent".to_string(),
            })?;
        let reply = agent.execute(&evolve_prompt(existing, new_code), None).await?;

        let mut evolved = existing.clone();
        for threat in parse_threats(&reply) {
            if !evolved.threats.iter().any(|t| t.name == threat.name) {
                evolved.threats.push(threat);
            }
        }
        info!(
            event = "security.threats.evolved",
            added = evolved.threats.len() - existing.threats.len(),
        );
        Ok(evolved)
    }

    /// The persisted model, if persistence is on and a file exists.
    pub fn load(&self) -> Result<Option<ThreatModel>> {
        match &self.persist_path {
            Some(path) => load_model(path),
            None => Ok(None),
        }
    }
}

pub fn load_model(path: &Path) -> Result<Option<ThreatModel>> {
    if !path.exists() {
        return Ok(None);
    }
    let bytes = std::fs::read(path)?;
    Ok(Some(serde_json::from_slice(&bytes)?))
}

pub fn analysis_prompt(code: &str, context: &str) -> String {
    let categories = StrideCategory::ALL
        .iter()
        .map(|c| format!("- {} ({})", c.letter(), c.title()))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Perform a STRIDE threat model analysis on this code.\n\n\
         Code:\n```\n{code}\n```\n\n\
         {ctx}STRIDE Categories:\n{categories}\n\n\
         For each threat found, report:\n\
         - Threat name\n\
         - STRIDE category (S/T/R/I/D/E)\n\
         - Description\n\
         - Severity (critical/high/medium/low)\n\
         - Suggested mitigation\n\n\
         Also identify:\n\
         - Key assets (data, services, credentials)\n\
         - Trust boundaries\n\
         - Data flows\n\n\
         Format threats as: [CATEGORY] SEVERITY NAME: description | MITIGATION: suggestion",
        ctx = context_block(context),
    )
}

fn evolve_prompt(existing: &ThreatModel, new_code: &str) -> String {
    let mut prompt = format!(
        "An existing threat model needs updating based on new code changes.\n\n\
         Existing threats ({}):\n",
        existing.threats.len()
    );
    for t in &existing.threats {
        prompt.push_str(&format!(
            "- [{}] {}: {}\n",
            t.severity.as_str().to_uppercase(),
            t.name,
            t.description
        ));
    }
    prompt.push_str(&format!(
        "\nNew code changes:\n```\n{new_code}\n```\n\n\
         Analyze:\n\
         1. Are any existing threats now mitigated?\n\
         2. Does the new code introduce new threats?\n\
         3. Have any threat severities changed?\n\n\
         Return updated threat list in the same format."
    ));
    prompt
}

/// One threat per line carrying a `[S]`..`[E]` tag. Ids are left empty.
pub fn parse_threats(reply: &str) -> Vec<Threat> {
    reply
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| {
            let category = StrideCategory::tagged_in(line)?;
            let severity = Severity::detect(line, &THREAT_SEVERITIES).unwrap_or(Severity::Medium);
            // ASCII uppercasing keeps byte offsets aligned with `line`.
            let (description, mitigation) = match line.to_ascii_uppercase().find(MITIGATION_MARKER) {
                Some(idx) => (
                    line[..idx].trim(),
                    line[idx + MITIGATION_MARKER.len()..].trim(),
                ),
                None => (line, ""),
            };
            Some(Threat {
                id: String::new(),
                name: format!("{} threat", category.title()),
                category,
                description: description.to_string(),
                severity,
                mitigation: mitigation.to_string(),
                status: ThreatStatus::Identified,
            })
        })
        .collect()
}

/// Number threats `T001..` across all replies, then keep one per name,
/// preferring strictly higher severity. The surviving threat keeps the
/// position of the first with that name.
pub fn merge_replies<'r>(replies: impl IntoIterator<Item = &'r str>) -> ThreatModel {
    let mut merged: Vec<Threat> = Vec::new();
    let mut counter = 0;
    for reply in replies {
        for mut threat in parse_threats(reply) {
            counter += 1;
            threat.id = format!("T{counter:03}");
            match merged.iter_mut().find(|t| t.name == threat.name) {
                Some(seen) if threat.severity.rank() > seen.severity.rank() => *seen = threat,
                Some(_) => {}
                None => merged.push(threat),
            }
        }
    }
    ThreatModel {
        threats: merged,
        ..ThreatModel::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::ScriptedAgent;

    #[test]
    fn test_parse_splits_mitigation() {
        let threats = parse_threats(
            "[S] HIGH Session hijack: cookies lack flags | mitigation: set Secure\nplain text line",
        );
        assert_eq!(threats.len(), 1);
        let t = &threats[0];
        assert_eq!(t.category, StrideCategory::Spoofing);
        assert_eq!(t.name, "Spoofing threat");
        assert_eq!(t.severity, Severity::High);
        assert_eq!(t.description, "[S] HIGH Session hijack: cookies lack flags |");
        assert_eq!(t.mitigation, "set Secure");
    }

    #[test]
    fn test_merge_numbers_and_keeps_worst() {
        let model = merge_replies([
            "[T] LOW tamper: a\n[D] HIGH flood: b",
            "[T] CRITICAL tamper: c",
        ]);
        assert_eq!(model.threats.len(), 2);
        assert_eq!(model.threats[0].id, "T003");
        assert_eq!(model.threats[0].severity, Severity::Critical);
        assert_eq!(model.threats[1].id, "T002");
        assert_eq!(model.summary(), "Threat Model: 2 threats (1 critical, 2 unmitigated)");
    }

    #[test]
    fn test_threat_serialises_with_letter_category() {
        let t = &parse_threats("[I] MEDIUM leak: logs secrets")[0];
        let json = serde_json::to_value(t).unwrap();
        assert_eq!(json["category"], "I");
        assert_eq!(json["severity"], "medium");
        assert_eq!(json["status"], "identified");
    }

    #[tokio::test]
    async fn test_analyze_persists_and_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("threats/app.json");
        let agents = AgentSet::new()
            .with("claude", ScriptedAgent::fixed("[E] HIGH sudo: runs as root"))
            .with("codex", ScriptedAgent::fixed("[R] LOW audit: no audit log"));

        let engine = ThreatModelEngine::new(&agents).with_persistence(&path);
        let model = engine.analyze("code", "").await.unwrap();
        assert_eq!(model.threats.len(), 2);
        assert_eq!(engine.load().unwrap(), Some(model));
    }

    #[tokio::test]
    async fn test_evolve_appends_only_new_names() {
        let existing = merge_replies(["[S] HIGH spoof: forged tokens"]);
        let codex = ScriptedAgent::fixed("[S] LOW spoof: again\n[T] MEDIUM tamper: unsigned uploads");
        let agents = AgentSet::new()
            .with("dispatch", ScriptedAgent::fixed("unused"))
            .with("codex", codex.clone());

        let evolved = ThreatModelEngine::new(&agents)
            .evolve(&existing, "fn upload() {}")
            .await
            .unwrap();
        assert_eq!(evolved.threats.len(), 2);
        assert_eq!(evolved.threats[1].name, "Tampering threat");
        assert!(codex.prompts()[0].contains("- [HIGH] Spoofing threat: [S] HIGH spoof: forged tokens"));
    }

    #[tokio::test]
    async fn test_evolve_without_workers_errors() {
        let agents = AgentSet::new().with("dispatch", ScriptedAgent::fixed("x"));
        let err = ThreatModelEngine::new(&agents)
            .evolve(&ThreatModel::default(), "x")
            .await
            .unwrap_err();
        assert!(matches!(err, ForgeError::MissingRole { .. }));
    }
}
