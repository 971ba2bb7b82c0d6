//! OWASP Top 10 review with cross-agent validation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use super::{ask_workers, context_block, Severity};
use crate::agent::AgentSet;
use crate::domain::Result;

/// OWASP Top 10 (2021) category ids and names.
pub const OWASP_TOP_10: [(&str, &str); 10] = [
    ("A01", "Broken Access Control"),
    ("A02", "Cryptographic Failures"),
    ("A03", "Injection"),
    ("A04", "Insecure Design"),
    ("A05", "Security Misconfiguration"),
    ("A06", "Vulnerable and Outdated Components"),
    ("A07", "Identification and Authentication Failures"),
    ("A08", "Software and Data Integrity Failures"),
    ("A09", "Security Logging and Monitoring Failures"),
    ("A10", "Server-Side Request Forgery (SSRF)"),
];

/// Marker a reviewer emits when it has nothing to report.
pub const CLEAN_MARKER: &str = "NO_VULNERABILITIES_FOUND";

pub fn category_name(id: &str) -> Option<&'static str> {
    OWASP_TOP_10
        .iter()
        .find(|(cid, _)| *cid == id)
        .map(|(_, name)| *name)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwaspFinding {
    pub category_id: String,
    pub category_name: String,
    pub severity: Severity,
    pub description: String,
    pub found_by: String,
    #[serde(default)]
    pub confirmed_by: Vec<String>,
    #[serde(default)]
    pub cross_validated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwaspReport {
    pub findings: Vec<OwaspFinding>,
    pub agents_used: Vec<String>,
    /// No cross-validated critical or high finding.
    pub is_clean: bool,
    /// Number of cross-validated findings.
    pub vulnerability_count: usize,
    pub summary: String,
}

impl OwaspReport {
    pub fn from_findings(findings: Vec<OwaspFinding>, agents_used: Vec<String>) -> Self {
        let confirmed: Vec<&OwaspFinding> = findings.iter().filter(|f| f.cross_validated).collect();
        let is_clean = !confirmed
            .iter()
            .any(|f| matches!(f.severity, Severity::Critical | Severity::High));
        let vulnerability_count = confirmed.len();
        let summary = format!(
            "OWASP Scan: {} findings, {} cross-validated, {}",
            findings.len(),
            vulnerability_count,
            if is_clean { "CLEAN" } else { "ISSUES FOUND" }
        );
        Self {
            findings,
            agents_used,
            is_clean,
            vulnerability_count,
            summary,
        }
    }
}

pub struct OwaspScanner<'a> {
    agents: &'a AgentSet,
}

impl<'a> OwaspScanner<'a> {
    pub fn new(agents: &'a AgentSet) -> Self {
        Self { agents }
    }

    /// Ask every worker to review `code` and cross-validate the findings.
    #[instrument(skip_all, fields(code_chars = code.len()))]
    pub async fn scan(&self, code: &str, context: &str) -> Result<OwaspReport> {
        let prompt = scan_prompt(code, context);
        let replies = ask_workers(self.agents, &prompt).await?;

        let agents_used: Vec<String> = replies.iter().map(|(name, _)| name.clone()).collect();
        let mut findings = Vec::new();
        for (agent, reply) in &replies {
            findings.extend(parse_findings(reply, agent));
        }
        cross_validate(&mut findings);

        let report = OwaspReport::from_findings(findings, agents_used);
        info!(
            event = "security.owasp.scanned",
            findings = report.findings.len(),
            confirmed = report.vulnerability_count,
            clean = report.is_clean,
        );
        Ok(report)
    }
}

pub fn scan_prompt(code: &str, context: &str) -> String {
    let categories = OWASP_TOP_10
        .iter()
        .map(|(id, name)| format!("- {id}: {name}"))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Analyze the following code for OWASP Top 10 vulnerabilities.\n\n\
         Categories:\n{categories}\n\n\
         {ctx}Code:\n```\n{code}\n```\n\n\
         For each vulnerability found, respond on its own line in the format:\n\
         [CATEGORY_ID] SEVERITY: description\n\n\
         If no vulnerabilities are found, respond with {CLEAN_MARKER}.",
        ctx = context_block(context),
    )
}

/// One finding per line that mentions a category id.
pub fn parse_findings(reply: &str, agent: &str) -> Vec<OwaspFinding> {
    if reply.contains(CLEAN_MARKER) {
        return Vec::new();
    }
    reply
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| {
            let (id, name) = OWASP_TOP_10.iter().find(|(id, _)| line.contains(id))?;
            let severity = Severity::detect(line, &Severity::ALL).unwrap_or(Severity::Medium);
            Some(OwaspFinding {
                category_id: id.to_string(),
                category_name: name.to_string(),
                severity,
                description: strip_category_prefix(line, id),
                found_by: agent.to_string(),
                confirmed_by: Vec::new(),
                cross_validated: false,
            })
        })
        .collect()
}

fn strip_category_prefix(line: &str, id: &str) -> String {
    let mut out = line.to_string();
    for prefix in [format!("[{id}]"), format!("{id}:"), format!("{id} ")] {
        out = out.replace(&prefix, "");
    }
    out.trim().to_string()
}

/// A category reported by two or more distinct agents is confirmed; each
/// finding in it lists the other agents as confirmers.
pub fn cross_validate(findings: &mut [OwaspFinding]) {
    let mut reporters: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for f in findings.iter() {
        let agents = reporters.entry(f.category_id.clone()).or_default();
        if !agents.contains(&f.found_by) {
            agents.push(f.found_by.clone());
        }
    }
    for f in findings.iter_mut() {
        let Some(agents) = reporters.get(&f.category_id) else {
            continue;
        };
        if agents.len() >= 2 {
            f.confirmed_by = agents.iter().filter(|a| **a != f.found_by).cloned().collect();
        }
        f.cross_validated = !f.confirmed_by.is_empty();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::ScriptedAgent;

    #[test]
    fn test_parse_line_format() {
        let reply = "[A03] HIGH: SQL built by string concat\n\nA07: weak session ids, low\nnothing relevant";
        let found = parse_findings(reply, "claude");
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].category_name, "Injection");
        assert_eq!(found[0].severity, Severity::High);
        assert_eq!(found[0].description, "HIGH: SQL built by string concat");
        assert_eq!(found[1].severity, Severity::Low);
        assert_eq!(found[1].description, "weak session ids, low");
    }

    #[test]
    fn test_clean_marker_wins() {
        assert!(parse_findings("[A01] HIGH: x\nNO_VULNERABILITIES_FOUND", "codex").is_empty());
    }

    #[test]
    fn test_unknown_severity_defaults_to_medium() {
        let found = parse_findings("[A05] debug mode enabled", "codex");
        assert_eq!(found[0].severity, Severity::Medium);
    }

    #[tokio::test]
    async fn test_scan_cross_validates_shared_categories() {
        let agents = AgentSet::new()
            .with("dispatch", ScriptedAgent::fixed("[A03] CRITICAL: ignored"))
            .with("claude", ScriptedAgent::fixed("[A03] CRITICAL: injection\n[A09] LOW: no logs"))
            .with("codex", ScriptedAgent::fixed("[A03] HIGH: injection too"));

        let report = OwaspScanner::new(&agents).scan("code", "").await.unwrap();
        assert_eq!(report.agents_used, vec!["claude", "codex"]);
        assert_eq!(report.findings.len(), 3);
        assert_eq!(report.vulnerability_count, 2);
        assert!(!report.is_clean);
        assert_eq!(report.findings[0].confirmed_by, vec!["codex"]);
        assert!(!report.findings[1].cross_validated);
        assert_eq!(
            report.summary,
            "OWASP Scan: 3 findings, 2 cross-validated, ISSUES FOUND"
        );
    }

    #[tokio::test]
    async fn test_single_reporter_stays_clean() {
        let agents = AgentSet::new()
            .with("claude", ScriptedAgent::fixed("[A01] CRITICAL: admin route open"))
            .with("codex", ScriptedAgent::fixed(CLEAN_MARKER));
        let report = OwaspScanner::new(&agents).scan("code", "web app").await.unwrap();
        assert!(report.is_clean);
        assert_eq!(report.vulnerability_count, 0);
    }

    #[test]
    fn test_prompt_carries_context() {
        let prompt = scan_prompt("x = 1", "payments service");
        assert!(prompt.contains("Context: payments service"));
        assert!(prompt.contains("- A10: Server-Side Request Forgery (SSRF)"));
        assert!(!scan_prompt("x", "").contains("Context:"));
    }
}
