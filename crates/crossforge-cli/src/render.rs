//! Terminal rendering for command results.

use std::fmt::Write as _;

use crossforge_core::cloud::DashboardSummary;
use crossforge_core::security::SupplyChainReport;
use crossforge_core::{PipelineResult, SecurityAttestation};
use serde::Serialize;

/// Longest slice of generated code echoed after a run.
pub const CODE_PREVIEW_CHARS: usize = 1000;

/// Plain-text table with a title and left-aligned columns.
pub struct Table {
    title: String,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(title: impl Into<String>, headers: &[&str]) -> Self {
        Self {
            title: title.into(),
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn row<I, S>(&mut self, cells: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rows.push(cells.into_iter().map(Into::into).collect());
        self
    }

    pub fn render(&self) -> String {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.chars().count()).collect();
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                let w = cell.chars().count();
                match widths.get_mut(i) {
                    Some(slot) => *slot = (*slot).max(w),
                    None => widths.push(w),
                }
            }
        }

        let line = |cells: &[String]| -> String {
            let padded: Vec<String> = widths
                .iter()
                .enumerate()
                .map(|(i, w)| {
                    let cell = cells.get(i).map(String::as_str).unwrap_or("");
                    format!("{cell:<w$}")
                })
                .collect();
            padded.join("  ").trim_end().to_string()
        };
        let rule: String = "-".repeat(widths.iter().sum::<usize>() + 2 * widths.len().saturating_sub(1));

        let mut out = String::new();
        let _ = writeln!(out, "{}", self.title);
        let _ = writeln!(out, "{}", line(&self.headers));
        let _ = writeln!(out, "{rule}");
        for row in &self.rows {
            let _ = writeln!(out, "{}", line(row));
        }
        out
    }
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn ok(flag: bool) -> &'static str {
    if flag {
        "OK"
    } else {
        "FAIL"
    }
}

pub fn percent(rate: f64) -> String {
    format!("{:.0}%", rate * 100.0)
}

/// First [`CODE_PREVIEW_CHARS`] characters of `code`.
pub fn code_preview(code: &str) -> String {
    code.chars().take(CODE_PREVIEW_CHARS).collect()
}

pub fn pipeline_result(result: &PipelineResult) -> String {
    let c = &result.confidence;
    let mut table = Table::new("Confidence Report", &["Check", "Status"]);
    if let Some(routed) = result.raw.get_str("routed_to") {
        table.row(["Routed to", routed]);
    }
    table
        .row(["Architecture preserved", ok(c.architecture_preserved)])
        .row(["Tests passing", ok(c.tests_passing)])
        .row(["Vulnerabilities".to_string(), c.vulnerabilities_found.to_string()])
        .row([
            "Dependencies verified",
            if c.dependencies_verified { "OK" } else { "SKIP" },
        ])
        .row(["OWASP clean", ok(c.owasp_clean)])
        .row(["Models consulted".to_string(), c.models_consulted.to_string()])
        .row(["Cross-vendor agreement".to_string(), percent(c.cross_vendor_agreement)])
        .row(["Confidence score".to_string(), format!("{}/100", c.score())]);

    let mut out = table.render();
    if !result.code.is_empty() {
        let _ = write!(out, "\nOutput:\n{}\n", code_preview(&result.code));
    }
    out
}

pub fn attestation(att: &SecurityAttestation) -> String {
    let mut table = Table::new("Security Attestation", &["Check", "Result"]);
    table
        .row(["Overall score".to_string(), format!("{}/100", att.overall_score())])
        .row(["Verdict", att.verdict().as_str()]);
    if let Some(owasp) = &att.owasp {
        let clean = if owasp.is_clean {
            "YES".to_string()
        } else {
            format!("NO ({} issues)", owasp.vulnerability_count)
        };
        table.row(["OWASP clean".to_string(), clean]);
    }
    if let Some(supply) = &att.supply_chain {
        table.row(["Supply chain".to_string(), supply.summary()]);
    }
    if let Some(model) = &att.threat_model {
        table.row([
            "Threats".to_string(),
            format!("{} ({} critical)", model.threats.len(), model.critical_threats().len()),
        ]);
    }
    if let Some(compliance) = &att.compliance {
        table.row([
            "Compliance".to_string(),
            format!("{} pass rate", percent(compliance.pass_rate())),
        ]);
    }
    let mut out = table.render();
    let _ = writeln!(out, "\n{}", att.summary());
    out
}

pub fn supply_chain(report: &SupplyChainReport) -> String {
    let mut table = Table::new(report.summary(), &["Dependency", "Risk", "Verified by"]);
    for dep in &report.dependencies {
        table.row([
            dep.name.clone(),
            dep.risk_level.as_str().to_uppercase(),
            dep.verified_by.join(", "),
        ]);
    }
    let mut out = table.render();
    if !report.slopsquatting_suspects.is_empty() {
        let _ = writeln!(
            out,
            "\nSlopsquatting suspects: {}",
            report.slopsquatting_suspects.join(", ")
        );
    }
    out
}

pub fn dashboard(summary: &DashboardSummary) -> String {
    let mut out = format!(
        "Team {}: {} projects, {} runs, avg security {:.1}, avg confidence {:.1}, OWASP {}\n\n",
        summary.team_id,
        summary.total_projects,
        summary.total_runs,
        summary.average_security_score,
        summary.average_confidence_score,
        summary.owasp_compliance_rate,
    );
    let mut table = Table::new("Projects", &["Project", "Latest", "Trend", "Runs"]);
    for (name, project) in &summary.projects {
        table.row([
            name.clone(),
            project.latest_score.to_string(),
            project.trend.to_string(),
            project.runs.to_string(),
        ]);
    }
    out.push_str(&table.render());
    out
}
