//! Normalised results of a strategy run.

use std::collections::BTreeMap;

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use uuid::Uuid;

use super::output::StrategyOutput;
use super::stage::Stage;
use crate::security::attestation::SecurityAttestation;

/// One agent's contribution to a run, derived from a `<name>_output` key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentOutput {
    pub stage: Stage,
    pub agent_name: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, Value>,
}

impl AgentOutput {
    pub fn new(stage: Stage, agent_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            stage,
            agent_name: agent_name.into(),
            content: content.into(),
            metadata: BTreeMap::new(),
        }
    }
}

/// Confidence signals for a run.
///
/// The score is derived on every call to [`ConfidenceReport::score`] and is
/// written out on serialisation, but never read back.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ConfidenceReport {
    pub architecture_preserved: bool,
    pub tests_passing: bool,
    pub vulnerabilities_found: u32,
    pub dependencies_verified: bool,
    pub owasp_clean: bool,
    pub models_consulted: u32,
    pub cross_vendor_agreement: f64,
}

impl ConfidenceReport {
    /// Score in `0..=100`.
    ///
    /// 20 architecture, 20 tests, 15 no vulnerabilities, 15 dependencies,
    /// 15 OWASP, and `floor(15 * agreement)` with agreement clamped to `[0, 1]`.
    pub fn score(&self) -> u32 {
        let mut score = 0;
        if self.architecture_preserved {
            score += 20;
        }
        if self.tests_passing {
            score += 20;
        }
        if self.vulnerabilities_found == 0 {
            score += 15;
        }
        if self.dependencies_verified {
            score += 15;
        }
        if self.owasp_clean {
            score += 15;
        }
        let agreement = if self.cross_vendor_agreement.is_finite() {
            self.cross_vendor_agreement.clamp(0.0, 1.0)
        } else {
            0.0
        };
        score += (15.0 * agreement).floor() as u32;
        score.min(100)
    }
}

impl Serialize for ConfidenceReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut st = serializer.serialize_struct("ConfidenceReport", 8)?;
        st.serialize_field("architecture_preserved", &self.architecture_preserved)?;
        st.serialize_field("tests_passing", &self.tests_passing)?;
        st.serialize_field("vulnerabilities_found", &self.vulnerabilities_found)?;
        st.serialize_field("dependencies_verified", &self.dependencies_verified)?;
        st.serialize_field("owasp_clean", &self.owasp_clean)?;
        st.serialize_field("models_consulted", &self.models_consulted)?;
        st.serialize_field("cross_vendor_agreement", &self.cross_vendor_agreement)?;
        st.serialize_field("score", &self.score())?;
        st.end()
    }
}

/// Canonical result of [`crate::engine::Engine::run`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    pub run_id: Uuid,
    pub code: String,
    pub stage_outputs: Vec<AgentOutput>,
    pub confidence: ConfidenceReport,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security: Option<SecurityAttestation>,
    pub summary: String,
    /// The strategy's output mapping, untouched.
    pub raw: StrategyOutput,
}

impl PipelineResult {
    /// Output text for one agent name, if the run produced it.
    pub fn output_of(&self, agent_name: &str) -> Option<&str> {
        self.stage_outputs
            .iter()
            .find(|o| o.agent_name == agent_name)
            .map(|o| o.content.as_str())
    }
}
