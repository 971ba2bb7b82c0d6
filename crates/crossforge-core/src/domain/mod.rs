//! Crossforge domain model.
//!
//! Stages, strategy outputs, normalised results and the error taxonomy.

pub mod digest;
pub mod error;
pub mod output;
pub mod result;
pub mod stage;

pub use digest::{sha256_hex, short_digest};
pub use error::{ForgeError, Result};
pub use output::StrategyOutput;
pub use result::{AgentOutput, ConfidenceReport, PipelineResult};
pub use stage::{resolve_stages, stage_for_output, stage_preset, stages_for_role, Stage};
