//! Same task to two vendors at once; dispatch compares and merges.

use async_trait::async_trait;
use tracing::instrument;

use super::Strategy;
use crate::agent::{fan_out, roles, AgentContext, AgentSet};
use crate::domain::{Result, Stage, StrategyOutput};

pub const NAME: &str = "consensus";

/// Claude and Codex answer the same prompt concurrently. Disagreement is
/// reported to dispatch, not resolved here.
#[derive(Debug, Clone, Copy, Default)]
pub struct Consensus;

pub(crate) fn generation_prompt(task: &str) -> String {
    format!("Generate code for the following task. Return ONLY the code.\n\nTask: {task}")
}

fn compare_prompt(task: &str, claude: &str, codex: &str) -> String {
    format!(
        "Compare these two implementations and produce the best final version.\n\n\
         Task: {task}\n\n\
         Implementation A (Claude):\n{claude}\n\n\
         Implementation B (Codex):\n{codex}\n\n\
         Respond with JSON containing:\n\
         - \"code\": the best implementation\n\
         - \"agreement\": true if both are functionally equivalent\n\
         - \"confidence\": float 0-1\n\
         - \"divergences\": list of differences if any\n"
    )
}

#[async_trait]
impl Strategy for Consensus {
    fn name(&self) -> &str {
        NAME
    }

    fn required_stages(&self) -> &[Stage] {
        &[Stage::Architect, Stage::Builder, Stage::Dispatch]
    }

    #[instrument(skip(self, agents, _context), fields(strategy = NAME))]
    async fn execute(
        &self,
        task: &str,
        agents: &AgentSet,
        _context: Option<&AgentContext>,
    ) -> Result<StrategyOutput> {
        let claude = agents.require(roles::CLAUDE)?;
        let codex = agents.require(roles::CODEX)?;
        let dispatch = agents.require(roles::DISPATCH)?;

        let replies = fan_out(&[claude, codex], &generation_prompt(task)).await?;
        let (claude_output, codex_output) = (&replies[0], &replies[1]);

        let dispatch_output = dispatch
            .execute(&compare_prompt(task, claude_output, codex_output), None)
            .await?;

        Ok(StrategyOutput::new()
            .with("claude_output", claude_output.as_str())
            .with("codex_output", codex_output.as_str())
            .with("dispatch_output", dispatch_output)
            .with("strategy", NAME))
    }
}
