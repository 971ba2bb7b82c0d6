//! Strict sequential handoff through the stage chain.

use async_trait::async_trait;
use tracing::{debug, instrument};

use super::Strategy;
use crate::agent::{roles, AgentContext, AgentSet};
use crate::domain::{Result, Stage, StrategyOutput};

pub const NAME: &str = "pipeline";

/// Architect → Builder → Specialist (optional) → Dispatch.
///
/// Each stage's prompt embeds the previous stage's full output. The
/// specialist runs only when enabled and an `ollama` role is registered.
#[derive(Debug, Clone, Copy)]
pub struct Pipeline {
    include_specialist: bool,
}

impl Pipeline {
    pub fn new(include_specialist: bool) -> Self {
        Self { include_specialist }
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(true)
    }
}

#[async_trait]
impl Strategy for Pipeline {
    fn name(&self) -> &str {
        NAME
    }

    fn required_stages(&self) -> &[Stage] {
        &[Stage::Architect, Stage::Builder, Stage::Specialist, Stage::Dispatch]
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

        let architect_prompt = format!(
            "Design the architecture and write an implementation plan for:\n\n\
             Task: {task}\n\n\
             Include: function signatures, data structures, error handling approach, \
             and key design decisions. Return a detailed blueprint."
        );
        let architect_output = claude.execute(&architect_prompt, None).await?;

        let build_prompt = format!(
            "Implement production-quality code from this architecture blueprint. \
             Follow the design exactly. Return ONLY code.\n\n\
             Blueprint:\n{architect_output}"
        );
        let build_output = codex.execute(&build_prompt, None).await?;

        let specialist = agents
            .get(roles::OLLAMA)
            .filter(|_| self.include_specialist);
        let specialist_output = match specialist {
            Some(ollama) => {
                let prompt = format!(
                    "Review this implementation for domain-specific issues, \
                     performance concerns, and edge cases.\n\n\
                     Original task: {task}\n\n\
                     Architecture:\n{architect_output}\n\n\
                     Implementation:\n```\n{build_output}\n```\n\n\
                     List issues and suggested improvements."
                );
                ollama.execute(&prompt, None).await?
            }
            None => {
                debug!("specialist stage skipped");
                String::new()
            }
        };

        let mut dispatch_prompt = format!(
            "Final verification of pipeline output.\n\n\
             Task: {task}\n\n\
             Architecture:\n{architect_output}\n\n\
             Implementation:\n```\n{build_output}\n```\n"
        );
        if !specialist_output.is_empty() {
            dispatch_prompt.push_str(&format!("\nSpecialist review:\n{specialist_output}\n"));
        }
        dispatch_prompt.push_str("\nProvide final verdict, confidence score, and the approved code.");
        let dispatch_output = dispatch.execute(&dispatch_prompt, None).await?;

        // An empty specialist reply counts as not having run.
        let stages_run = if specialist_output.is_empty() { 3 } else { 4 };

        Ok(StrategyOutput::new()
            .with("architect_output", architect_output)
            .with("build_output", build_output)
            .with("specialist_output", specialist_output)
            .with("dispatch_output", dispatch_output)
            .with("stages_run", stages_run)
            .with("strategy", NAME))
    }
}
