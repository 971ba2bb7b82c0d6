//! Build, attack, fuzz, harden; dispatch rules on what survived.

use async_trait::async_trait;
use tracing::{debug, instrument};

use super::Strategy;
use crate::agent::{roles, AgentContext, AgentSet};
use crate::domain::{Result, Stage, StrategyOutput};

pub const NAME: &str = "adversarial";

/// Cross-vendor attack/defence cycles.
///
/// Claude builds, Codex attacks, Ollama fuzzes. Every round but the last
/// ends with Claude hardening the code against that round's findings, so
/// Claude builds exactly `rounds` times.
#[derive(Debug, Clone, Copy)]
pub struct Adversarial {
    rounds: usize,
}

impl Adversarial {
    pub fn new(rounds: usize) -> Self {
        Self { rounds }
    }

    pub fn rounds(&self) -> usize {
        self.rounds
    }
}

impl Default for Adversarial {
    fn default() -> Self {
        Self::new(1)
    }
}

#[async_trait]
impl Strategy for Adversarial {
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
        let ollama = agents.require(roles::OLLAMA)?;
        let dispatch = agents.require(roles::DISPATCH)?;

        let build_prompt = format!(
            "Write production-quality code for this task. Return ONLY code.\n\nTask: {task}"
        );
        let mut build_output = claude.execute(&build_prompt, None).await?;

        let mut attack_output = String::new();
        let mut fuzz_output = String::new();
        let mut attacks: Vec<String> = Vec::with_capacity(self.rounds);
        let mut fuzzes: Vec<String> = Vec::with_capacity(self.rounds);

        for round in 0..self.rounds {
            debug!(round, "attacking current build");
            let attack_prompt = format!(
                "You are a security adversary. Find vulnerabilities, edge cases, and \
                 potential exploits in this code. Be thorough and aggressive.\n\n\
                 Code to attack:\n```\n{build_output}\n```\n\n\
                 List every issue you find with severity ratings."
            );
            attack_output = codex.execute(&attack_prompt, None).await?;
            attacks.push(attack_output.clone());

            let fuzz_prompt = format!(
                "Generate adversarial inputs and edge cases for this code. \
                 Try to break it with unexpected types, boundary values, \
                 injection attempts, and malformed data.\n\n\
                 Code to fuzz:\n```\n{build_output}\n```"
            );
            fuzz_output = ollama.execute(&fuzz_prompt, None).await?;
            fuzzes.push(fuzz_output.clone());

            if round + 1 < self.rounds {
                let fix_prompt = format!(
                    "Your code was attacked and fuzzed. Fix ALL issues found.\n\n\
                     Original code:\n```\n{build_output}\n```\n\n\
                     Attacks found:\n{attack_output}\n\n\
                     Fuzz results:\n{fuzz_output}\n\n\
                     Return the hardened code only."
                );
                build_output = claude.execute(&fix_prompt, None).await?;
            }
        }

        let dispatch_prompt = format!(
            "Final verification. Review code that survived adversarial testing.\n\n\
             Final code:\n```\n{build_output}\n```\n\n\
             Attacks it survived:\n{}\n\n\
             Fuzz tests it survived:\n{}\n\n\
             Provide final verdict and confidence score.",
            attacks.join("\n"),
            fuzzes.join("\n"),
        );
        let dispatch_output = dispatch.execute(&dispatch_prompt, None).await?;

        Ok(StrategyOutput::new()
            .with("build_output", build_output)
            .with("attack_output", attack_output)
            .with("fuzz_output", fuzz_output)
            .with("dispatch_output", dispatch_output)
            .with("rounds", self.rounds)
            .with("total_attacks", attacks.len())
            .with("strategy", NAME))
    }
}
