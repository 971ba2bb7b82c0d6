//! One vendor writes code, the other writes tests, then they swap.

use async_trait::async_trait;
use tracing::{debug, instrument};

use super::Strategy;
use crate::agent::{roles, AgentContext, AgentSet};
use crate::domain::{Result, Stage, StrategyOutput};

pub const NAME: &str = "verification_loop";

/// Cross-vendor verification loop.
///
/// Iteration 0: Claude codes, Codex writes tests. On odd iterations Codex
/// fixes and Claude extends the tests; on even iterations the roles flip.
#[derive(Debug, Clone, Copy)]
pub struct VerificationLoop {
    iterations: usize,
}

impl VerificationLoop {
    pub fn new(iterations: usize) -> Self {
        Self { iterations }
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }
}

impl Default for VerificationLoop {
    fn default() -> Self {
        Self::new(2)
    }
}

#[async_trait]
impl Strategy for VerificationLoop {
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

        let code_prompt = format!(
            "Write production-quality code for this task. Return ONLY code.\n\nTask: {task}"
        );
        let mut code_output = claude.execute(&code_prompt, None).await?;

        let test_prompt = format!(
            "Write comprehensive tests for the following code. \
             Include edge cases, error conditions, and boundary values. \
             Return ONLY test code.\n\n\
             Code to test:\n```\n{code_output}\n```"
        );
        let mut test_output = codex.execute(&test_prompt, None).await?;

        let mut code_versions = 1usize;
        let mut test_versions = 1usize;

        for i in 1..self.iterations {
            let (fixer, tester) = if i % 2 == 1 { (codex, claude) } else { (claude, codex) };
            debug!(iteration = i, "fix and extend tests");

            let fix_prompt = format!(
                "Review this code against these tests. Fix any issues the tests \
                 would catch. Return ONLY the fixed code.\n\n\
                 Code:\n```\n{code_output}\n```\n\n\
                 Tests:\n```\n{test_output}\n```"
            );
            code_output = fixer.execute(&fix_prompt, None).await?;
            code_versions += 1;

            let more_tests_prompt = format!(
                "The code has been updated. Write additional tests that cover \
                 any new behavior or remaining gaps.\n\n\
                 Updated code:\n```\n{code_output}\n```\n\n\
                 Existing tests:\n```\n{test_output}\n```"
            );
            test_output = tester.execute(&more_tests_prompt, None).await?;
            test_versions += 1;
        }

        let dispatch_prompt = format!(
            "Verify this code passes its tests and is production-ready.\n\n\
             Final code:\n```\n{code_output}\n```\n\n\
             Final tests:\n```\n{test_output}\n```\n\n\
             Iterations performed: {}\n\
             Provide verdict and confidence score.",
            self.iterations
        );
        let dispatch_output = dispatch.execute(&dispatch_prompt, None).await?;

        Ok(StrategyOutput::new()
            .with("code_output", code_output)
            .with("test_output", test_output)
            .with("dispatch_output", dispatch_output)
            .with("iterations", self.iterations)
            .with("code_versions", code_versions)
            .with("test_versions", test_versions)
            .with("strategy", NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::ScriptedAgent;

    #[tokio::test]
    async fn test_one_iteration_is_code_then_tests() {
        let claude = ScriptedAgent::fixed("code");
        let codex = ScriptedAgent::fixed("tests");
        let agents = AgentSet::new()
            .with("claude", claude.clone())
            .with("codex", codex.clone())
            .with("dispatch", ScriptedAgent::fixed("PASS"));

        let out = VerificationLoop::new(1).execute("t", &agents, None).await.unwrap();
        assert_eq!(out.get_u64("code_versions"), Some(1));
        assert_eq!(out.get_u64("test_versions"), Some(1));
        assert_eq!(claude.call_count(), 1);
        assert_eq!(codex.call_count(), 1);
    }
}
