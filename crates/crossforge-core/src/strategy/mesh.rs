//! Every worker answers in parallel; dispatch merges the best parts.

use async_trait::async_trait;
use tracing::instrument;

use super::consensus::generation_prompt;
use super::Strategy;
use crate::agent::{fan_out, roles, AgentContext, AgentSet};
use crate::domain::{Result, Stage, StrategyOutput};

pub const NAME: &str = "cognitive_mesh";

/// Fans the task out to every non-dispatch role, however many are registered.
#[derive(Debug, Clone, Copy, Default)]
pub struct CognitiveMesh;

#[async_trait]
impl Strategy for CognitiveMesh {
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
        let dispatch = agents.require(roles::DISPATCH)?;
        let workers = agents.workers();
        let worker_agents: Vec<_> = workers.iter().map(|(_, agent)| *agent).collect();

        let replies = fan_out(&worker_agents, &generation_prompt(task)).await?;

        let sections: Vec<String> = workers
            .iter()
            .zip(&replies)
            .map(|((name, _), reply)| format!("--- {} ---\n{reply}", name.to_uppercase()))
            .collect();
        let merge_prompt = format!(
            "You are merging outputs from {} independent AI agents \
             who all solved the same task.\n\n\
             Task: {task}\n\n\
             {}\n\n\
             Analyze each solution. Produce the BEST possible implementation by:\n\
             1. Identifying the strongest parts of each solution\n\
             2. Combining the best approaches\n\
             3. Resolving any conflicts\n\n\
             Return the merged code and a confidence assessment.",
            replies.len(),
            sections.join("\n\n"),
        );
        let dispatch_output = dispatch.execute(&merge_prompt, None).await?;

        let mut out = StrategyOutput::new();
        for ((name, _), reply) in workers.iter().zip(&replies) {
            out.insert(format!("{name}_output"), reply.as_str());
        }
        Ok(out
            .with("dispatch_output", dispatch_output)
            .with("agents_consulted", replies.len())
            .with("strategy", NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::ScriptedAgent;

    #[tokio::test]
    async fn test_merge_prompt_labels_each_worker() {
        let dispatch = ScriptedAgent::fixed("merged");
        let agents = AgentSet::new()
            .with("claude", ScriptedAgent::fixed("c"))
            .with("nim", ScriptedAgent::fixed("n"))
            .with("dispatch", dispatch.clone());

        let out = CognitiveMesh.execute("t", &agents, None).await.unwrap();
        assert_eq!(out.get_u64("agents_consulted"), Some(2));
        let prompt = &dispatch.prompts()[0];
        assert!(prompt.contains("--- CLAUDE ---\nc"));
        assert!(prompt.contains("--- NIM ---\nn"));
        assert!(prompt.contains("from 2 independent"));
    }
}
