//! Population search: generate variants, rank, cross over, select.

use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, instrument};

use super::Strategy;
use crate::agent::{join_calls, roles, Agent, AgentContext, AgentSet};
use crate::domain::{Result, Stage, StrategyOutput};
use crate::fitness::{CandidateResult, FitnessRunner};
use crate::parse::{split_candidates, CANDIDATE_SEPARATOR};

pub const NAME: &str = "evolutionary";

const TRAITS: [&str; 3] = ["performance", "readability", "robustness"];

/// Evolutionary generation.
///
/// Generation 0 cycles the worker roles round-robin, one candidate each,
/// each emphasising a rotating trait. Every later generation is one ranking
/// pass (by `ollama`, else `codex`) and one crossover call to `claude`. The
/// candidate list is forced back to `population` entries after each
/// crossover.
#[derive(Clone)]
pub struct Evolutionary {
    population: usize,
    generations: usize,
    fitness: Option<FitnessRunner>,
}

impl Evolutionary {
    pub fn new(population: usize, generations: usize) -> Self {
        Self {
            population,
            generations,
            fitness: None,
        }
    }

    /// Also score the final generation locally and report the ranking.
    pub fn with_fitness(mut self, runner: FitnessRunner) -> Self {
        self.fitness = Some(runner);
        self
    }

    pub fn population(&self) -> usize {
        self.population
    }

    pub fn generations(&self) -> usize {
        self.generations
    }
}

impl Default for Evolutionary {
    fn default() -> Self {
        Self::new(3, 2)
    }
}

fn list_candidates(prompt: &mut String, candidates: &[String]) {
    for (idx, c) in candidates.iter().enumerate() {
        let _ = write!(prompt, "--- Candidate {} ---\n{c}\n\n", idx + 1);
    }
}

fn ranked_json(ranked: &[CandidateResult]) -> Value {
    Value::Array(
        ranked
            .iter()
            .map(|r| {
                json!({
                    "code": r.code,
                    "total": r.total(),
                    "generation": r.generation,
                    "parent_indices": r.parent_indices,
                })
            })
            .collect(),
    )
}

#[async_trait]
impl Strategy for Evolutionary {
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
        let workers: Vec<&Arc<dyn Agent>> =
            agents.workers().into_iter().map(|(_, agent)| agent).collect();

        let base_prompt = format!(
            "Write a complete, production-quality solution for this task. \
             Be creative and consider multiple approaches.\n\n\
             Task: {task}\n\n\
             Return ONLY code."
        );
        let calls: Vec<(&Arc<dyn Agent>, String)> = (0..self.population)
            .map(|i| {
                let prompt = format!(
                    "{base_prompt}\n\nVariant #{}: Emphasize {}.",
                    i + 1,
                    TRAITS[i % TRAITS.len()]
                );
                (workers[i % workers.len()], prompt)
            })
            .collect();
        let mut candidates = join_calls(&calls).await?;
        let mut generation_sizes = vec![candidates.len()];

        let evaluator = agents.get(roles::OLLAMA).unwrap_or(codex);
        for generation in 1..self.generations {
            debug!(generation, "ranking and crossover");
            let mut fitness_prompt = format!(
                "Rank these {} code candidates for the task: {task}\n\n",
                candidates.len()
            );
            list_candidates(&mut fitness_prompt, &candidates);
            fitness_prompt.push_str(
                "Score each candidate 1-10 on: correctness, performance, \
                 readability, robustness. Return rankings.",
            );
            let fitness_output = evaluator.execute(&fitness_prompt, None).await?;

            let mut crossover_prompt = format!(
                "You've evaluated these candidates:\n{fitness_output}\n\n\
                 Now produce {} improved candidates by combining \
                 the best traits. Fix any issues found. Return ONLY code for each \
                 candidate, separated by '{CANDIDATE_SEPARATOR}'.\n\n\
                 Original candidates:\n",
                self.population
            );
            list_candidates(&mut crossover_prompt, &candidates);
            let crossover_output = claude.execute(&crossover_prompt, None).await?;

            candidates = split_candidates(&crossover_output, self.population);
            generation_sizes.push(candidates.len());
        }

        let mut final_prompt =
            format!("Select the best candidate from the final generation.\n\nTask: {task}\n\n");
        list_candidates(&mut final_prompt, &candidates);
        final_prompt.push_str("Pick the best one. Return the winning code and explain why.");
        let dispatch_output = dispatch.execute(&final_prompt, None).await?;

        let generations = generation_sizes.len();
        let mut out = StrategyOutput::new()
            .with("candidates", candidates.clone())
            .with("generations", generations)
            .with("population", self.population)
            .with("dispatch_output", dispatch_output)
            .with(
                "total_candidates_evaluated",
                generation_sizes.iter().sum::<usize>(),
            )
            .with("strategy", NAME);

        if let Some(runner) = &self.fitness {
            // Every final candidate descends from the whole previous generation.
            let parents: Vec<usize> = if generations > 1 {
                (0..self.population).collect()
            } else {
                Vec::new()
            };
            let ranked = runner
                .rank_generation(&candidates, task, generations - 1, &parents)
                .await?;
            if let Some(best) = ranked.first() {
                out.insert("best_fitness", best.total());
            }
            out.insert("ranked_candidates", ranked_json(&ranked));
        }

        Ok(out)
    }
}
