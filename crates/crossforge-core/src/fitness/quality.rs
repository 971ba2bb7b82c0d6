//! Concrete evaluators: one asks an agent, one uses text heuristics.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{FitnessEvaluator, FitnessScore};
use crate::agent::Agent;
use crate::domain::Result;
use crate::parse::{as_number, extract_json_block};

/// Asks an agent for the five sub-scores as a JSON object.
pub struct AgentFitnessEvaluator {
    agent: Arc<dyn Agent>,
}

impl AgentFitnessEvaluator {
    pub fn new(agent: Arc<dyn Agent>) -> Self {
        Self { agent }
    }

    /// Read scores from the first JSON object in `reply`.
    ///
    /// No object, or any key that is present but not numeric, gives an
    /// all-zero score. Missing keys count as 0.
    pub fn parse_scores(reply: &str) -> FitnessScore {
        let Some(map) = extract_json_block(reply) else {
            debug!("fitness reply had no JSON object");
            return FitnessScore::default();
        };
        let mut values = [0.0f64; 5];
        for (slot, key) in values.iter_mut().zip(DIMENSIONS) {
            match map.get(key) {
                None => {}
                Some(v) => match as_number(v) {
                    Some(n) => *slot = n,
                    None => return FitnessScore::default(),
                },
            }
        }
        FitnessScore {
            correctness: values[0],
            performance: values[1],
            readability: values[2],
            robustness: values[3],
            security: values[4],
        }
        .clamped()
    }
}

const DIMENSIONS: [&str; 5] = ["correctness", "performance", "readability", "robustness", "security"];

#[async_trait]
impl FitnessEvaluator for AgentFitnessEvaluator {
    async fn score(&self, code: &str, task: &str) -> Result<FitnessScore> {
        let prompt = format!(
            "Score this code on a scale of 0-100 for each dimension.\n\n\
             Task: {task}\n\n\
             Code:\n```\n{code}\n```\n\n\
             Score each dimension:\n\
             - correctness (does it solve the task?)\n\
             - performance (is it efficient?)\n\
             - readability (is it clean and well-structured?)\n\
             - robustness (does it handle edge cases?)\n\
             - security (is it safe from vulnerabilities?)\n\n\
             Return ONLY a JSON object with these 5 keys and numeric values 0-100."
        );
        let reply = self.agent.execute(&prompt, None).await?;
        Ok(Self::parse_scores(&reply))
    }
}

/// Heuristic scoring from substring checks; never calls an agent.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticFitnessEvaluator;

impl StaticFitnessEvaluator {
    pub const DANGEROUS_CALLS: [&'static str; 3] = ["os.system(", "__import__", "subprocess.call("];
    const MAX_LINE_CHARS: usize = 120;

    pub fn score_code(code: &str) -> FitnessScore {
        let has_docstrings = code.contains("\"\"\"") || code.contains("'''");
        let has_type_hints = code.contains("->") || code.contains(": ");
        let has_error_handling = code.contains("try:") || code.contains("except");
        let has_validation =
            code.contains("if not") || code.contains("raise") || code.contains("assert");
        let short_lines = code
            .trim()
            .split('\n')
            .all(|line| line.chars().count() <= Self::MAX_LINE_CHARS);

        let mut readability = 50.0;
        if has_docstrings {
            readability += 20.0;
        }
        if has_type_hints {
            readability += 15.0;
        }
        if short_lines {
            readability += 15.0;
        }

        let mut robustness = 30.0;
        if has_error_handling {
            robustness += 35.0;
        }
        if has_validation {
            robustness += 35.0;
        }

        let hits = Self::DANGEROUS_CALLS
            .iter()
            .filter(|pattern| code.contains(*pattern))
            .count();
        let security = (50.0 - 15.0 * hits as f64).max(0.0);

        FitnessScore {
            correctness: 50.0,
            performance: 50.0,
            readability: f64::min(readability, 100.0),
            robustness: f64::min(robustness, 100.0),
            security,
        }
    }
}

#[async_trait]
impl FitnessEvaluator for StaticFitnessEvaluator {
    async fn score(&self, code: &str, _task: &str) -> Result<FitnessScore> {
        Ok(Self::score_code(code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scores_from_prose() {
        let score = AgentFitnessEvaluator::parse_scores(
            "Here are my scores: {\"correctness\": 90, \"performance\": \"70\", \"security\": 120}",
        );
        assert_eq!(score.correctness, 90.0);
        assert_eq!(score.performance, 70.0);
        assert_eq!(score.readability, 0.0);
        assert_eq!(score.security, 100.0);
    }

    #[test]
    fn test_unparseable_reply_is_all_zero() {
        assert_eq!(AgentFitnessEvaluator::parse_scores("great code!"), FitnessScore::default());
        assert_eq!(
            AgentFitnessEvaluator::parse_scores("{\"correctness\": \"high\"}"),
            FitnessScore::default()
        );
    }

    #[test]
    fn test_static_plain_code() {
        let score = StaticFitnessEvaluator::score_code("x = 1");
        assert_eq!(score.readability, 65.0);
        assert_eq!(score.robustness, 30.0);
        assert_eq!(score.security, 50.0);
    }

    #[test]
    fn test_static_rewards_docs_hints_and_validation() {
        let code = "def f(x: int) -> int:\n    \"\"\"Double.\"\"\"\n    if not x:\n        raise ValueError\n    try:\n        return x * 2\n    except Exception:\n        return 0\n";
        let score = StaticFitnessEvaluator::score_code(code);
        assert_eq!(score.readability, 100.0);
        assert_eq!(score.robustness, 100.0);
    }

    #[test]
    fn test_static_penalises_dangerous_calls() {
        let code = "os.system('rm'); __import__('x'); subprocess.call(['ls']); os.system('again')";
        let score = StaticFitnessEvaluator::score_code(code);
        assert_eq!(score.security, 5.0);
        let long = "a".repeat(121);
        assert_eq!(StaticFitnessEvaluator::score_code(&long).readability, 50.0);
    }
}
