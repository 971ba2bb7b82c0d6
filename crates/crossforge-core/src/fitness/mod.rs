//! Fitness scoring for code candidates.
//!
//! A [`FitnessEvaluator`] scores one candidate on five dimensions;
//! [`FitnessRunner`] combines several evaluators and ranks candidates.

pub mod quality;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::Result;

pub use quality::{AgentFitnessEvaluator, StaticFitnessEvaluator};

/// Five sub-scores, each in `0..=100`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FitnessScore {
    pub correctness: f64,
    pub performance: f64,
    pub readability: f64,
    pub robustness: f64,
    pub security: f64,
}

impl FitnessScore {
    pub const CORRECTNESS_WEIGHT: f64 = 0.35;
    pub const PERFORMANCE_WEIGHT: f64 = 0.15;
    pub const READABILITY_WEIGHT: f64 = 0.15;
    pub const ROBUSTNESS_WEIGHT: f64 = 0.20;
    pub const SECURITY_WEIGHT: f64 = 0.15;

    /// Weighted total, rounded to two decimals.
    pub fn total(&self) -> f64 {
        let raw = self.correctness * Self::CORRECTNESS_WEIGHT
            + self.performance * Self::PERFORMANCE_WEIGHT
            + self.readability * Self::READABILITY_WEIGHT
            + self.robustness * Self::ROBUSTNESS_WEIGHT
            + self.security * Self::SECURITY_WEIGHT;
        (raw * 100.0).round() / 100.0
    }

    /// Per-dimension maximum of `self` and `other`.
    pub fn max(self, other: FitnessScore) -> FitnessScore {
        FitnessScore {
            correctness: self.correctness.max(other.correctness),
            performance: self.performance.max(other.performance),
            readability: self.readability.max(other.readability),
            robustness: self.robustness.max(other.robustness),
            security: self.security.max(other.security),
        }
    }

    /// Every dimension clamped into `0..=100`; NaN becomes 0.
    pub fn clamped(self) -> FitnessScore {
        let clamp = |v: f64| if v.is_nan() { 0.0 } else { v.clamp(0.0, 100.0) };
        FitnessScore {
            correctness: clamp(self.correctness),
            performance: clamp(self.performance),
            readability: clamp(self.readability),
            robustness: clamp(self.robustness),
            security: clamp(self.security),
        }
    }
}

/// A scored candidate and where it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateResult {
    pub code: String,
    pub fitness: FitnessScore,
    pub generation: usize,
    pub parent_indices: Vec<usize>,
}

impl CandidateResult {
    pub fn total(&self) -> f64 {
        self.fitness.total()
    }
}

#[async_trait]
pub trait FitnessEvaluator: Send + Sync {
    async fn score(&self, code: &str, task: &str) -> Result<FitnessScore>;
}

/// Combines evaluators by taking the best score seen for each dimension.
#[derive(Clone, Default)]
pub struct FitnessRunner {
    evaluators: Vec<Arc<dyn FitnessEvaluator>>,
}

impl FitnessRunner {
    pub fn new(evaluators: Vec<Arc<dyn FitnessEvaluator>>) -> Self {
        Self { evaluators }
    }

    pub fn add_evaluator(&mut self, evaluator: Arc<dyn FitnessEvaluator>) {
        self.evaluators.push(evaluator);
    }

    pub fn len(&self) -> usize {
        self.evaluators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.evaluators.is_empty()
    }

    /// Per-dimension maximum over all evaluators, starting from zero.
    pub async fn evaluate(&self, code: &str, task: &str) -> Result<FitnessScore> {
        let mut best = FitnessScore::default();
        for evaluator in &self.evaluators {
            best = best.max(evaluator.score(code, task).await?);
        }
        Ok(best)
    }

    /// Score `candidates` and sort best first. Ties keep input order.
    pub async fn rank_candidates(&self, candidates: &[String], task: &str) -> Result<Vec<CandidateResult>> {
        self.rank_generation(candidates, task, 0, &[]).await
    }

    /// [`FitnessRunner::rank_candidates`] with lineage attached to every result.
    pub async fn rank_generation(
        &self,
        candidates: &[String],
        task: &str,
        generation: usize,
        parent_indices: &[usize],
    ) -> Result<Vec<CandidateResult>> {
        let mut results = Vec::with_capacity(candidates.len());
        for code in candidates {
            let fitness = self.evaluate(code, task).await?;
            results.push(CandidateResult {
                code: code.clone(),
                fitness,
                generation,
                parent_indices: parent_indices.to_vec(),
            });
        }
        results.sort_by(|a, b| b.total().total_cmp(&a.total()));
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_weighted_sum() {
        let score = FitnessScore {
            correctness: 80.0,
            robustness: 60.0,
            ..Default::default()
        };
        assert_eq!(score.total(), 40.0);
    }

    #[test]
    fn test_total_rounds_to_two_decimals() {
        let score = FitnessScore {
            correctness: 33.333,
            ..Default::default()
        };
        // 33.333 * 0.35 = 11.66655
        assert_eq!(score.total(), 11.67);
    }

    #[test]
    fn test_full_marks_total_100() {
        let score = FitnessScore {
            correctness: 100.0,
            performance: 100.0,
            readability: 100.0,
            robustness: 100.0,
            security: 100.0,
        };
        assert_eq!(score.total(), 100.0);
    }

    #[test]
    fn test_clamped() {
        let score = FitnessScore {
            correctness: 150.0,
            performance: -3.0,
            readability: f64::NAN,
            ..Default::default()
        }
        .clamped();
        assert_eq!(score.correctness, 100.0);
        assert_eq!(score.performance, 0.0);
        assert_eq!(score.readability, 0.0);
    }
}
