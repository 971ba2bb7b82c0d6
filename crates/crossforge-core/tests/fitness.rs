//! Fitness scoring and ranking across evaluators.

use std::sync::Arc;

use crossforge_core::fakes::ScriptedAgent;
use crossforge_core::{
    AgentFitnessEvaluator, AgentSet, Evolutionary, FitnessEvaluator, FitnessRunner, FitnessScore,
    StaticFitnessEvaluator, Strategy,
};

#[test]
fn uniform_forty_totals_forty() {
    let score = FitnessScore {
        correctness: 40.0,
        performance: 40.0,
        readability: 40.0,
        robustness: 40.0,
        security: 40.0,
    };
    assert_eq!(score.total(), 40.0);
}

#[tokio::test]
async fn static_evaluator_baseline() {
    let score = StaticFitnessEvaluator.score("x = 1", "task").await.unwrap();
    assert_eq!(score.readability, 65.0);
    assert_eq!(score.robustness, 30.0);
    assert_eq!(score.total(), 48.25);
}

#[tokio::test]
async fn runner_takes_best_dimension_across_evaluators() {
    let judge = ScriptedAgent::fixed(
        r#"Scores: {"correctness": 90, "performance": "20", "readability": 10, "robustness": 95, "security": 10}"#,
    );
    let runner = FitnessRunner::new(vec![
        Arc::new(StaticFitnessEvaluator),
        Arc::new(AgentFitnessEvaluator::new(judge)),
    ]);
    let score = runner.evaluate("x = 1", "task").await.unwrap();
    assert_eq!(score.correctness, 90.0);
    assert_eq!(score.performance, 50.0);
    assert_eq!(score.robustness, 95.0);
    assert_eq!(score.security, 50.0);
}

#[tokio::test]
async fn ranking_orders_best_first() {
    let runner = FitnessRunner::new(vec![Arc::new(StaticFitnessEvaluator)]);
    let ranked = runner
        .rank_candidates(
            &[
                "os.system(cmd)".to_string(),
                "def f(x: int) -> int:\n    \"\"\"Doc.\"\"\"\n    if not x:\n        raise ValueError\n    return x".to_string(),
            ],
            "task",
        )
        .await
        .unwrap();
    assert!(ranked[0].code.starts_with("def f"));
    assert!(ranked[0].total() > ranked[1].total());
}

#[tokio::test]
async fn evolutionary_attaches_ranking_when_fitness_is_configured() {
    let agents = AgentSet::new()
        .with("claude", ScriptedAgent::fixed("a\n---CANDIDATE---\nos.system('x')"))
        .with("codex", ScriptedAgent::fixed("b"))
        .with("dispatch", ScriptedAgent::fixed("winner"));
    let runner = FitnessRunner::new(vec![Arc::new(StaticFitnessEvaluator)]);

    let out = Evolutionary::new(2, 2)
        .with_fitness(runner)
        .execute("task", &agents, None)
        .await
        .unwrap();
    let ranked = out.get("ranked_candidates").unwrap().as_array().unwrap();
    assert_eq!(ranked.len(), 2);
    assert_eq!(ranked[0]["code"], "a");
    assert_eq!(ranked[0]["generation"], 1);
    assert_eq!(ranked[0]["parent_indices"], serde_json::json!([0, 1]));
    assert!(out.get("best_fitness").is_some());
}
