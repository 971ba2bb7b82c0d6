//! Crossforge Core Library
//!
//! Strategy orchestration over several LLM backends: the agent abstraction,
//! the built-in strategies, the engine that normalises their output, fitness
//! scoring, routing history, security review and the local team stores.

pub mod agent;
pub mod cloud;
pub mod config;
pub mod domain;
pub mod engine;
pub mod fakes;
pub mod fitness;
pub mod metrics;
pub mod obs;
pub mod parse;
pub mod routing;
pub mod security;
pub mod store;
pub mod strategy;
pub mod telemetry;

/// Crate version, stamped into attestations.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use agent::{fan_out, join_calls, roles, Agent, AgentContext, AgentSet, GuardedAgent};

pub use domain::{
    resolve_stages, stage_preset, stages_for_role, AgentOutput, ConfidenceReport, ForgeError,
    PipelineResult, Result, Stage, StrategyOutput,
};

pub use config::ForgeConfig;
pub use engine::Engine;

pub use strategy::{
    AdaptiveRouter, Adversarial, CognitiveMesh, Consensus, Evolutionary, Pipeline, Strategy,
    StrategyKind, StrategyRegistry, VerificationLoop,
};

pub use fitness::{
    AgentFitnessEvaluator, CandidateResult, FitnessEvaluator, FitnessRunner, FitnessScore,
    StaticFitnessEvaluator,
};

pub use routing::{RoutingEntry, RoutingHistory, RoutingSync, SyncStats, TeamRoutingProfile};

pub use security::{
    run_audit, AttestationGenerator, AuditOptions, ComplianceFramework, ComplianceMapper,
    OwaspScanner, SecurityAttestation, Severity, SupplyChainVerifier, ThreatModelEngine, Verdict,
};

pub use cloud::{DashboardStore, ProjectSnapshot, StrategyListing, StrategyMarketplace, TeamDashboard};
