//! Crossforge - cross-vendor multi-agent code generation CLI
//!
//! The `crossforge` command runs a task through one of the orchestration
//! strategies, audits code, and inspects the local team stores.
//!
//! ## Commands
//!
//! - `consensus`, `adversarial`, `verify`, `pipeline`, `mesh`, `evolve`, `auto`:
//!   run a strategy on a task
//! - `verify-deps`, `security-audit`: security review
//! - `dashboard`, `marketplace`, `routing`: local stores
//! - `strategies`, `status`: what is available

mod render;

use std::collections::BTreeMap;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn, Level};

use crossforge_core::metrics::METRICS;
use crossforge_core::{
    resolve_stages, run_audit, stage_preset, AgentContext, AgentSet, AuditOptions,
    ComplianceFramework, DashboardStore, Engine, ForgeConfig, ForgeError, RoutingEntry,
    RoutingHistory, RoutingSync, StrategyKind, StrategyMarketplace, SupplyChainVerifier,
};
use crossforge_providers::auth::PROVIDERS;
use crossforge_providers::{
    detect_agents_with, retain_available, AuthManager, ProviderAuth, ProviderSettings,
};
use render::Table;

/// Stage presets accepted by `auto --preset`.
const PRESETS: [&str; 6] = ["trivial", "standard", "security", "performance", "full", "audit"];

const CREDENTIALS_HINT: &str =
    "hint: set ANTHROPIC_API_KEY / OPENAI_API_KEY (or install the vendor CLIs), then run `crossforge status`";

#[derive(Parser)]
#[command(name = "crossforge")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Cross-vendor multi-agent code generation and verification", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON results on stdout and JSON log lines on stderr
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Same task through Claude and Codex, dispatch merges
    Consensus { task: String },

    /// Build/attack/fuzz cycles with cross-vendor verification
    Adversarial {
        task: String,

        /// Number of attack rounds
        #[arg(short, long, default_value_t = 1, value_parser = clap::value_parser!(u16).range(1..))]
        rounds: u16,
    },

    /// One agent writes code, another writes tests, cross-verify
    Verify {
        task: String,

        /// Number of verify iterations
        #[arg(short, long, default_value_t = 2, value_parser = clap::value_parser!(u16).range(1..))]
        iterations: u16,
    },

    /// Sequential handoff: architect, build, review, dispatch
    Pipeline {
        task: String,

        /// Skip the local specialist review stage
        #[arg(long)]
        no_specialist: bool,
    },

    /// All agents in parallel, dispatch merges the best parts
    Mesh { task: String },

    /// Breed the best code candidates over several generations
    Evolve {
        task: String,

        /// Candidates per generation
        #[arg(short, long, default_value_t = 3, value_parser = clap::value_parser!(u16).range(1..))]
        population: u16,

        /// Number of generations
        #[arg(short, long, default_value_t = 2, value_parser = clap::value_parser!(u16).range(1..))]
        generations: u16,
    },

    /// Pick the best strategy for the task from routing history
    Auto {
        task: String,

        /// Stage preset to check coverage against
        #[arg(short, long, default_value = "standard", value_parser = PRESETS)]
        preset: String,
    },

    /// List the built-in strategies
    Strategies,

    /// Verify supply chain safety of dependencies
    VerifyDeps {
        /// Requirements, e.g. `requests==2.31.0`
        #[arg(required = true)]
        deps: Vec<String>,

        /// Package ecosystem (pypi, npm, crates)
        #[arg(short, long, default_value = "pypi")]
        ecosystem: String,
    },

    /// Run a security audit on code or a file
    SecurityAudit {
        /// Path to a source file, or the code itself
        code_or_file: String,

        /// Compliance framework to assess (soc2, hipaa, pci_dss); repeatable
        #[arg(short = 'c', long = "compliance")]
        compliance: Vec<String>,

        /// Skip the OWASP Top 10 scan
        #[arg(long)]
        no_owasp: bool,

        /// Skip threat modeling
        #[arg(long)]
        no_threats: bool,

        /// Dependency to verify alongside the code; repeatable
        #[arg(long = "dep")]
        deps: Vec<String>,

        /// Ecosystem of `--dep` entries
        #[arg(short, long, default_value = "pypi")]
        ecosystem: String,

        /// Record the result on the team dashboard under this project
        #[arg(long)]
        project: Option<String>,
    },

    /// Show the team security dashboard
    Dashboard,

    /// Browse and rate strategies
    Marketplace {
        #[command(subcommand)]
        action: MarketplaceAction,
    },

    /// Inspect routing history
    Routing {
        #[command(subcommand)]
        action: RoutingAction,
    },

    /// Show provider credentials and available agents
    Status,
}

#[derive(Subcommand)]
enum MarketplaceAction {
    /// Search listings, most downloaded first
    Browse {
        /// Text to match in name, description or tags
        query: Option<String>,

        /// Required tag; repeatable
        #[arg(long = "tag")]
        tags: Vec<String>,

        /// Minimum average rating
        #[arg(long, default_value_t = 0.0)]
        min_rating: f64,
    },

    /// Rate a strategy from 1 to 5
    Rate { name: String, rating: f64 },
}

#[derive(Subcommand)]
enum RoutingAction {
    /// Per-strategy run counts and average scores
    Stats,
}

/// Shared state for every command.
struct App {
    config: ForgeConfig,
    json: bool,
}

impl App {
    /// Engine over every provider that has credentials and answers its probe.
    async fn engine(&self) -> Engine {
        let auth = AuthManager::from_env();
        let agents = retain_available(detect_agents_with(&auth, &ProviderSettings::from_env())).await;
        Engine::with_agents(self.config.clone(), agents)
    }

    fn emit(&self, value: &impl Serialize, text: impl FnOnce() -> String) -> Result<()> {
        if self.json {
            render::print_json(value)
        } else {
            print!("{}", text());
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    crossforge_core::telemetry::init_tracing(cli.json, level);

    let outcome = run(cli).await;
    METRICS.flush();

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {}", one_line(&err));
            if needs_credentials_hint(&err) {
                eprintln!("{CREDENTIALS_HINT}");
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = ForgeConfig::from_env().context("Failed to read configuration")?;
    let app = App {
        config,
        json: cli.json,
    };

    match cli.command {
        Commands::Consensus { task } => cmd_strategy(&app, StrategyKind::Consensus, &task).await,
        Commands::Adversarial { task, rounds } => {
            let kind = StrategyKind::Adversarial {
                rounds: usize::from(rounds),
            };
            cmd_strategy(&app, kind, &task).await
        }
        Commands::Verify { task, iterations } => {
            let kind = StrategyKind::VerificationLoop {
                iterations: usize::from(iterations),
            };
            cmd_strategy(&app, kind, &task).await
        }
        Commands::Pipeline {
            task,
            no_specialist,
        } => {
            let kind = StrategyKind::Pipeline {
                include_specialist: !no_specialist,
            };
            cmd_strategy(&app, kind, &task).await
        }
        Commands::Mesh { task } => cmd_strategy(&app, StrategyKind::CognitiveMesh, &task).await,
        Commands::Evolve {
            task,
            population,
            generations,
        } => {
            let kind = StrategyKind::Evolutionary {
                population: usize::from(population),
                generations: usize::from(generations),
            };
            cmd_strategy(&app, kind, &task).await
        }
        Commands::Auto { task, preset } => cmd_auto(&app, &task, &preset).await,
        Commands::Strategies => cmd_strategies(&app),
        Commands::VerifyDeps { deps, ecosystem } => cmd_verify_deps(&app, &deps, &ecosystem).await,
        Commands::SecurityAudit {
            code_or_file,
            compliance,
            no_owasp,
            no_threats,
            deps,
            ecosystem,
            project,
        } => {
            let options = AuditOptions {
                owasp: !no_owasp,
                threats: !no_threats,
                frameworks: parse_frameworks(&compliance)?,
                dependencies: deps,
                ecosystem,
                strategy: "security_audit".to_string(),
                ..AuditOptions::default()
            };
            cmd_security_audit(&app, &code_or_file, &options, project.as_deref()).await
        }
        Commands::Dashboard => cmd_dashboard(&app),
        Commands::Marketplace { action } => match action {
            MarketplaceAction::Browse {
                query,
                tags,
                min_rating,
            } => cmd_marketplace_browse(&app, query.as_deref().unwrap_or(""), &tags, min_rating),
            MarketplaceAction::Rate { name, rating } => cmd_marketplace_rate(&app, &name, rating),
        },
        Commands::Routing { action } => match action {
            RoutingAction::Stats => cmd_routing_stats(&app).await,
        },
        Commands::Status => cmd_status(&app).await,
    }
}

/// Run one strategy and print its confidence report.
async fn cmd_strategy(app: &App, kind: StrategyKind, task: &str) -> Result<()> {
    let history = Arc::new(RoutingHistory::open(app.config.routing_history_path()));
    let strategy = kind.build(history.clone());
    let engine = app.engine().await;

    let missing = engine.missing_stages(strategy.as_ref());
    if !missing.is_empty() {
        warn!(strategy = %strategy.name(), missing = ?missing, "required stages not covered by available agents");
    }

    let mut context = AgentContext::new();
    context.insert("task".to_string(), json!(task));
    let result = engine.run(strategy.as_ref(), task, Some(&context)).await?;

    if let Some(routed) = result.raw.get_str("routed_to") {
        let score = f64::from(result.confidence.score());
        history.record_outcome(task, routed, score);
        let mut sync = RoutingSync::open(app.config.team.clone(), app.config.routing_dir());
        sync.record(RoutingEntry::for_task(task, routed, score));
        info!(strategy = %routed, score, "routing outcome recorded");
    }

    app.emit(&result, || render::pipeline_result(&result))
}

async fn cmd_auto(app: &App, task: &str, preset: &str) -> Result<()> {
    let engine = app.engine().await;
    let wanted = stage_preset(preset).ok_or_else(|| anyhow!("unknown preset '{preset}'"))?;
    let covered = resolve_stages(None, &engine.available_stages(), Some(preset));
    if covered.len() < wanted.len() {
        warn!(preset = %preset, wanted = ?wanted, covered = ?covered, "preset only partially covered");
    }
    cmd_strategy(app, StrategyKind::AdaptiveRouter, task).await
}

fn cli_command(kind: StrategyKind) -> &'static str {
    match kind {
        StrategyKind::Consensus => "consensus",
        StrategyKind::Adversarial { .. } => "adversarial",
        StrategyKind::Pipeline { .. } => "pipeline",
        StrategyKind::CognitiveMesh => "mesh",
        StrategyKind::Evolutionary { .. } => "evolve",
        StrategyKind::VerificationLoop { .. } => "verify",
        StrategyKind::AdaptiveRouter => "auto",
    }
}

#[derive(Serialize)]
struct StrategyRow {
    name: &'static str,
    command: &'static str,
    description: String,
}

fn strategy_rows() -> Vec<StrategyRow> {
    let marketplace = StrategyMarketplace::in_memory();
    StrategyKind::BUILTIN
        .into_iter()
        .map(|kind| StrategyRow {
            name: kind.name(),
            command: cli_command(kind),
            description: marketplace
                .get_listing(kind.name())
                .map(|l| l.description.clone())
                .unwrap_or_default(),
        })
        .collect()
}

fn cmd_strategies(app: &App) -> Result<()> {
    let rows = strategy_rows();
    app.emit(&rows, || {
        let mut table = Table::new("Available Strategies", &["Strategy", "Command", "Description"]);
        for row in &rows {
            table.row([row.name, row.command, row.description.as_str()]);
        }
        table.render()
    })
}

async fn cmd_verify_deps(app: &App, deps: &[String], ecosystem: &str) -> Result<()> {
    let engine = app.engine().await;
    let agents = engine.agents().guarded(app.config.call_timeout);
    let report = SupplyChainVerifier::new(&agents).verify(deps, ecosystem).await?;
    app.emit(&report, || render::supply_chain(&report))
}

fn parse_frameworks(names: &[String]) -> Result<Vec<ComplianceFramework>> {
    names
        .iter()
        .map(|name| {
            ComplianceFramework::from_name(name).ok_or_else(|| {
                anyhow!("unknown compliance framework '{name}' (expected soc2, hipaa or pci_dss)")
            })
        })
        .collect()
}

/// The file's contents when `code_or_file` names a file, otherwise the
/// argument itself.
fn read_code(code_or_file: &str) -> Result<String> {
    let path = Path::new(code_or_file);
    if path.is_file() {
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
    } else {
        Ok(code_or_file.to_string())
    }
}

async fn cmd_security_audit(
    app: &App,
    code_or_file: &str,
    options: &AuditOptions,
    project: Option<&str>,
) -> Result<()> {
    let threat_path = project
        .map(|p| app.config.threat_model_path(p))
        .transpose()?;
    let code = read_code(code_or_file)?;
    let engine = app.engine().await;
    let agents: AgentSet = engine.agents().guarded(app.config.call_timeout);
    if agents.workers().is_empty() {
        return Err(ForgeError::MissingRole {
            role: "any non-dispatch agent".to_string(),
        }
        .into());
    }

    let attestation = run_audit(&agents, &code, options).await?;

    if let Some(project) = project {
        let mut dashboard = DashboardStore::open(app.config.team.clone(), app.config.dashboard_dir());
        dashboard.record_attestation(project, &attestation, attestation.overall_score());
        if let (Some(model), Some(path)) = (&attestation.threat_model, &threat_path) {
            crossforge_core::store::save_json(path, model)
                .with_context(|| format!("Failed to save threat model to {}", path.display()))?;
        }
        info!(project = %project, "audit recorded on dashboard");
    }

    app.emit(&attestation.to_report(), || render::attestation(&attestation))
}

fn cmd_dashboard(app: &App) -> Result<()> {
    let store = DashboardStore::open(app.config.team.clone(), app.config.dashboard_dir());
    let summary = store.summary();
    app.emit(&summary, || render::dashboard(&summary))
}

fn cmd_marketplace_browse(app: &App, query: &str, tags: &[String], min_rating: f64) -> Result<()> {
    let marketplace = StrategyMarketplace::open(app.config.marketplace_path());
    let listings = marketplace.browse(query, tags, min_rating);
    app.emit(&listings, || {
        let mut table = Table::new(
            format!("Marketplace ({} of {})", listings.len(), marketplace.total_listings()),
            &["Strategy", "Rating", "Downloads", "Tags"],
        );
        for listing in &listings {
            table.row([
                listing.name.clone(),
                format!("{:.1} ({})", listing.rating, listing.rating_count),
                listing.downloads.to_string(),
                listing.tags.join(", "),
            ]);
        }
        table.render()
    })
}

fn cmd_marketplace_rate(app: &App, name: &str, rating: f64) -> Result<()> {
    if !rating.is_finite() {
        bail!("rating must be a number between 1 and 5");
    }
    let mut marketplace = StrategyMarketplace::open(app.config.marketplace_path());
    if !marketplace.rate(name, rating) {
        bail!("no strategy named '{name}' in the marketplace");
    }
    let listing = marketplace
        .get_listing(name)
        .ok_or_else(|| anyhow!("listing '{name}' vanished after rating"))?;
    app.emit(listing, || {
        format!(
            "{}: {:.1} average over {} ratings\n",
            listing.name, listing.rating, listing.rating_count
        )
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct StrategyStats {
    runs: usize,
    average_score: f64,
}

#[derive(Serialize)]
struct RoutingStats {
    history_entries: usize,
    strategies: BTreeMap<String, StrategyStats>,
    team_id: String,
    team_best: BTreeMap<String, String>,
    team_entries: usize,
}

fn strategy_stats(entries: &[RoutingEntry]) -> BTreeMap<String, StrategyStats> {
    let mut sums: BTreeMap<String, (usize, f64)> = BTreeMap::new();
    for entry in entries {
        let slot = sums.entry(entry.strategy.clone()).or_default();
        slot.0 += 1;
        slot.1 += entry.score;
    }
    sums.into_iter()
        .map(|(name, (runs, total))| {
            let average_score = (total / runs as f64 * 10.0).round() / 10.0;
            (name, StrategyStats { runs, average_score })
        })
        .collect()
}

async fn cmd_routing_stats(app: &App) -> Result<()> {
    let history = RoutingHistory::open(app.config.routing_history_path());
    let sync = RoutingSync::open(app.config.team.clone(), app.config.routing_dir());
    let sync_stats = sync.sync().await;

    let stats = RoutingStats {
        history_entries: history.len(),
        strategies: strategy_stats(&history.entries()),
        team_id: sync.team_id().to_string(),
        team_best: sync.profile().best_strategies(),
        team_entries: sync_stats.local_entries,
    };

    app.emit(&stats, || {
        let mut table = Table::new(
            format!("Routing history ({} runs)", stats.history_entries),
            &["Strategy", "Runs", "Avg score"],
        );
        for (name, s) in &stats.strategies {
            table.row([name.clone(), s.runs.to_string(), format!("{:.1}", s.average_score)]);
        }
        let mut out = table.render();
        let mut team = Table::new(
            format!("\nTeam {} ({} entries)", stats.team_id, stats.team_entries),
            &["Signal", "Best strategy"],
        );
        for (signal, strategy) in &stats.team_best {
            team.row([signal.as_str(), strategy.as_str()]);
        }
        out.push_str(&team.render());
        out
    })
}

async fn cmd_status(app: &App) -> Result<()> {
    let auth = AuthManager::from_env();
    let status = auth.status();
    let engine = app.engine().await;
    let agents = engine.available_agents();
    let stages: Vec<u8> = engine.available_stages().iter().map(|s| s.number()).collect();
    let providers: Vec<ProviderAuth> = PROVIDERS.iter().map(|p| auth.get(p)).collect();

    let report = json!({
        "version": crossforge_core::VERSION,
        "auth": status,
        "providers": providers,
        "agents": agents,
        "stages": stages,
        "home": app.config.home,
        "team": app.config.team,
    });

    app.emit(&report, || {
        let mut table = Table::new(
            format!("crossforge {}", crossforge_core::VERSION),
            &["Provider", "Method", "Available"],
        );
        for a in &providers {
            let method = serde_json::to_value(a.method)
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default();
            table.row([a.provider.clone(), method, if a.available { "yes" } else { "no" }.to_string()]);
        }
        let mut out = table.render();
        out.push_str(&format!(
            "\nAgents: {}\nStages: {:?}\nDegraded: {}\nHome: {}\nTeam: {}\n",
            if agents.is_empty() { "none".to_string() } else { agents.join(", ") },
            stages,
            status.degraded,
            app.config.home.display(),
            app.config.team,
        ));
        out
    })
}

/// Error chain on one line, skipping causes already spelled out by the
/// message above them.
fn one_line(err: &anyhow::Error) -> String {
    let mut parts: Vec<String> = Vec::new();
    for cause in err.chain() {
        let text = cause.to_string();
        if parts.last().map_or(true, |prev| !prev.contains(&text)) {
            parts.push(text);
        }
    }
    parts.join(": ")
}

fn needs_credentials_hint(err: &anyhow::Error) -> bool {
    err.chain()
        .filter_map(|cause| cause.downcast_ref::<ForgeError>())
        .any(|e| {
            matches!(
                e,
                ForgeError::StrategyFailed { .. } | ForgeError::MissingRole { .. }
            ) || e.is_agent_failure()
        })
}
