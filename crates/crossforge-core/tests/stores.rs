//! Local JSON stores: routing, team sync, dashboard and marketplace.

use crossforge_core::cloud::Trend;
use crossforge_core::fakes::ScriptedAgent;
use crossforge_core::{
    run_audit, AgentSet, AuditOptions, DashboardStore, ForgeConfig, ProjectSnapshot, RoutingEntry,
    RoutingSync, StrategyListing, StrategyMarketplace, StrategyRegistry,
};

#[test]
fn routing_entry_round_trips_through_json() {
    let entry = RoutingEntry::for_task("secure the upload endpoint", "adversarial", 82.5);
    let value = serde_json::to_value(&entry).unwrap();
    assert_eq!(value["task_signals"], serde_json::json!(["security"]));
    assert_eq!(serde_json::from_value::<RoutingEntry>(value).unwrap(), entry);
}

#[test]
fn project_snapshot_round_trips_through_json() {
    let snapshot = ProjectSnapshot {
        security_score: 77,
        confidence_score: 85,
        compliance_pass_rate: 0.5,
        agents_used: vec!["claude".into()],
        ..ProjectSnapshot::new("billing")
    };
    let value = serde_json::to_value(&snapshot).unwrap();
    assert_eq!(serde_json::from_value::<ProjectSnapshot>(value).unwrap(), snapshot);
}

#[test]
fn strategy_listing_round_trips_through_json() {
    let market = StrategyMarketplace::in_memory();
    let listing = market.get_listing("evolutionary").unwrap().clone();
    let value = serde_json::to_value(&listing).unwrap();
    assert_eq!(serde_json::from_value::<StrategyListing>(value).unwrap(), listing);
}

#[tokio::test]
async fn audit_feeds_the_team_dashboard() {
    let dir = tempfile::tempdir().unwrap();
    let config = ForgeConfig::default().with_home(dir.path());
    let agents = AgentSet::new()
        .with("claude", ScriptedAgent::fixed("NO_VULNERABILITIES_FOUND"))
        .with("codex", ScriptedAgent::fixed("NO_VULNERABILITIES_FOUND"));

    let attestation = run_audit(&agents, "code", &AuditOptions::default()).await.unwrap();
    {
        let mut store = DashboardStore::open(&config.team, config.dashboard_dir());
        let snapshot = store.record_attestation("api", &attestation, 90);
        assert!(snapshot.owasp_clean);
        assert_eq!(snapshot.security_score, 100);
    }

    let store = DashboardStore::open(&config.team, config.dashboard_dir());
    let summary = store.summary();
    assert_eq!(summary.team_id, "default");
    assert_eq!(summary.total_runs, 1);
    assert_eq!(summary.owasp_compliance_rate, "100%");
    assert_eq!(summary.projects["api"].trend, Trend::Stable);
}

#[test]
fn team_sync_merges_exported_entries() {
    let dir = tempfile::tempdir().unwrap();
    let mut alice = RoutingSync::open("core", dir.path().join("alice"));
    alice.record(RoutingEntry::for_task("benchmark the parser", "evolutionary", 88.0));

    let mut bob = RoutingSync::open("core", dir.path().join("bob"));
    assert_eq!(bob.merge_remote(alice.export_entries(None)), 1);
    assert_eq!(bob.merge_remote(alice.export_entries(None)), 0);
    assert_eq!(
        bob.recommendation(&["performance".to_string()]).as_deref(),
        Some("evolutionary")
    );
}

#[test]
fn marketplace_lists_registry_and_persists_ratings() {
    let dir = tempfile::tempdir().unwrap();
    let path = ForgeConfig::default().with_home(dir.path()).marketplace_path();
    {
        let mut market = StrategyMarketplace::open(&path);
        assert_eq!(market.list_registry(&StrategyRegistry::builtins()), 6);
        assert_eq!(market.total_listings(), 7);
        assert!(market.rate("cognitive_mesh", 0.0));
    }
    let market = StrategyMarketplace::open(&path);
    let mesh = market.get_listing("cognitive_mesh").unwrap();
    assert_eq!(mesh.rating, 1.0);
    assert_eq!(mesh.rating_count, 1);
}
