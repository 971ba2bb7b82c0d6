//! Team-facing local stores: the security dashboard and the strategy
//! marketplace index.
//!
//! Both load their JSON document once on construction and rewrite it after
//! every mutation (see [`crate::store`]).

pub mod dashboard;
pub mod marketplace;

pub use dashboard::{DashboardStore, DashboardSummary, ProjectSnapshot, ProjectSummary, TeamDashboard, Trend};
pub use marketplace::{MarketplaceIndex, StrategyListing, StrategyMarketplace};
