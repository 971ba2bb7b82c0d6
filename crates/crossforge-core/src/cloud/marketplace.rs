//! Strategy marketplace index.

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::store;
use crate::strategy::{Strategy, StrategyRegistry};

pub const BUILTIN_AUTHOR: &str = "crossforge";
pub const BUILTIN_VERSION: &str = "1.0.0";

struct BuiltinListing {
    name: &'static str,
    display_name: &'static str,
    description: &'static str,
    tags: &'static [&'static str],
}

const BUILTIN_LISTINGS: [BuiltinListing; 7] = [
    BuiltinListing {
        name: "adversarial",
        display_name: "Adversarial Synthesis",
        description: "Build/attack/fuzz cycles with cross-vendor verification. One agent builds, another attacks, a third fuzzes.",
        tags: &["security", "verification", "cross-vendor"],
    },
    BuiltinListing {
        name: "consensus",
        display_name: "Consensus Mode",
        description: "Same task through multiple agents, compare and merge the best results.",
        tags: &["comparison", "verification", "lightweight"],
    },
    BuiltinListing {
        name: "verification_loop",
        display_name: "Verification Loop",
        description: "One agent writes code, another writes tests, they cross-verify and iterate.",
        tags: &["testing", "verification", "tdd"],
    },
    BuiltinListing {
        name: "pipeline",
        display_name: "Sequential Pipeline",
        description: "Architect -> Build -> Specialist Review -> Dispatch. Clean handoff chain.",
        tags: &["sequential", "structured", "architecture"],
    },
    BuiltinListing {
        name: "cognitive_mesh",
        display_name: "Cognitive Mesh",
        description: "All agents solve in parallel, dispatch merges the best parts of each solution.",
        tags: &["parallel", "merge", "comprehensive"],
    },
    BuiltinListing {
        name: "evolutionary",
        display_name: "Evolutionary Generation",
        description: "Generate multiple candidates, score fitness, breed best traits across generations.",
        tags: &["evolutionary", "optimization", "genetic"],
    },
    BuiltinListing {
        name: "adaptive_router",
        display_name: "Adaptive Router",
        description: "Learns which strategy works best per task type. Improves over time.",
        tags: &["routing", "adaptive", "learning"],
    },
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyListing {
    pub name: String,
    pub display_name: String,
    pub description: String,
    #[serde(default)]
    pub author: String,
    pub version: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Crate name or git URL.
    #[serde(default)]
    pub install_source: String,
    #[serde(default)]
    pub downloads: u64,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub rating_count: u32,
    #[serde(default)]
    pub stages_required: Vec<u8>,
}

impl StrategyListing {
    /// Listing for a live strategy. `display_name` is the name title-cased
    /// with underscores as spaces.
    pub fn from_strategy(strategy: &dyn Strategy, author: &str, description: &str, version: &str) -> Self {
        let name = strategy.name().to_string();
        let description = if description.is_empty() {
            format!("Strategy: {name}")
        } else {
            description.to_string()
        };
        Self {
            display_name: title_case(&name),
            description,
            author: author.to_string(),
            version: version.to_string(),
            tags: Vec::new(),
            install_source: String::new(),
            downloads: 0,
            rating: 0.0,
            rating_count: 0,
            stages_required: strategy.stages_needed(),
            name,
        }
    }

    fn builtin(b: &BuiltinListing) -> Self {
        Self {
            name: b.name.to_string(),
            display_name: b.display_name.to_string(),
            description: b.description.to_string(),
            author: BUILTIN_AUTHOR.to_string(),
            version: BUILTIN_VERSION.to_string(),
            tags: b.tags.iter().map(|t| t.to_string()).collect(),
            install_source: String::new(),
            downloads: 0,
            rating: 0.0,
            rating_count: 0,
            stages_required: Vec::new(),
        }
    }
}

fn title_case(name: &str) -> String {
    name.split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketplaceIndex {
    #[serde(default)]
    pub listings: Vec<StrategyListing>,
}

impl MarketplaceIndex {
    /// Listings matching every given filter, most downloaded first.
    ///
    /// `query` matches name, display name or description case-insensitively;
    /// `tags` matches listings sharing at least one tag; `min_rating` of 0
    /// disables the rating filter.
    pub fn search(&self, query: &str, tags: &[String], min_rating: f64) -> Vec<&StrategyListing> {
        let query = query.to_lowercase();
        let mut results: Vec<&StrategyListing> = self
            .listings
            .iter()
            .filter(|l| {
                query.is_empty()
                    || l.name.to_lowercase().contains(&query)
                    || l.description.to_lowercase().contains(&query)
                    || l.display_name.to_lowercase().contains(&query)
            })
            .filter(|l| tags.is_empty() || l.tags.iter().any(|t| tags.contains(t)))
            .filter(|l| min_rating <= 0.0 || l.rating >= min_rating)
            .collect();
        results.sort_by(|a, b| b.downloads.cmp(&a.downloads));
        results
    }

    /// Insert `listing`, replacing one with the same name. The new listing
    /// goes to the end.
    pub fn add_listing(&mut self, listing: StrategyListing) {
        self.listings.retain(|l| l.name != listing.name);
        self.listings.push(listing);
    }

    pub fn get(&self, name: &str) -> Option<&StrategyListing> {
        self.listings.iter().find(|l| l.name == name)
    }

    pub fn total_listings(&self) -> usize {
        self.listings.len()
    }

    /// Every distinct tag, sorted.
    pub fn categories(&self) -> Vec<String> {
        self.listings
            .iter()
            .flat_map(|l| l.tags.iter().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// Local marketplace client. The built-in strategies are always listed.
#[derive(Debug)]
pub struct StrategyMarketplace {
    path: Option<PathBuf>,
    index: MarketplaceIndex,
}

impl StrategyMarketplace {
    pub fn in_memory() -> Self {
        let mut market = Self {
            path: None,
            index: MarketplaceIndex::default(),
        };
        market.ensure_builtins();
        market
    }

    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let index: MarketplaceIndex = store::load_or_default(&path);
        debug!(path = %path.display(), listings = index.listings.len(), "marketplace index loaded");
        let mut market = Self {
            path: Some(path),
            index,
        };
        market.ensure_builtins();
        market
    }

    pub fn browse(&self, query: &str, tags: &[String], min_rating: f64) -> Vec<&StrategyListing> {
        self.index.search(query, tags, min_rating)
    }

    pub fn get_listing(&self, name: &str) -> Option<&StrategyListing> {
        self.index.get(name)
    }

    pub fn publish(&mut self, listing: StrategyListing) {
        info!(event = "marketplace.published", name = %listing.name, version = %listing.version);
        self.index.add_listing(listing);
        self.save();
    }

    /// Fold a 1-5 star rating (clamped) into the running average. `false`
    /// when no listing has that name.
    pub fn rate(&mut self, name: &str, rating: f64) -> bool {
        let rating = rating.clamp(1.0, 5.0);
        let Some(listing) = self.index.listings.iter_mut().find(|l| l.name == name) else {
            return false;
        };
        let total = listing.rating * listing.rating_count as f64 + rating;
        listing.rating_count += 1;
        listing.rating = total / listing.rating_count as f64;
        self.save();
        true
    }

    /// Publish a community listing for every strategy in `registry` that is
    /// not listed yet. Returns how many strategies the registry holds.
    pub fn list_registry(&mut self, registry: &StrategyRegistry) -> usize {
        let mut added = false;
        for strategy in registry.iter() {
            if self.index.get(strategy.name()).is_none() {
                self.index
                    .add_listing(StrategyListing::from_strategy(strategy.as_ref(), "community", "", "0.1.0"));
                added = true;
            }
        }
        if added {
            self.save();
        }
        registry.len()
    }

    pub fn total_listings(&self) -> usize {
        self.index.total_listings()
    }

    pub fn categories(&self) -> Vec<String> {
        self.index.categories()
    }

    pub fn index(&self) -> &MarketplaceIndex {
        &self.index
    }

    fn ensure_builtins(&mut self) {
        let mut added = false;
        for builtin in &BUILTIN_LISTINGS {
            if self.index.get(builtin.name).is_none() {
                self.index.add_listing(StrategyListing::builtin(builtin));
                added = true;
            }
        }
        if added {
            self.save();
        }
    }

    fn save(&self) {
        if let Some(path) = &self.path {
            store::save_or_warn(path, &self.index);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::{Consensus, Pipeline};
    use std::sync::Arc;

    #[test]
    fn test_builtins_are_listed() {
        let market = StrategyMarketplace::in_memory();
        assert_eq!(market.total_listings(), 7);
        let router = market.get_listing("adaptive_router").unwrap();
        assert_eq!(router.version, "1.0.0");
        assert_eq!(router.author, "crossforge");
        assert!(market.categories().contains(&"tdd".to_string()));
    }

    #[test]
    fn test_search_filters_and_orders() {
        let mut market = StrategyMarketplace::in_memory();
        let mut popular = market.get_listing("consensus").unwrap().clone();
        popular.downloads = 50;
        market.publish(popular);
        let mut less = market.get_listing("verification_loop").unwrap().clone();
        less.downloads = 10;
        market.publish(less);

        let hits = market.browse("", &["verification".to_string()], 0.0);
        let names: Vec<&str> = hits.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names[..2], ["consensus", "verification_loop"]);
        assert_eq!(names.len(), 3);

        assert_eq!(market.browse("MESH", &[], 0.0).len(), 1);
        assert!(market.browse("", &[], 4.0).is_empty());
    }

    #[test]
    fn test_rate_clamps_and_averages() {
        let mut market = StrategyMarketplace::in_memory();
        assert!(market.rate("pipeline", 9.0));
        assert!(market.rate("pipeline", 2.0));
        let listing = market.get_listing("pipeline").unwrap();
        assert_eq!(listing.rating_count, 2);
        assert_eq!(listing.rating, 3.5);
        assert!(!market.rate("missing", 3.0));
    }

    #[test]
    fn test_publish_replaces_by_name() {
        let mut market = StrategyMarketplace::in_memory();
        let mut custom = StrategyListing::from_strategy(&Consensus, "me", "", "2.0.0");
        custom.tags = vec!["custom".into()];
        market.publish(custom);
        assert_eq!(market.total_listings(), 7);
        assert_eq!(market.get_listing("consensus").unwrap().display_name, "Consensus");
        assert_eq!(market.get_listing("consensus").unwrap().description, "Strategy: consensus");
    }

    #[test]
    fn test_list_registry_adds_unknown_strategies() {
        let mut market = StrategyMarketplace::in_memory();
        market.index.listings.retain(|l| l.name != "pipeline");
        let mut registry = StrategyRegistry::new();
        registry.register(Arc::new(Pipeline::default()));
        registry.register(Arc::new(Consensus));

        assert_eq!(market.list_registry(&registry), 2);
        let pipeline = market.get_listing("pipeline").unwrap();
        assert_eq!(pipeline.author, "community");
        assert_eq!(pipeline.stages_required, vec![1, 2, 3, 5]);
        assert_eq!(pipeline.display_name, "Pipeline");
    }

    #[test]
    fn test_index_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("marketplace/index.json");
        {
            let mut market = StrategyMarketplace::open(&path);
            market.rate("consensus", 5.0);
        }
        let market = StrategyMarketplace::open(&path);
        assert_eq!(market.get_listing("consensus").unwrap().rating, 5.0);
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("verification_loop"), "Verification Loop");
    }
}
