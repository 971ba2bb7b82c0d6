//! Runtime configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::{ForgeError, Result};

pub const HOME_VAR: &str = "CROSSFORGE_HOME";
pub const CALL_TIMEOUT_VAR: &str = "CROSSFORGE_CALL_TIMEOUT_SECS";
pub const TEAM_VAR: &str = "CROSSFORGE_TEAM";

/// Where crossforge keeps its data and how long agent calls may take.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForgeConfig {
    /// Data directory for routing history, dashboards, marketplace and threats.
    pub home: PathBuf,
    /// Per-agent-call deadline. `None` waits forever.
    pub call_timeout: Option<Duration>,
    /// Team id used by the dashboard and routing sync.
    pub team: String,
}

impl Default for ForgeConfig {
    fn default() -> Self {
        Self {
            home: default_home(),
            call_timeout: None,
            team: "default".to_string(),
        }
    }
}

fn default_home() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".crossforge")
}

impl ForgeConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(home) = lookup(HOME_VAR).filter(|h| !h.is_empty()) {
            config.home = PathBuf::from(home);
        }
        if let Some(raw) = lookup(CALL_TIMEOUT_VAR).filter(|v| !v.trim().is_empty()) {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                ForgeError::InvalidConfig(format!("{CALL_TIMEOUT_VAR} must be whole seconds, got '{raw}'"))
            })?;
            config.call_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(team) = lookup(TEAM_VAR).filter(|t| !t.is_empty()) {
            check_file_stem(TEAM_VAR, &team)?;
            config.team = team;
        }
        Ok(config)
    }

    /// Same config rooted at `home`.
    pub fn with_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.home = home.into();
        self
    }

    pub fn routing_history_path(&self) -> PathBuf {
        self.home.join("routing").join("history.json")
    }

    /// Directory holding `<team>.json` routing profiles.
    pub fn routing_dir(&self) -> PathBuf {
        self.home.join("routing")
    }

    pub fn dashboard_dir(&self) -> PathBuf {
        self.home.join("dashboard")
    }

    pub fn marketplace_path(&self) -> PathBuf {
        self.home.join("marketplace").join("index.json")
    }

    pub fn threats_dir(&self) -> PathBuf {
        self.home.join("threats")
    }

    /// `<threats_dir>/<project>.json`. The project name must be a plain file
    /// stem so the model cannot land outside `threats_dir`.
    pub fn threat_model_path(&self, project: &str) -> Result<PathBuf> {
        check_file_stem("project", project)?;
        Ok(self.threats_dir().join(format!("{project}.json")))
    }
}

/// Names used as `<name>.json` under a data directory: no separators, no
/// dot-only names.
pub fn check_file_stem(what: &str, name: &str) -> Result<()> {
    let bad = name.is_empty()
        || name.chars().all(|c| c == '.')
        || name.contains(['/', '\\', '\0']);
    if bad {
        return Err(ForgeError::InvalidConfig(format!(
            "{what} '{name}' must be a plain name without path separators"
        )));
    }
    Ok(())
}
