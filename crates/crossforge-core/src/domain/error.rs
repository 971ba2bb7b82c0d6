//! Domain-level error taxonomy for crossforge.

/// Crossforge orchestration errors.
#[derive(Debug, thiserror::Error)]
pub enum ForgeError {
    #[error("required agent role '{role}' is not registered")]
    MissingRole { role: String },

    #[error("agent '{agent}' failed: {message}")]
    Agent { agent: String, message: String },

    #[error("agent '{agent}' did not respond within {timeout_ms} ms")]
    Deadline { agent: String, timeout_ms: u64 },

    #[error("strategy '{strategy}' failed: {source} (check agent availability and credentials)")]
    StrategyFailed {
        strategy: String,
        #[source]
        source: Box<ForgeError>,
    },

    #[error("strategy not registered: {0}")]
    UnknownStrategy(String),

    #[error("no strategies registered with the router")]
    NoStrategies,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ForgeError {
    /// Shorthand for a provider-side failure attributed to `agent`.
    pub fn agent(agent: impl Into<String>, message: impl std::fmt::Display) -> Self {
        ForgeError::Agent {
            agent: agent.into(),
            message: message.to_string(),
        }
    }

    /// `true` for failures the core treats as "agent unavailable for this call".
    pub fn is_agent_failure(&self) -> bool {
        matches!(self, ForgeError::Agent { .. } | ForgeError::Deadline { .. })
    }
}

/// Result type for crossforge operations.
pub type Result<T> = std::result::Result<T, ForgeError>;
