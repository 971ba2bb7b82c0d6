//! Error types for provider adapters

use crossforge_core::ForgeError;
use thiserror::Error;

/// Longest slice of an error body kept in [`ProviderError::Status`].
const BODY_EXCERPT: usize = 300;

/// Errors raised while talking to a model provider
#[derive(Error, Debug)]
pub enum ProviderError {
    /// No credential configured for the provider
    #[error("no API key configured for {0}")]
    MissingKey(String),

    /// Transport-level failure
    #[error("HTTP error: {0}")]
    Http(String),

    /// Provider answered with a non-success status
    #[error("provider returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Response JSON did not have the expected shape
    #[error("unexpected response shape: {0}")]
    Shape(String),

    /// Local CLI passthrough failed
    #[error("CLI '{program}' failed: {message}")]
    Cli { program: String, message: String },

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProviderError {
    pub fn status(status: u16, body: &str) -> Self {
        let body: String = body.chars().take(BODY_EXCERPT).collect();
        ProviderError::Status { status, body }
    }

    /// Attribute this failure to the agent registered as `agent`.
    pub fn for_agent(self, agent: &str) -> ForgeError {
        ForgeError::agent(agent, self)
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        ProviderError::Http(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ProviderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_body_is_truncated() {
        let long = "x".repeat(1000);
        match ProviderError::status(429, &long) {
            ProviderError::Status { status, body } => {
                assert_eq!(status, 429);
                assert_eq!(body.len(), BODY_EXCERPT);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_for_agent_is_an_agent_failure() {
        let err = ProviderError::MissingKey("openai".into()).for_agent("codex");
        assert!(err.is_agent_failure());
        assert!(err.to_string().contains("codex"));
        assert!(err.to_string().contains("openai"));
    }
}
