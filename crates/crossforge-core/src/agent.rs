//! The agent abstraction and the role-keyed agent set.
//!
//! An [`Agent`] is any backend that turns a prompt into text. Strategies see
//! agents only through an [`AgentSet`], keyed by logical role name.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::future::try_join_all;
use serde_json::Value;

use crate::domain::{ForgeError, Result};
use crate::metrics::METRICS;
use crate::obs;

/// Logical role names understood by the engine and the built-in strategies.
pub mod roles {
    pub const CLAUDE: &str = "claude";
    pub const CODEX: &str = "codex";
    pub const OLLAMA: &str = "ollama";
    pub const NIM: &str = "nim";
    pub const DISPATCH: &str = "dispatch";
}

/// Optional key/value context passed alongside a prompt.
pub type AgentContext = BTreeMap<String, Value>;

/// A text-generating backend.
///
/// Any failure (network, auth, rate limit) is reported as an `Err`; callers
/// treat every failure as "agent unavailable for this call" and do not retry.
#[async_trait]
pub trait Agent: Send + Sync {
    async fn execute(&self, prompt: &str, context: Option<&AgentContext>) -> Result<String>;

    /// Cheap liveness probe. Must not fail.
    async fn is_available(&self) -> bool;
}

/// Role name → agent, in registration order.
#[derive(Clone, Default)]
pub struct AgentSet {
    entries: Vec<(String, Arc<dyn Agent>)>,
}

impl AgentSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `agent` under `role`. Re-registering a role replaces the agent
    /// but keeps its original position.
    pub fn insert(&mut self, role: impl Into<String>, agent: Arc<dyn Agent>) {
        let role = role.into();
        match self.entries.iter_mut().find(|(name, _)| *name == role) {
            Some(slot) => slot.1 = agent,
            None => self.entries.push((role, agent)),
        }
    }

    pub fn with(mut self, role: impl Into<String>, agent: Arc<dyn Agent>) -> Self {
        self.insert(role, agent);
        self
    }

    pub fn get(&self, role: &str) -> Option<&Arc<dyn Agent>> {
        self.entries
            .iter()
            .find(|(name, _)| name == role)
            .map(|(_, agent)| agent)
    }

    /// Like [`AgentSet::get`], but a missing role is an error.
    pub fn require(&self, role: &str) -> Result<&Arc<dyn Agent>> {
        self.get(role).ok_or_else(|| ForgeError::MissingRole {
            role: role.to_string(),
        })
    }

    pub fn contains(&self, role: &str) -> bool {
        self.get(role).is_some()
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<dyn Agent>)> {
        self.entries.iter().map(|(name, agent)| (name.as_str(), agent))
    }

    /// Every role except `dispatch`, in registration order.
    pub fn workers(&self) -> Vec<(&str, &Arc<dyn Agent>)> {
        self.iter().filter(|(name, _)| *name != roles::DISPATCH).collect()
    }

    /// A copy of the set with every agent wrapped in a [`GuardedAgent`].
    pub fn guarded(&self, deadline: Option<Duration>) -> AgentSet {
        let entries = self
            .entries
            .iter()
            .map(|(name, agent)| {
                let guarded: Arc<dyn Agent> =
                    Arc::new(GuardedAgent::new(name.clone(), agent.clone(), deadline));
                (name.clone(), guarded)
            })
            .collect();
        AgentSet { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for AgentSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// Decorator adding a per-call deadline, metrics and call logging.
pub struct GuardedAgent {
    name: String,
    inner: Arc<dyn Agent>,
    deadline: Option<Duration>,
}

impl GuardedAgent {
    pub fn new(name: impl Into<String>, inner: Arc<dyn Agent>, deadline: Option<Duration>) -> Self {
        Self {
            name: name.into(),
            inner,
            deadline,
        }
    }
}

#[async_trait]
impl Agent for GuardedAgent {
    async fn execute(&self, prompt: &str, context: Option<&AgentContext>) -> Result<String> {
        METRICS.inc_agent_calls();
        let started = Instant::now();

        let outcome = match self.deadline {
            Some(limit) => match tokio::time::timeout(limit, self.inner.execute(prompt, context)).await {
                Ok(res) => res,
                Err(_) => Err(ForgeError::Deadline {
                    agent: self.name.clone(),
                    timeout_ms: limit.as_millis() as u64,
                }),
            },
            None => self.inner.execute(prompt, context).await,
        };

        match &outcome {
            Ok(reply) => obs::emit_agent_call(
                &self.name,
                prompt.len(),
                reply.len(),
                started.elapsed().as_millis() as u64,
            ),
            Err(e) => {
                METRICS.inc_agent_failures();
                obs::emit_agent_failed(&self.name, e);
            }
        }
        outcome
    }

    async fn is_available(&self) -> bool {
        self.inner.is_available().await
    }
}

/// Send each `(agent, prompt)` pair concurrently and wait for all replies.
///
/// Replies come back in input order. The first failure fails the whole join.
pub async fn join_calls(calls: &[(&Arc<dyn Agent>, String)]) -> Result<Vec<String>> {
    try_join_all(
        calls
            .iter()
            .map(|(agent, prompt)| agent.execute(prompt.as_str(), None)),
    )
    .await
}

/// Send the same prompt to every agent concurrently.
pub async fn fan_out(agents: &[&Arc<dyn Agent>], prompt: &str) -> Result<Vec<String>> {
    try_join_all(agents.iter().map(|agent| agent.execute(prompt, None))).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{FailingAgent, ScriptedAgent};

    #[test]
    fn test_insert_keeps_registration_order() {
        let set = AgentSet::new()
            .with("codex", ScriptedAgent::fixed("a"))
            .with("dispatch", ScriptedAgent::fixed("b"))
            .with("claude", ScriptedAgent::fixed("c"))
            .with("codex", ScriptedAgent::fixed("d"));
        assert_eq!(set.names(), vec!["codex", "dispatch", "claude"]);
        assert_eq!(set.len(), 3);
        let workers: Vec<_> = set.workers().into_iter().map(|(n, _)| n).collect();
        assert_eq!(workers, vec!["codex", "claude"]);
    }

    #[test]
    fn test_require_reports_missing_role() {
        let set = AgentSet::new();
        let err = set.require("dispatch").err().unwrap();
        assert!(matches!(err, ForgeError::MissingRole { ref role } if role == "dispatch"));
    }

    #[tokio::test]
    async fn test_fan_out_preserves_order() {
        let a: Arc<dyn Agent> = ScriptedAgent::fixed("one");
        let b: Arc<dyn Agent> = ScriptedAgent::fixed("two");
        let replies = fan_out(&[&a, &b], "p").await.unwrap();
        assert_eq!(replies, vec!["one", "two"]);
    }

    #[tokio::test]
    async fn test_fan_out_fails_as_a_whole() {
        let ok: Arc<dyn Agent> = ScriptedAgent::fixed("fine");
        let bad: Arc<dyn Agent> = FailingAgent::new("boom");
        let err = fan_out(&[&ok, &bad], "p").await.unwrap_err();
        assert!(err.is_agent_failure());
    }

    #[tokio::test(start_paused = true)]
    async fn test_guarded_agent_enforces_deadline() {
        let slow = ScriptedAgent::fixed("late").with_delay(Duration::from_secs(30));
        let guarded = GuardedAgent::new("slow", slow, Some(Duration::from_secs(1)));
        let err = guarded.execute("p", None).await.unwrap_err();
        assert!(matches!(err, ForgeError::Deadline { timeout_ms: 1000, .. }));
    }

    #[tokio::test]
    async fn test_guarded_agent_passes_through_without_deadline() {
        let inner = ScriptedAgent::fixed("hi");
        let guarded = GuardedAgent::new("x", inner.clone(), None);
        assert_eq!(guarded.execute("p", None).await.unwrap(), "hi");
        assert!(guarded.is_available().await);
        assert_eq!(inner.call_count(), 1);
    }
}
