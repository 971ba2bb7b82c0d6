//! In-memory agents for tests.
//!
//! [`ScriptedAgent`] replies from a script and records every prompt it was
//! given. [`FailingAgent`] always errors.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::agent::{Agent, AgentContext};
use crate::domain::{ForgeError, Result};

type ReplyFn = Box<dyn Fn(&str) -> String + Send + Sync>;

enum Script {
    Fixed(String),
    /// Replies in order; the last one repeats once the queue is drained.
    Sequence(Mutex<VecDeque<String>>, Mutex<String>),
    Func(ReplyFn),
}

/// Scripted agent that records prompts.
pub struct ScriptedAgent {
    script: Script,
    prompts: Mutex<Vec<String>>,
    delay: Mutex<Option<Duration>>,
    available: AtomicBool,
}

impl ScriptedAgent {
    fn build(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            prompts: Mutex::new(Vec::new()),
            delay: Mutex::new(None),
            available: AtomicBool::new(true),
        })
    }

    /// Always replies with `reply`.
    pub fn fixed(reply: impl Into<String>) -> Arc<Self> {
        Self::build(Script::Fixed(reply.into()))
    }

    /// Replies with each entry in turn, then keeps repeating the last one.
    /// An empty script replies with an empty string.
    pub fn sequence<I, S>(replies: I) -> Arc<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let queue: VecDeque<String> = replies.into_iter().map(Into::into).collect();
        Self::build(Script::Sequence(Mutex::new(queue), Mutex::new(String::new())))
    }

    /// Computes the reply from the prompt.
    pub fn from_fn(f: impl Fn(&str) -> String + Send + Sync + 'static) -> Arc<Self> {
        Self::build(Script::Func(Box::new(f)))
    }

    /// Sleep for `delay` before every reply.
    pub fn with_delay(self: Arc<Self>, delay: Duration) -> Arc<Self> {
        if let Ok(mut slot) = self.delay.lock() {
            *slot = Some(delay);
        }
        self
    }

    /// Make `is_available` report `false`.
    pub fn unavailable(self: Arc<Self>) -> Arc<Self> {
        self.available.store(false, Ordering::SeqCst);
        self
    }

    pub fn call_count(&self) -> usize {
        self.prompts().len()
    }

    /// Every prompt received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    fn reply(&self, prompt: &str) -> String {
        match &self.script {
            Script::Fixed(reply) => reply.clone(),
            Script::Sequence(queue, last) => {
                let next = queue.lock().ok().and_then(|mut q| q.pop_front());
                match (next, last.lock()) {
                    (Some(reply), Ok(mut last)) => {
                        *last = reply.clone();
                        reply
                    }
                    (Some(reply), Err(_)) => reply,
                    (None, Ok(last)) => last.clone(),
                    (None, Err(_)) => String::new(),
                }
            }
            Script::Func(f) => f(prompt),
        }
    }
}

#[async_trait]
impl Agent for ScriptedAgent {
    async fn execute(&self, prompt: &str, _context: Option<&AgentContext>) -> Result<String> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        let delay = self.delay.lock().ok().and_then(|d| *d);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.reply(prompt))
    }

    async fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }
}

/// Agent whose every call fails with the given message.
pub struct FailingAgent {
    message: String,
}

impl FailingAgent {
    pub fn new(message: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            message: message.into(),
        })
    }
}

#[async_trait]
impl Agent for FailingAgent {
    async fn execute(&self, _prompt: &str, _context: Option<&AgentContext>) -> Result<String> {
        Err(ForgeError::agent("failing", &self.message))
    }

    async fn is_available(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sequence_repeats_last_reply() {
        let agent = ScriptedAgent::sequence(["a", "b"]);
        let mut replies = Vec::new();
        for _ in 0..4 {
            replies.push(agent.execute("p", None).await.unwrap());
        }
        assert_eq!(replies, vec!["a", "b", "b", "b"]);
        assert_eq!(agent.call_count(), 4);
    }

    #[tokio::test]
    async fn test_from_fn_sees_prompt() {
        let agent = ScriptedAgent::from_fn(|p| p.to_uppercase());
        assert_eq!(agent.execute("abc", None).await.unwrap(), "ABC");
        assert_eq!(agent.prompts(), vec!["abc"]);
    }

    #[tokio::test]
    async fn test_unavailable_and_failing() {
        let agent = ScriptedAgent::fixed("x").unavailable();
        assert!(!agent.is_available().await);

        let failing = FailingAgent::new("rate limited");
        let err = failing.execute("p", None).await.unwrap_err();
        assert!(err.to_string().contains("rate limited"));
    }
}
