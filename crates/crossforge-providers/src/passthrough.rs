//! Agents backed by a locally installed vendor CLI instead of an API key.

use std::process::Stdio;

use async_trait::async_trait;
use crossforge_core::{Agent, AgentContext};
use tokio::process::Command;
use tracing::instrument;

use crate::auth::find_on_path;
use crate::error::{ProviderError, Result};

/// Runs `program <args..> <prompt>` and returns trimmed stdout.
pub struct CliAgent {
    name: String,
    program: String,
    args: Vec<String>,
}

impl CliAgent {
    pub fn new(name: impl Into<String>, program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            args,
        }
    }

    /// `claude -p <prompt>`.
    pub fn claude(name: impl Into<String>) -> Self {
        Self::new(name, "claude", vec!["-p".to_string()])
    }

    /// `openai api chat.completions.create -m <model> -g user <prompt>`.
    pub fn openai(name: impl Into<String>, model: &str) -> Self {
        let args = ["api", "chat.completions.create", "-m", model, "-g", "user"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        Self::new(name, "openai", args)
    }

    /// Full argument vector for `prompt`.
    pub fn command_args(&self, prompt: &str) -> Vec<String> {
        let mut args = self.args.clone();
        args.push(prompt.to_string());
        args
    }

    async fn run(&self, prompt: &str) -> Result<String> {
        let output = Command::new(&self.program)
            .args(self.command_args(prompt))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| self.failure(e))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(self.failure(format!("{}: {}", output.status, stderr.trim())));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn failure(&self, message: impl std::fmt::Display) -> ProviderError {
        ProviderError::Cli {
            program: self.program.clone(),
            message: message.to_string(),
        }
    }
}

#[async_trait]
impl Agent for CliAgent {
    #[instrument(skip_all, fields(agent = %self.name, program = %self.program))]
    async fn execute(&self, prompt: &str, _context: Option<&AgentContext>) -> crossforge_core::Result<String> {
        self.run(prompt).await.map_err(|e| e.for_agent(&self.name))
    }

    async fn is_available(&self) -> bool {
        find_on_path(&self.program).is_some()
    }
}
