//! Credential discovery across providers.
//!
//! A provider is usable with an API key from the environment, or through a
//! local CLI found on `PATH`. Ollama needs no credentials.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Providers crossforge knows how to authenticate, in probe order.
pub const PROVIDERS: [&str; 4] = ["anthropic", "openai", "ollama", "nvidia"];

/// Environment variable holding each keyed provider's API key.
pub fn env_key(provider: &str) -> Option<&'static str> {
    match provider {
        "anthropic" => Some("ANTHROPIC_API_KEY"),
        "openai" => Some("OPENAI_API_KEY"),
        "nvidia" => Some("NVIDIA_API_KEY"),
        _ => None,
    }
}

/// Local CLI that can stand in for a missing key.
pub fn cli_program(provider: &str) -> &str {
    match provider {
        "anthropic" => "claude",
        other => other,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    #[default]
    None,
    ApiKey,
    Cli,
    Local,
}

/// How one provider authenticates, if at all.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderAuth {
    pub provider: String,
    #[serde(skip)]
    pub api_key: String,
    pub method: AuthMethod,
    pub available: bool,
}

impl ProviderAuth {
    fn unavailable(provider: &str) -> Self {
        Self {
            provider: provider.to_string(),
            ..Self::default()
        }
    }

    pub fn from_env(provider: &str) -> Self {
        Self::from_lookup(provider, |k| std::env::var(k).ok(), |p| find_on_path(p).is_some())
    }

    /// Resolve from an arbitrary variable source and `PATH` probe.
    pub fn from_lookup(
        provider: &str,
        lookup: impl Fn(&str) -> Option<String>,
        on_path: impl Fn(&str) -> bool,
    ) -> Self {
        if provider == "ollama" {
            return Self {
                provider: provider.to_string(),
                api_key: String::new(),
                method: AuthMethod::Local,
                available: true,
            };
        }

        let key = env_key(provider).and_then(&lookup).filter(|k| !k.is_empty());
        if let Some(api_key) = key {
            return Self {
                provider: provider.to_string(),
                api_key,
                method: AuthMethod::ApiKey,
                available: true,
            };
        }

        if on_path(cli_program(provider)) {
            return Self {
                provider: provider.to_string(),
                api_key: String::new(),
                method: AuthMethod::Cli,
                available: true,
            };
        }

        Self::unavailable(provider)
    }
}

/// Availability summary across providers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthStatus {
    pub anthropic_available: bool,
    pub openai_available: bool,
    pub ollama_available: bool,
    pub nvidia_available: bool,
    /// Either Anthropic or OpenAI is missing.
    pub degraded: bool,
    /// Pipeline stages the available providers cover, ascending.
    pub available_stages: Vec<u8>,
}

/// Credentials for every known provider.
#[derive(Debug, Clone, Default)]
pub struct AuthManager {
    providers: BTreeMap<String, ProviderAuth>,
}

impl AuthManager {
    pub fn from_env() -> Self {
        Self::from_auths(PROVIDERS.iter().map(|p| ProviderAuth::from_env(p)))
    }

    pub fn from_auths(auths: impl IntoIterator<Item = ProviderAuth>) -> Self {
        let providers = auths
            .into_iter()
            .map(|a| (a.provider.clone(), a))
            .collect::<BTreeMap<_, _>>();
        debug!(
            available = ?providers.values().filter(|a| a.available).map(|a| a.provider.as_str()).collect::<Vec<_>>(),
            "provider credentials resolved"
        );
        Self { providers }
    }

    /// Auth for `provider`; unknown providers are unavailable.
    pub fn get(&self, provider: &str) -> ProviderAuth {
        self.providers
            .get(provider)
            .cloned()
            .unwrap_or_else(|| ProviderAuth::unavailable(provider))
    }

    fn available(&self, provider: &str) -> bool {
        self.providers.get(provider).is_some_and(|a| a.available)
    }

    pub fn status(&self) -> AuthStatus {
        let anthropic = self.available("anthropic");
        let openai = self.available("openai");
        let ollama = self.available("ollama");
        let nvidia = self.available("nvidia");

        let mut stages = Vec::new();
        if anthropic {
            stages.extend([1, 5]);
        }
        if openai {
            stages.push(2);
        }
        if ollama {
            stages.push(3);
        }
        if nvidia {
            stages.push(4);
        }
        stages.sort_unstable();
        stages.dedup();

        AuthStatus {
            anthropic_available: anthropic,
            openai_available: openai,
            ollama_available: ollama,
            nvidia_available: nvidia,
            degraded: !(anthropic && openai),
            available_stages: stages,
        }
    }
}

/// First executable named `program` in `PATH`.
pub fn find_on_path(program: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(program))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file() || path.with_extension("exe").is_file()
}
