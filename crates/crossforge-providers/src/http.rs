//! Shared HTTP plumbing for the provider adapters.

use serde_json::Value;
use tracing::debug;

use crate::error::{ProviderError, Result};

/// Build the client every adapter uses.
pub fn client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("crossforge/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(ProviderError::from)
}

/// Send `request` and decode a JSON body, turning non-2xx into
/// [`ProviderError::Status`].
pub async fn send_json(request: reqwest::RequestBuilder) -> Result<Value> {
    let response = request.send().await?;
    let status = response.status();
    let text = response.text().await?;
    debug!(status = status.as_u16(), bytes = text.len(), "provider response");
    if !status.is_success() {
        return Err(ProviderError::status(status.as_u16(), &text));
    }
    Ok(serde_json::from_str(&text)?)
}

/// Join a base URL and a path without doubling the slash.
pub fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}
