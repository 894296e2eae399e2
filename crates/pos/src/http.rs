//! Shared HTTP plumbing for provider API calls.

use std::time::Duration;

use boutique_core::provider::PosProvider;
use serde::de::DeserializeOwned;

use crate::error::PosError;

/// Default upper bound on any single provider call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest provider error body kept in a [`PosError::Api`] message.
const MAX_ERROR_BODY: usize = 500;

/// Build the client every adapter shares. All requests carry `timeout`.
pub fn build_client(timeout: Duration) -> Result<reqwest::Client, PosError> {
    Ok(reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("boutique-pos/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

/// Map a non-2xx response to [`PosError::Api`], keeping a truncated body
/// for operator logs.
pub async fn ensure_success(
    provider: PosProvider,
    response: reqwest::Response,
) -> Result<reqwest::Response, PosError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|e| format!("<unreadable body: {e}>"));
    let message: String = body.chars().take(MAX_ERROR_BODY).collect();
    tracing::warn!(
        provider = %provider,
        status = status.as_u16(),
        body = %message,
        "Provider API returned an error status",
    );
    Err(PosError::Api {
        provider,
        status: status.as_u16(),
        message,
    })
}

/// Check the status and decode a JSON body.
pub async fn parse_json<T: DeserializeOwned>(
    provider: PosProvider,
    response: reqwest::Response,
) -> Result<T, PosError> {
    let response = ensure_success(provider, response).await?;
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| PosError::decode(provider, e.to_string()))
}
