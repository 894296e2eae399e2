//! The capability set every POS adapter implements, and the value types
//! that cross it.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use boutique_core::normalized::{NormalizedOrder, NormalizedTransaction};
use boutique_core::provider::PosProvider;
use boutique_core::types::Timestamp;
use chrono::{Duration, Utc};
use serde::Serialize;

use crate::error::PosError;

/// Tokens expiring within this window are refreshed on read.
pub const REFRESH_WINDOW_HOURS: i64 = 24;

// ---------------------------------------------------------------------------
// Value types
// ---------------------------------------------------------------------------

/// Result of a code exchange or refresh. Plaintext, so never logged.
#[derive(Clone, Default)]
pub struct OAuthTokens {
    pub access_token: String,
    /// Absent for providers with permanent tokens.
    pub refresh_token: Option<String>,
    pub expires_at: Option<Timestamp>,
    /// Shopify reports the shop the token is bound to.
    pub shop_domain: Option<String>,
    /// Provider-specific extras (granted scope, account id).
    pub extra: serde_json::Value,
}

impl fmt::Debug for OAuthTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthTokens")
            .field("access_token", &"[REDACTED]")
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("expires_at", &self.expires_at)
            .field("shop_domain", &self.shop_domain)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MerchantLocation {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MerchantInfo {
    pub merchant_id: String,
    pub business_name: String,
    pub locations: Vec<MerchantLocation>,
}

/// Provider-specific context for API calls. Shopify needs the shop domain
/// because every shop has its own API host.
#[derive(Debug, Clone, Default)]
pub struct ProviderOptions {
    pub shop: Option<String>,
}

/// Extra inputs when building an authorization URL.
#[derive(Debug, Clone, Default)]
pub struct AuthorizationOptions {
    pub shop: Option<String>,
    /// Front-end URL to send the merchant back to after the callback.
    pub return_url: Option<String>,
}

/// An inbound webhook delivery as seen by an adapter.
#[derive(Debug, Clone, Copy)]
pub struct WebhookRequest<'a> {
    /// The exact bytes the provider signed.
    pub body: &'a [u8],
    /// Header names are lower-case.
    pub headers: &'a HashMap<String, String>,
    /// Public URL the provider posted to; part of Square's signed message.
    pub notification_url: &'a str,
}

impl WebhookRequest<'_> {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}

/// Outcome of signature verification plus envelope extraction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WebhookValidation {
    pub is_valid: bool,
    pub event_id: Option<String>,
    pub event_type: Option<String>,
    pub payload: Option<serde_json::Value>,
    /// Shop the delivery came from, when the provider says so in headers.
    pub shop_domain: Option<String>,
}

impl WebhookValidation {
    pub fn invalid() -> Self {
        Self::default()
    }
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Uniform interface over one POS platform's OAuth, API and webhook shape.
#[async_trait]
pub trait PosAdapter: Send + Sync {
    fn provider(&self) -> PosProvider;

    /// Build the URL the merchant is redirected to for consent. The `state`
    /// parameter embeds the store, this provider, a timestamp, and any
    /// provider context.
    fn authorization_url(
        &self,
        store_public_id: &str,
        redirect_uri: &str,
        options: &AuthorizationOptions,
    ) -> Result<String, PosError>;

    /// Trade a single-use authorization code for tokens. Never retried.
    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
        options: &ProviderOptions,
    ) -> Result<OAuthTokens, PosError>;

    async fn refresh_tokens(&self, refresh_token: &str) -> Result<OAuthTokens, PosError>;

    /// Whether a token with this expiry should be refreshed before use.
    fn needs_refresh(&self, expires_at: Option<Timestamp>) -> bool {
        expires_within_window(expires_at, Utc::now())
    }

    async fn merchant_info(
        &self,
        access_token: &str,
        options: &ProviderOptions,
    ) -> Result<MerchantInfo, PosError>;

    async fn get_order(
        &self,
        access_token: &str,
        order_id: &str,
        options: &ProviderOptions,
    ) -> Result<NormalizedOrder, PosError>;

    /// Verify the delivery signature and pull out the event envelope.
    fn validate_webhook(&self, request: &WebhookRequest<'_>, secret: &str) -> WebhookValidation;

    /// `None` for anything that is not a payment-completion style event.
    fn parse_transaction(&self, payload: &serde_json::Value) -> Option<NormalizedTransaction>;

    /// Subscribe the app to the provider's order webhooks, for providers
    /// that need it done per merchant. Best effort.
    async fn register_webhooks(
        &self,
        _access_token: &str,
        _options: &ProviderOptions,
        _callback_url: &str,
    ) -> Result<(), PosError> {
        Ok(())
    }
}

/// Default refresh policy: refresh when the token expires within
/// [`REFRESH_WINDOW_HOURS`]. Tokens with no expiry never need it.
pub fn expires_within_window(expires_at: Option<Timestamp>, now: Timestamp) -> bool {
    match expires_at {
        Some(at) => at - now <= Duration::hours(REFRESH_WINDOW_HOURS),
        None => false,
    }
}

// ---------------------------------------------------------------------------
// JSON helpers shared by adapters
// ---------------------------------------------------------------------------

/// Read a field that providers send either as a string or a number.
pub(crate) fn json_id(value: &serde_json::Value, key: &str) -> Option<String> {
    match value.get(key)? {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn json_str<'a>(value: &'a serde_json::Value, key: &str) -> Option<&'a str> {
    value.get(key)?.as_str().filter(|s| !s.is_empty())
}

/// Parse an RFC 3339 timestamp field, ignoring anything malformed.
pub(crate) fn json_timestamp(value: &serde_json::Value, key: &str) -> Option<Timestamp> {
    json_str(value, key)
        .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Integer part of a quantity that may arrive as `"2"`, `"1.5"` or `2`.
pub(crate) fn parse_quantity(value: Option<&serde_json::Value>) -> i64 {
    match value {
        Some(serde_json::Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
            .unwrap_or(1),
        Some(serde_json::Value::String(s)) => s
            .split('.')
            .next()
            .and_then(|whole| whole.trim().parse().ok())
            .unwrap_or(1),
        _ => 1,
    }
}
