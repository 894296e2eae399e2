//! Opaque OAuth `state` parameter carried across the provider redirect.
//!
//! The state is base64-encoded JSON. It is readable by anyone holding the
//! URL, so it only ever carries routing data: the store, the provider the
//! flow was started for, when it was started, and optional context such as
//! the Shopify shop domain and a front-end return URL.

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine as _;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::provider::PosProvider;

/// States older than this are rejected on callback (one hour).
pub const STATE_MAX_AGE_MS: i64 = 60 * 60 * 1000;

/// Allowed clock skew for states stamped slightly in the future.
const STATE_FUTURE_SKEW_MS: i64 = 5 * 60 * 1000;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StateError {
    #[error("Invalid state")]
    Malformed,

    #[error("OAuth state has expired")]
    Expired,

    #[error("Provider mismatch: state was issued for {expected}, callback was for {actual}")]
    ProviderMismatch {
        expected: PosProvider,
        actual: PosProvider,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthState {
    pub store_public_id: String,
    pub provider: PosProvider,
    /// Milliseconds since the Unix epoch when the flow was started.
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shop_domain: Option<String>,
    #[serde(
        default,
        alias = "frontendRedirectUrl",
        skip_serializing_if = "Option::is_none"
    )]
    pub return_url: Option<String>,
}

impl OAuthState {
    /// A state for `store_public_id` stamped with the current time.
    pub fn new(store_public_id: impl Into<String>, provider: PosProvider) -> Self {
        Self {
            store_public_id: store_public_id.into(),
            provider,
            timestamp: Utc::now().timestamp_millis(),
            shop_domain: None,
            return_url: None,
        }
    }

    pub fn with_shop_domain(mut self, shop_domain: Option<String>) -> Self {
        self.shop_domain = shop_domain;
        self
    }

    pub fn with_return_url(mut self, return_url: Option<String>) -> Self {
        self.return_url = return_url;
        self
    }

    pub fn encode(&self) -> String {
        // Serializing a struct of strings and integers cannot fail.
        let json = serde_json::to_vec(self).unwrap_or_default();
        STANDARD.encode(json)
    }

    /// Decode a state received on callback. Accepts the standard and the
    /// URL-safe unpadded alphabets since some providers re-encode it.
    pub fn decode(raw: &str) -> Result<Self, StateError> {
        let raw = raw.trim();
        let bytes = STANDARD
            .decode(raw)
            .or_else(|_| URL_SAFE_NO_PAD.decode(raw.trim_end_matches('=')))
            .map_err(|_| StateError::Malformed)?;
        let state: Self = serde_json::from_slice(&bytes).map_err(|_| StateError::Malformed)?;
        if state.store_public_id.trim().is_empty() {
            return Err(StateError::Malformed);
        }
        Ok(state)
    }

    /// Check the state belongs to `provider` and was issued recently
    /// relative to `now_ms`.
    pub fn verify(&self, provider: PosProvider, now_ms: i64) -> Result<(), StateError> {
        if self.provider != provider {
            return Err(StateError::ProviderMismatch {
                expected: self.provider,
                actual: provider,
            });
        }
        let age = now_ms
            .checked_sub(self.timestamp)
            .ok_or(StateError::Expired)?;
        if age > STATE_MAX_AGE_MS || age < -STATE_FUTURE_SKEW_MS {
            return Err(StateError::Expired);
        }
        Ok(())
    }
}
