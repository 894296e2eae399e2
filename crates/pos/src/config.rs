//! Per-provider configuration loaded from the environment.
//!
//! A provider is configured only when its client id, client secret and
//! webhook signing secret are all present and non-empty. Anything less
//! leaves it out of the registry.

use std::fmt;
use std::time::Duration;

use boutique_core::provider::PosProvider;

/// A configuration value that must never appear in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

// ---------------------------------------------------------------------------
// Square
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SquareEnvironment {
    Sandbox,
    Production,
}

impl SquareEnvironment {
    pub fn base_url(self) -> &'static str {
        match self {
            Self::Sandbox => "https://connect.squareupsandbox.com",
            Self::Production => "https://connect.squareup.com",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SquareConfig {
    pub app_id: String,
    pub app_secret: Secret,
    pub webhook_signature_key: Secret,
    pub environment: SquareEnvironment,
}

// ---------------------------------------------------------------------------
// Shopify
// ---------------------------------------------------------------------------

pub const DEFAULT_SHOPIFY_API_VERSION: &str = "2025-01";

#[derive(Debug, Clone)]
pub struct ShopifyConfig {
    pub client_id: String,
    pub client_secret: Secret,
    pub webhook_secret: Secret,
    pub api_version: String,
}

// ---------------------------------------------------------------------------
// Lightspeed
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct LightspeedConfig {
    pub client_id: String,
    pub client_secret: Secret,
    pub webhook_secret: Secret,
}

// ---------------------------------------------------------------------------
// Aggregate
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PosConfig {
    pub square: Option<SquareConfig>,
    pub shopify: Option<ShopifyConfig>,
    pub lightspeed: Option<LightspeedConfig>,
    /// Timeout applied to every outbound provider call.
    pub http_timeout: Duration,
}

impl Default for PosConfig {
    fn default() -> Self {
        Self {
            square: None,
            shopify: None,
            lightspeed: None,
            http_timeout: crate::http::DEFAULT_TIMEOUT,
        }
    }
}

impl PosConfig {
    /// Load provider configuration from environment variables.
    ///
    /// | Env Var                        | Default   |
    /// |--------------------------------|-----------|
    /// | `SQUARE_APP_ID`                | unset     |
    /// | `SQUARE_APP_SECRET`            | unset     |
    /// | `SQUARE_WEBHOOK_SIGNATURE_KEY` | unset     |
    /// | `SQUARE_ENV`                   | `sandbox` |
    /// | `SHOPIFY_CLIENT_ID`            | unset     |
    /// | `SHOPIFY_CLIENT_SECRET`        | unset     |
    /// | `SHOPIFY_WEBHOOK_SECRET`       | unset     |
    /// | `SHOPIFY_API_VERSION`          | `2025-01` |
    /// | `LIGHTSPEED_CLIENT_ID`         | unset     |
    /// | `LIGHTSPEED_CLIENT_SECRET`     | unset     |
    /// | `LIGHTSPEED_WEBHOOK_SECRET`    | unset     |
    /// | `POS_HTTP_TIMEOUT_SECS`        | `30`      |
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let square = match (
            get("SQUARE_APP_ID"),
            get("SQUARE_APP_SECRET"),
            get("SQUARE_WEBHOOK_SIGNATURE_KEY"),
        ) {
            (Some(app_id), Some(secret), Some(key)) => Some(SquareConfig {
                app_id,
                app_secret: Secret::new(secret),
                webhook_signature_key: Secret::new(key),
                environment: match get("SQUARE_ENV").as_deref() {
                    Some(env) if env.eq_ignore_ascii_case("production") => {
                        SquareEnvironment::Production
                    }
                    _ => SquareEnvironment::Sandbox,
                },
            }),
            _ => None,
        };

        let shopify = match (
            get("SHOPIFY_CLIENT_ID"),
            get("SHOPIFY_CLIENT_SECRET"),
            get("SHOPIFY_WEBHOOK_SECRET"),
        ) {
            (Some(client_id), Some(secret), Some(webhook)) => Some(ShopifyConfig {
                client_id,
                client_secret: Secret::new(secret),
                webhook_secret: Secret::new(webhook),
                api_version: get("SHOPIFY_API_VERSION")
                    .unwrap_or_else(|| DEFAULT_SHOPIFY_API_VERSION.to_string()),
            }),
            _ => None,
        };

        let lightspeed = match (
            get("LIGHTSPEED_CLIENT_ID"),
            get("LIGHTSPEED_CLIENT_SECRET"),
            get("LIGHTSPEED_WEBHOOK_SECRET"),
        ) {
            (Some(client_id), Some(secret), Some(webhook)) => Some(LightspeedConfig {
                client_id,
                client_secret: Secret::new(secret),
                webhook_secret: Secret::new(webhook),
            }),
            _ => None,
        };

        let http_timeout = get("POS_HTTP_TIMEOUT_SECS")
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(crate::http::DEFAULT_TIMEOUT);

        Self {
            square,
            shopify,
            lightspeed,
            http_timeout,
        }
    }

    /// The secret used to verify webhooks from `provider`, if configured.
    pub fn webhook_secret(&self, provider: PosProvider) -> Option<&str> {
        match provider {
            PosProvider::Square => self
                .square
                .as_ref()
                .map(|c| c.webhook_signature_key.expose()),
            PosProvider::Shopify => self.shopify.as_ref().map(|c| c.webhook_secret.expose()),
            PosProvider::Lightspeed => {
                self.lightspeed.as_ref().map(|c| c.webhook_secret.expose())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> PosConfig {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        PosConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn provider_requires_all_three_values() {
        let config = config_from(&[
            ("SQUARE_APP_ID", "sq0idp"),
            ("SQUARE_APP_SECRET", "sq0csp"),
        ]);
        assert!(config.square.is_none());
        assert!(config.webhook_secret(PosProvider::Square).is_none());
    }

    #[test]
    fn empty_strings_count_as_unset() {
        let config = config_from(&[
            ("SHOPIFY_CLIENT_ID", "id"),
            ("SHOPIFY_CLIENT_SECRET", "secret"),
            ("SHOPIFY_WEBHOOK_SECRET", "  "),
        ]);
        assert!(config.shopify.is_none());
    }

    #[test]
    fn square_defaults_to_sandbox() {
        let config = config_from(&[
            ("SQUARE_APP_ID", "sq0idp"),
            ("SQUARE_APP_SECRET", "sq0csp"),
            ("SQUARE_WEBHOOK_SIGNATURE_KEY", "sig"),
        ]);
        let square = config.square.as_ref().unwrap();
        assert_eq!(square.environment, SquareEnvironment::Sandbox);
        assert_eq!(config.webhook_secret(PosProvider::Square), Some("sig"));
        assert_eq!(config.http_timeout, Duration::from_secs(30));
    }

    #[test]
    fn secrets_are_not_debug_printed() {
        let config = config_from(&[
            ("LIGHTSPEED_CLIENT_ID", "ls-id"),
            ("LIGHTSPEED_CLIENT_SECRET", "ls-very-secret"),
            ("LIGHTSPEED_WEBHOOK_SECRET", "ls-hook-secret"),
        ]);
        let printed = format!("{config:?}");
        assert!(printed.contains("ls-id"));
        assert!(!printed.contains("ls-very-secret"));
        assert!(!printed.contains("ls-hook-secret"));
    }
}
