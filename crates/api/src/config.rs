use boutique_pos::config::{PosConfig, Secret};

/// Server configuration loaded from environment variables.
///
/// All fields except the encryption key have defaults suitable for local
/// development. In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    /// OAuth return URLs must point at one of these origins.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Public base URL of this server, used to build OAuth redirect URIs and
    /// webhook callback URLs (default: `http://localhost:3000`).
    pub app_base_url: String,
    /// 256-bit token encryption key as 64 hex characters.
    pub encryption_key: Secret,
    /// Per-provider credentials.
    pub pos: PosConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `HOST`                 | `0.0.0.0`                  |
    /// | `PORT`                 | `3000`                     |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                       |
    /// | `APP_BASE_URL`         | `http://localhost:3000`    |
    /// | `ENCRYPTION_KEY`       | required                   |
    ///
    /// Provider variables are documented on [`PosConfig::from_env`].
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let app_base_url = std::env::var("APP_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:3000".into())
            .trim_end_matches('/')
            .to_string();

        let encryption_key = Secret::new(
            std::env::var("ENCRYPTION_KEY").expect("ENCRYPTION_KEY must be set"),
        );

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            app_base_url,
            encryption_key,
            pos: PosConfig::from_env(),
        }
    }

    /// OAuth redirect URI registered with `provider` for this deployment.
    pub fn oauth_callback_url(&self, provider_segment: &str) -> String {
        format!(
            "{}/api/v1/pos/oauth/{}/callback",
            self.app_base_url,
            provider_segment.to_ascii_lowercase()
        )
    }

    /// Webhook delivery URL for `provider`.
    pub fn webhook_url(&self, provider_segment: &str) -> String {
        format!(
            "{}/api/v1/pos/webhook/{}",
            self.app_base_url,
            provider_segment.to_ascii_lowercase()
        )
    }
}
