use std::sync::Arc;

use boutique_core::crypto::TokenVault;
use boutique_pos::ProviderRegistry;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: boutique_db::DbPool,
    /// Server configuration, including provider webhook secrets.
    pub config: Arc<ServerConfig>,
    /// Adapters for the configured POS providers. Read-only after startup.
    pub registry: Arc<ProviderRegistry>,
    /// Encrypts and decrypts stored provider tokens.
    pub vault: Arc<TokenVault>,
}
