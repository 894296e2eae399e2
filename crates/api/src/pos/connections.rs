//! Connection Manager: the only component that reads or writes
//! `pos_connections`.
//!
//! Tokens are encrypted with the vault before they reach the repository and
//! decrypted only in [`ConnectionManager::access_token_for`], which also
//! refreshes expiring tokens on read.

use boutique_core::crypto::TokenVault;
use boutique_core::error::CoreError;
use boutique_core::provider::PosProvider;
use boutique_core::types::DbId;
use boutique_db::models::pos_connection::{PosConnection, UpsertPosConnection};
use boutique_db::repositories::PosConnectionRepo;
use boutique_pos::adapter::OAuthTokens;
use boutique_pos::ProviderRegistry;
use serde::Serialize;
use sqlx::PgPool;

use crate::error::AppResult;
use crate::state::AppState;

/// Input for creating or replacing a store's connection to one provider.
#[derive(Debug)]
pub struct ConnectionInput {
    pub store_id: DbId,
    pub provider: PosProvider,
    pub merchant_id: String,
    pub location_id: Option<String>,
    pub shop_domain: Option<String>,
    pub tokens: OAuthTokens,
    pub metadata: serde_json::Value,
}

/// Vendor-side identifiers carried by a webhook, used to find the owning
/// connection.
#[derive(Debug, Default, Clone)]
pub struct ProviderIdentifiers<'a> {
    pub merchant_id: Option<&'a str>,
    pub location_id: Option<&'a str>,
    pub shop_domain: Option<&'a str>,
}

/// Client-facing projection of a connection. Never carries tokens.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionView {
    pub id: DbId,
    pub provider: String,
    pub merchant_id: String,
    pub location_id: Option<String>,
    pub shop_domain: Option<String>,
    pub is_active: bool,
    pub has_access_token: bool,
    pub token_expires_at: Option<boutique_core::types::Timestamp>,
    pub metadata: serde_json::Value,
    pub created_at: boutique_core::types::Timestamp,
    pub updated_at: boutique_core::types::Timestamp,
}

impl From<PosConnection> for ConnectionView {
    fn from(conn: PosConnection) -> Self {
        Self {
            id: conn.id,
            has_access_token: !conn.access_token_encrypted.is_empty(),
            provider: conn.provider,
            merchant_id: conn.merchant_id,
            location_id: conn.location_id,
            shop_domain: conn.shop_domain,
            is_active: conn.is_active,
            token_expires_at: conn.token_expires_at,
            metadata: conn.provider_metadata,
            created_at: conn.created_at,
            updated_at: conn.updated_at,
        }
    }
}

pub struct ConnectionManager<'a> {
    pool: &'a PgPool,
    registry: &'a ProviderRegistry,
    vault: &'a TokenVault,
}

impl<'a> ConnectionManager<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self {
            pool: &state.pool,
            registry: &state.registry,
            vault: &state.vault,
        }
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Encrypt the tokens and write the connection for
    /// `(store_id, provider)`, activating it.
    pub async fn upsert(&self, input: ConnectionInput) -> AppResult<PosConnection> {
        let access_token_encrypted = self.vault.encrypt(&input.tokens.access_token)?;
        let refresh_token_encrypted = self
            .vault
            .encrypt_opt(input.tokens.refresh_token.as_deref())?;

        let conn = PosConnectionRepo::upsert(
            self.pool,
            &UpsertPosConnection {
                store_id: input.store_id,
                provider: input.provider.as_str().to_string(),
                merchant_id: input.merchant_id,
                location_id: input.location_id,
                shop_domain: input.shop_domain,
                access_token_encrypted,
                refresh_token_encrypted,
                token_expires_at: input.tokens.expires_at,
                provider_metadata: input.metadata,
            },
        )
        .await?;

        tracing::info!(
            connection_id = conn.id,
            store_id = conn.store_id,
            provider = %input.provider,
            "POS connection saved",
        );
        Ok(conn)
    }

    pub async fn set_location_id(
        &self,
        connection_id: DbId,
        location_id: &str,
    ) -> AppResult<PosConnection> {
        let location_id = location_id.trim();
        if location_id.is_empty() {
            return Err(CoreError::Validation("locationId must not be empty".into()).into());
        }
        PosConnectionRepo::set_location_id(self.pool, connection_id, location_id)
            .await?
            .ok_or_else(|| CoreError::not_found("PosConnection", connection_id).into())
    }

    /// Soft delete. Fails with not-found when there is no active connection.
    pub async fn disconnect(&self, store_id: DbId, provider: PosProvider) -> AppResult<()> {
        if !PosConnectionRepo::deactivate(self.pool, store_id, provider.as_str()).await? {
            return Err(CoreError::not_found("PosConnection", provider).into());
        }
        tracing::info!(store_id, provider = %provider, "POS connection deactivated");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub async fn list_for_store(&self, store_id: DbId) -> AppResult<Vec<PosConnection>> {
        Ok(PosConnectionRepo::list_active_for_store(self.pool, store_id).await?)
    }

    /// The connection for `(store_id, provider)`, active or not.
    pub async fn get_for_store(
        &self,
        store_id: DbId,
        provider: PosProvider,
    ) -> AppResult<Option<PosConnection>> {
        Ok(PosConnectionRepo::find_for_store(self.pool, store_id, provider.as_str()).await?)
    }

    /// Map vendor-side identifiers back to an active connection.
    ///
    /// A location id wins over a merchant id. When a location id was given
    /// but matched nothing, the merchant fallback only considers connections
    /// without a pinned location, so a multi-location merchant never routes
    /// an event to the wrong store. The shop domain is tried last.
    pub async fn find_by_provider_identifier(
        &self,
        provider: PosProvider,
        ids: &ProviderIdentifiers<'_>,
    ) -> AppResult<Option<PosConnection>> {
        let provider = provider.as_str();

        if let Some(location_id) = ids.location_id {
            if let Some(conn) =
                PosConnectionRepo::find_active_by_location(self.pool, provider, location_id)
                    .await?
            {
                return Ok(Some(conn));
            }
        }

        if let Some(merchant_id) = ids.merchant_id {
            let only_unlocated = ids.location_id.is_some();
            if let Some(conn) = PosConnectionRepo::find_active_by_merchant(
                self.pool,
                provider,
                merchant_id,
                only_unlocated,
            )
            .await?
            {
                return Ok(Some(conn));
            }
        }

        if let Some(shop_domain) = ids.shop_domain {
            return Ok(
                PosConnectionRepo::find_active_by_shop_domain(self.pool, provider, shop_domain)
                    .await?,
            );
        }

        Ok(None)
    }

    /// Plaintext access token for an active connection, refreshed first when
    /// it is about to expire.
    pub async fn get_access_token(&self, connection_id: DbId) -> AppResult<String> {
        let conn = PosConnectionRepo::find_by_id(self.pool, connection_id)
            .await?
            .filter(|c| c.is_active)
            .ok_or_else(|| CoreError::not_found("PosConnection", connection_id))?;
        self.access_token_for(&conn).await
    }

    /// [`Self::get_access_token`] for an already loaded connection.
    ///
    /// Decryption failures surface as errors; a tampered token is never
    /// treated as a missing one.
    pub async fn access_token_for(&self, conn: &PosConnection) -> AppResult<String> {
        let (provider, adapter) = self.registry.resolve(&conn.provider)?;
        let access_token = self.vault.decrypt(&conn.access_token_encrypted)?;

        let Some(refresh_encrypted) = conn.refresh_token_encrypted.as_deref() else {
            return Ok(access_token);
        };
        if !adapter.needs_refresh(conn.token_expires_at) {
            return Ok(access_token);
        }

        let refresh_token = self.vault.decrypt(refresh_encrypted)?;
        tracing::info!(
            connection_id = conn.id,
            provider = %provider,
            expires_at = ?conn.token_expires_at,
            "Refreshing POS access token",
        );
        let tokens = adapter.refresh_tokens(&refresh_token).await?;

        // Keep the current refresh token when the provider did not rotate it.
        let next_refresh = tokens.refresh_token.as_deref().unwrap_or(&refresh_token);
        PosConnectionRepo::update_tokens(
            self.pool,
            conn.id,
            &self.vault.encrypt(&tokens.access_token)?,
            Some(&self.vault.encrypt(next_refresh)?),
            tokens.expires_at,
        )
        .await?;

        Ok(tokens.access_token)
    }
}
