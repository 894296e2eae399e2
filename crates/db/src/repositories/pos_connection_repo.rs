//! Repository for the `pos_connections` table.
//!
//! All token columns are ciphertext produced by the credential vault; this
//! layer never sees plaintext tokens.

use boutique_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::pos_connection::{PosConnection, UpsertPosConnection};

const COLUMNS: &str = "\
    id, store_id, provider, merchant_id, location_id, shop_domain, \
    access_token_encrypted, refresh_token_encrypted, token_expires_at, \
    provider_metadata, is_active, created_at, updated_at";

pub struct PosConnectionRepo;

impl PosConnectionRepo {
    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Insert or replace the connection for `(store_id, provider)`.
    ///
    /// A reconnect overwrites every field with the new values and
    /// reactivates the row. An existing `location_id` is kept when the new
    /// input does not carry one.
    pub async fn upsert(
        pool: &PgPool,
        input: &UpsertPosConnection,
    ) -> Result<PosConnection, sqlx::Error> {
        let query = format!(
            "INSERT INTO pos_connections \
                (store_id, provider, merchant_id, location_id, shop_domain, \
                 access_token_encrypted, refresh_token_encrypted, token_expires_at, \
                 provider_metadata, is_active) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, TRUE) \
             ON CONFLICT ON CONSTRAINT uq_pos_connections_store_provider DO UPDATE SET \
                 merchant_id = EXCLUDED.merchant_id, \
                 location_id = COALESCE(EXCLUDED.location_id, pos_connections.location_id), \
                 shop_domain = EXCLUDED.shop_domain, \
                 access_token_encrypted = EXCLUDED.access_token_encrypted, \
                 refresh_token_encrypted = EXCLUDED.refresh_token_encrypted, \
                 token_expires_at = EXCLUDED.token_expires_at, \
                 provider_metadata = EXCLUDED.provider_metadata, \
                 is_active = TRUE \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, PosConnection>(&query)
            .bind(input.store_id)
            .bind(&input.provider)
            .bind(&input.merchant_id)
            .bind(&input.location_id)
            .bind(&input.shop_domain)
            .bind(&input.access_token_encrypted)
            .bind(&input.refresh_token_encrypted)
            .bind(input.token_expires_at)
            .bind(&input.provider_metadata)
            .fetch_one(pool)
            .await
    }

    /// Store rotated tokens after a refresh.
    pub async fn update_tokens(
        pool: &PgPool,
        id: DbId,
        access_token_encrypted: &str,
        refresh_token_encrypted: Option<&str>,
        token_expires_at: Option<Timestamp>,
    ) -> Result<Option<PosConnection>, sqlx::Error> {
        let query = format!(
            "UPDATE pos_connections SET \
                 access_token_encrypted = $2, \
                 refresh_token_encrypted = $3, \
                 token_expires_at = $4 \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, PosConnection>(&query)
            .bind(id)
            .bind(access_token_encrypted)
            .bind(refresh_token_encrypted)
            .bind(token_expires_at)
            .fetch_optional(pool)
            .await
    }

    pub async fn set_location_id(
        pool: &PgPool,
        id: DbId,
        location_id: &str,
    ) -> Result<Option<PosConnection>, sqlx::Error> {
        let query = format!(
            "UPDATE pos_connections SET location_id = $2 WHERE id = $1 RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, PosConnection>(&query)
            .bind(id)
            .bind(location_id)
            .fetch_optional(pool)
            .await
    }

    /// Soft-delete: flip `is_active` off. Returns `false` if no active row
    /// matched.
    pub async fn deactivate(
        pool: &PgPool,
        store_id: DbId,
        provider: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE pos_connections SET is_active = FALSE \
             WHERE store_id = $1 AND provider = $2 AND is_active",
        )
        .bind(store_id)
        .bind(provider)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<PosConnection>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM pos_connections WHERE id = $1");
        sqlx::query_as::<_, PosConnection>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// The connection for `(store_id, provider)`, active or not.
    pub async fn find_for_store(
        pool: &PgPool,
        store_id: DbId,
        provider: &str,
    ) -> Result<Option<PosConnection>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM pos_connections WHERE store_id = $1 AND provider = $2"
        );
        sqlx::query_as::<_, PosConnection>(&query)
            .bind(store_id)
            .bind(provider)
            .fetch_optional(pool)
            .await
    }

    /// Active connections for a store, oldest first.
    pub async fn list_active_for_store(
        pool: &PgPool,
        store_id: DbId,
    ) -> Result<Vec<PosConnection>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM pos_connections \
             WHERE store_id = $1 AND is_active \
             ORDER BY created_at ASC, id ASC"
        );
        sqlx::query_as::<_, PosConnection>(&query)
            .bind(store_id)
            .fetch_all(pool)
            .await
    }

    /// Most recently updated active connection with this provider location.
    pub async fn find_active_by_location(
        pool: &PgPool,
        provider: &str,
        location_id: &str,
    ) -> Result<Option<PosConnection>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM pos_connections \
             WHERE provider = $1 AND location_id = $2 AND is_active \
             ORDER BY updated_at DESC, id DESC LIMIT 1"
        );
        sqlx::query_as::<_, PosConnection>(&query)
            .bind(provider)
            .bind(location_id)
            .fetch_optional(pool)
            .await
    }

    /// Most recently updated active connection for this provider merchant.
    ///
    /// With `only_unlocated`, connections pinned to a location are skipped.
    pub async fn find_active_by_merchant(
        pool: &PgPool,
        provider: &str,
        merchant_id: &str,
        only_unlocated: bool,
    ) -> Result<Option<PosConnection>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM pos_connections \
             WHERE provider = $1 AND merchant_id = $2 AND is_active \
               AND ($3 = FALSE OR location_id IS NULL) \
             ORDER BY updated_at DESC, id DESC LIMIT 1"
        );
        sqlx::query_as::<_, PosConnection>(&query)
            .bind(provider)
            .bind(merchant_id)
            .bind(only_unlocated)
            .fetch_optional(pool)
            .await
    }

    /// Most recently updated active connection for a Shopify shop domain.
    pub async fn find_active_by_shop_domain(
        pool: &PgPool,
        provider: &str,
        shop_domain: &str,
    ) -> Result<Option<PosConnection>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM pos_connections \
             WHERE provider = $1 AND lower(shop_domain) = lower($2) AND is_active \
             ORDER BY updated_at DESC, id DESC LIMIT 1"
        );
        sqlx::query_as::<_, PosConnection>(&query)
            .bind(provider)
            .bind(shop_domain)
            .fetch_optional(pool)
            .await
    }
}
