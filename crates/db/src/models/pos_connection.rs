//! POS connection rows and their upsert input.

use boutique_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `pos_connections` table.
///
/// Token columns hold vault ciphertext and are never serialized.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PosConnection {
    pub id: DbId,
    pub store_id: DbId,
    pub provider: String,
    pub merchant_id: String,
    pub location_id: Option<String>,
    pub shop_domain: Option<String>,
    #[serde(skip_serializing)]
    pub access_token_encrypted: String,
    #[serde(skip_serializing)]
    pub refresh_token_encrypted: Option<String>,
    pub token_expires_at: Option<Timestamp>,
    pub provider_metadata: serde_json::Value,
    pub is_active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Values written by an upsert keyed on `(store_id, provider)`.
///
/// Token fields must already be encrypted.
#[derive(Debug, Clone)]
pub struct UpsertPosConnection {
    pub store_id: DbId,
    pub provider: String,
    pub merchant_id: String,
    pub location_id: Option<String>,
    pub shop_domain: Option<String>,
    pub access_token_encrypted: String,
    pub refresh_token_encrypted: Option<String>,
    pub token_expires_at: Option<Timestamp>,
    pub provider_metadata: serde_json::Value,
}
