use boutique_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `stores` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Store {
    pub id: DbId,
    pub public_id: String,
    pub name: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
