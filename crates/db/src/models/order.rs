use boutique_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `orders` table. Amounts are in minor currency units.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Order {
    pub id: DbId,
    pub store_id: DbId,
    pub pos_connection_id: Option<DbId>,
    pub provider: String,
    pub external_order_id: String,
    pub total_amount: i64,
    pub currency: String,
    pub line_items: serde_json::Value,
    pub raw_payload: Option<serde_json::Value>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone)]
pub struct CreateOrder {
    pub store_id: DbId,
    pub pos_connection_id: Option<DbId>,
    pub provider: String,
    pub external_order_id: String,
    pub total_amount: i64,
    pub currency: String,
    pub line_items: serde_json::Value,
    pub raw_payload: Option<serde_json::Value>,
}
