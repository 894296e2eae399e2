use boutique_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// Status given to sessions created from an imported order.
pub const STATUS_PENDING: &str = "PENDING";

/// A row from the `review_sessions` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ReviewSession {
    pub id: DbId,
    pub public_id: String,
    pub store_id: DbId,
    pub order_id: Option<DbId>,
    pub status: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
