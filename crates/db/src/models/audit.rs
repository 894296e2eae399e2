use boutique_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `audit_events` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AuditEvent {
    pub id: DbId,
    pub store_id: DbId,
    pub review_session_id: Option<DbId>,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub created_at: Timestamp,
}
