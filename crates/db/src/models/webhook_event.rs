use boutique_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `webhook_events` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct WebhookEvent {
    pub id: DbId,
    pub provider: String,
    pub event_id: String,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub status: String,
    pub pos_connection_id: Option<DbId>,
    pub error_message: Option<String>,
    /// Processing attempts, counting retries after `FAILED`.
    pub attempts: i32,
    pub received_at: Timestamp,
    pub processed_at: Option<Timestamp>,
}

#[derive(Debug, Clone)]
pub struct CreateWebhookEvent<'a> {
    pub provider: &'a str,
    pub event_id: &'a str,
    pub event_type: &'a str,
    pub payload: &'a serde_json::Value,
}
