//! Repository for the `audit_events` table (append-only).

use boutique_core::types::DbId;
use sqlx::PgPool;

use crate::models::audit::AuditEvent;

const COLUMNS: &str = "id, store_id, review_session_id, event_type, payload, created_at";

pub struct AuditEventRepo;

impl AuditEventRepo {
    pub async fn create(
        pool: &PgPool,
        store_id: DbId,
        event_type: &str,
        payload: &serde_json::Value,
        review_session_id: Option<DbId>,
    ) -> Result<AuditEvent, sqlx::Error> {
        let query = format!(
            "INSERT INTO audit_events (store_id, review_session_id, event_type, payload) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, AuditEvent>(&query)
            .bind(store_id)
            .bind(review_session_id)
            .bind(event_type)
            .bind(payload)
            .fetch_one(pool)
            .await
    }

    /// Newest first.
    pub async fn list_for_store(
        pool: &PgPool,
        store_id: DbId,
    ) -> Result<Vec<AuditEvent>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM audit_events WHERE store_id = $1 \
             ORDER BY created_at DESC, id DESC"
        );
        sqlx::query_as::<_, AuditEvent>(&query)
            .bind(store_id)
            .fetch_all(pool)
            .await
    }
}
