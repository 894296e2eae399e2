//! Repository for the `webhook_events` table.

use boutique_core::types::DbId;
use boutique_core::webhook::WebhookStatus;
use sqlx::PgPool;

use crate::models::webhook_event::{CreateWebhookEvent, WebhookEvent};

const COLUMNS: &str = "\
    id, provider, event_id, event_type, payload, status, pos_connection_id, \
    error_message, attempts, received_at, processed_at";

pub struct WebhookEventRepo;

impl WebhookEventRepo {
    /// Look up an event by its idempotency key.
    pub async fn find_by_provider_event(
        pool: &PgPool,
        provider: &str,
        event_id: &str,
    ) -> Result<Option<WebhookEvent>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM webhook_events WHERE provider = $1 AND event_id = $2"
        );
        sqlx::query_as::<_, WebhookEvent>(&query)
            .bind(provider)
            .bind(event_id)
            .fetch_optional(pool)
            .await
    }

    /// Record an event as `RECEIVED`.
    ///
    /// Returns `None` when another delivery with the same
    /// `(provider, event_id)` already holds the row.
    pub async fn create_received(
        pool: &PgPool,
        input: &CreateWebhookEvent<'_>,
    ) -> Result<Option<WebhookEvent>, sqlx::Error> {
        let query = format!(
            "INSERT INTO webhook_events (provider, event_id, event_type, payload, status) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT ON CONSTRAINT uq_webhook_events_provider_event DO NOTHING \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, WebhookEvent>(&query)
            .bind(input.provider)
            .bind(input.event_id)
            .bind(input.event_type)
            .bind(input.payload)
            .bind(WebhookStatus::Received.as_str())
            .fetch_optional(pool)
            .await
    }

    pub async fn set_connection(
        pool: &PgPool,
        id: DbId,
        pos_connection_id: DbId,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE webhook_events SET pos_connection_id = $2 WHERE id = $1")
            .bind(id)
            .bind(pos_connection_id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Move a `RECEIVED` event to a terminal status.
    ///
    /// Rows already in a terminal status are left untouched; the return value
    /// says whether a transition happened. `processed_at` is stamped only for
    /// `PROCESSED`. Passing no message keeps the error from an earlier
    /// failed attempt.
    pub async fn mark_status(
        pool: &PgPool,
        id: DbId,
        status: WebhookStatus,
        error_message: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE webhook_events SET \
                 status = $2, \
                 error_message = COALESCE($3, error_message), \
                 processed_at = CASE WHEN $2 = 'PROCESSED' THEN NOW() ELSE processed_at END \
             WHERE id = $1 AND status = 'RECEIVED'",
        )
        .bind(id)
        .bind(status.as_str())
        .bind(error_message)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Claim a `FAILED` event for another processing attempt by moving it
    /// back to `RECEIVED`. Only one concurrent caller gets `true`.
    ///
    /// The last error stays on the row and `attempts` is bumped.
    pub async fn reset_failed(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE webhook_events SET status = $2, attempts = attempts + 1 \
             WHERE id = $1 AND status = $3",
        )
        .bind(id)
        .bind(WebhookStatus::Received.as_str())
        .bind(WebhookStatus::Failed.as_str())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn count_for_provider(pool: &PgPool, provider: &str) -> Result<i64, sqlx::Error> {
        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM webhook_events WHERE provider = $1")
                .bind(provider)
                .fetch_one(pool)
                .await?;
        Ok(row.0)
    }
}
