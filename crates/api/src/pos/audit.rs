//! Best-effort audit trail.
//!
//! Audit writes never fail the operation that triggered them: errors are
//! logged and dropped.

use boutique_core::audit::redact_sensitive_fields;
use boutique_core::types::DbId;
use boutique_db::repositories::AuditEventRepo;
use sqlx::PgPool;

/// Record an audit event for `store_id` with sensitive payload keys redacted.
pub async fn record(
    pool: &PgPool,
    store_id: DbId,
    event_type: &str,
    payload: serde_json::Value,
    review_session_id: Option<DbId>,
) {
    let payload = redact_sensitive_fields(&payload);
    if let Err(e) =
        AuditEventRepo::create(pool, store_id, event_type, &payload, review_session_id).await
    {
        tracing::error!(
            store_id,
            event_type,
            error = %e,
            "Failed to write audit event",
        );
    }
}
