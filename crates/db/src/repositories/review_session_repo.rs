//! Repository for the `review_sessions` table.

use boutique_core::types::DbId;
use sqlx::PgPool;

use crate::models::review_session::ReviewSession;

pub(crate) const COLUMNS: &str =
    "id, public_id, store_id, order_id, status, created_at, updated_at";

pub struct ReviewSessionRepo;

impl ReviewSessionRepo {
    pub async fn find_by_order_id(
        pool: &PgPool,
        order_id: DbId,
    ) -> Result<Vec<ReviewSession>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM review_sessions WHERE order_id = $1 ORDER BY id ASC"
        );
        sqlx::query_as::<_, ReviewSession>(&query)
            .bind(order_id)
            .fetch_all(pool)
            .await
    }

    /// Sessions for a store in the given status, oldest first.
    pub async fn list_for_store_by_status(
        pool: &PgPool,
        store_id: DbId,
        status: &str,
    ) -> Result<Vec<ReviewSession>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM review_sessions \
             WHERE store_id = $1 AND status = $2 \
             ORDER BY created_at ASC, id ASC"
        );
        sqlx::query_as::<_, ReviewSession>(&query)
            .bind(store_id)
            .bind(status)
            .fetch_all(pool)
            .await
    }
}
