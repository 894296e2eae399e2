//! Repository for the `orders` table.

use boutique_core::types::DbId;
use sqlx::PgPool;

use crate::models::order::{CreateOrder, Order};
use crate::models::review_session::{ReviewSession, STATUS_PENDING};
use crate::repositories::review_session_repo::COLUMNS as SESSION_COLUMNS;

const COLUMNS: &str = "\
    id, store_id, pos_connection_id, provider, external_order_id, total_amount, \
    currency, line_items, raw_payload, created_at, updated_at";

pub struct OrderRepo;

impl OrderRepo {
    pub async fn find_by_external_id(
        pool: &PgPool,
        provider: &str,
        external_order_id: &str,
    ) -> Result<Option<Order>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM orders WHERE provider = $1 AND external_order_id = $2"
        );
        sqlx::query_as::<_, Order>(&query)
            .bind(provider)
            .bind(external_order_id)
            .fetch_optional(pool)
            .await
    }

    /// Insert an order and its pending review session in one transaction.
    ///
    /// Returns `None` without creating a session if an order with the same
    /// `(provider, external_order_id)` already exists.
    pub async fn create_with_pending_session(
        pool: &PgPool,
        input: &CreateOrder,
        session_public_id: &str,
    ) -> Result<Option<(Order, ReviewSession)>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let order_query = format!(
            "INSERT INTO orders \
                (store_id, pos_connection_id, provider, external_order_id, total_amount, \
                 currency, line_items, raw_payload) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT ON CONSTRAINT uq_orders_provider_external_order DO NOTHING \
             RETURNING {COLUMNS}"
        );
        let order = sqlx::query_as::<_, Order>(&order_query)
            .bind(input.store_id)
            .bind(input.pos_connection_id)
            .bind(&input.provider)
            .bind(&input.external_order_id)
            .bind(input.total_amount)
            .bind(&input.currency)
            .bind(&input.line_items)
            .bind(&input.raw_payload)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(order) = order else {
            tx.rollback().await?;
            return Ok(None);
        };

        let session_query = format!(
            "INSERT INTO review_sessions (public_id, store_id, order_id, status) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {SESSION_COLUMNS}"
        );
        let session = sqlx::query_as::<_, ReviewSession>(&session_query)
            .bind(session_public_id)
            .bind(order.store_id)
            .bind(order.id)
            .bind(STATUS_PENDING)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some((order, session)))
    }

    pub async fn list_for_store(pool: &PgPool, store_id: DbId) -> Result<Vec<Order>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM orders WHERE store_id = $1 ORDER BY created_at DESC, id DESC"
        );
        sqlx::query_as::<_, Order>(&query)
            .bind(store_id)
            .fetch_all(pool)
            .await
    }
}
