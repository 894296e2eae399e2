//! Repository for the `stores` table.

use boutique_core::types::DbId;
use sqlx::PgPool;

use crate::models::store::Store;

const COLUMNS: &str = "id, public_id, name, created_at, updated_at";

pub struct StoreRepo;

impl StoreRepo {
    pub async fn create(pool: &PgPool, public_id: &str, name: &str) -> Result<Store, sqlx::Error> {
        let query = format!(
            "INSERT INTO stores (public_id, name) VALUES ($1, $2) RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Store>(&query)
            .bind(public_id)
            .bind(name)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Store>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM stores WHERE id = $1");
        sqlx::query_as::<_, Store>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Look up a store by the opaque id shown in URLs and QR codes.
    pub async fn find_by_public_id(
        pool: &PgPool,
        public_id: &str,
    ) -> Result<Option<Store>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM stores WHERE public_id = $1");
        sqlx::query_as::<_, Store>(&query)
            .bind(public_id)
            .fetch_optional(pool)
            .await
    }
}
