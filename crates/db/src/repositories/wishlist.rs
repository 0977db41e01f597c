use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;

use storefront_core::domain::identity::UserId;
use storefront_core::domain::product::ProductId;
use storefront_core::errors::StoreError;
use storefront_core::recommend::WishlistProvider;

use super::{format_timestamp, RepositoryError};
use crate::DbPool;

pub struct SqlWishlistRepository {
    pool: DbPool,
}

impl SqlWishlistRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Returns `false` when the product was already wishlisted.
    pub async fn add(
        &self,
        user_id: UserId,
        product_id: ProductId,
        added_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO wishlist_entry (user_id, product_id, added_at) VALUES (?, ?, ?)
             ON CONFLICT(user_id, product_id) DO NOTHING",
        )
        .bind(user_id.0)
        .bind(product_id.0)
        .bind(format_timestamp(added_at))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn remove(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM wishlist_entry WHERE user_id = ? AND product_id = ?")
            .bind(user_id.0)
            .bind(product_id.0)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn product_ids_for(&self, user_id: UserId) -> Result<Vec<ProductId>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT product_id FROM wishlist_entry WHERE user_id = ? ORDER BY added_at ASC, id ASC",
        )
        .bind(user_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| -> Result<ProductId, RepositoryError> {
                Ok(ProductId(row.try_get::<i64, _>("product_id")?))
            })
            .collect()
    }
}

#[async_trait]
impl WishlistProvider for SqlWishlistRepository {
    async fn wishlist_product_ids(&self, user_id: UserId) -> Result<Vec<ProductId>, StoreError> {
        Ok(self.product_ids_for(user_id).await?)
    }
}
