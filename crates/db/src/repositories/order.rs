use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::Row;
use tracing::info;

use storefront_core::domain::identity::UserId;
use storefront_core::domain::product::ProductId;
use storefront_core::errors::StoreError;
use storefront_core::recommend::PurchaseHistoryProvider;

use super::{format_timestamp, RepositoryError};
use crate::DbPool;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub unit_price: Decimal,
    pub quantity: u32,
}

/// Orders are written once at checkout; the engine only reads the product
/// ids they contain.
pub struct SqlOrderRepository {
    pool: DbPool,
}

impl SqlOrderRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn record_order(
        &self,
        user_id: UserId,
        lines: &[OrderLine],
        created_at: DateTime<Utc>,
    ) -> Result<i64, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let order_id = sqlx::query("INSERT INTO customer_order (user_id, created_at) VALUES (?, ?)")
            .bind(user_id.0)
            .bind(format_timestamp(created_at))
            .execute(&mut *tx)
            .await?
            .last_insert_rowid();

        for line in lines {
            sqlx::query(
                "INSERT INTO order_item (order_id, product_id, unit_price, quantity)
                 VALUES (?, ?, ?, ?)",
            )
            .bind(order_id)
            .bind(line.product_id.0)
            .bind(line.unit_price.to_string())
            .bind(i64::from(line.quantity.max(1)))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        info!(
            event_name = "db.order.recorded",
            order_id,
            user_id = user_id.0,
            lines = lines.len(),
            "order recorded"
        );
        Ok(order_id)
    }

    async fn product_ids_for(&self, user_id: UserId) -> Result<Vec<ProductId>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT oi.product_id
             FROM order_item oi
             JOIN customer_order o ON o.id = oi.order_id
             WHERE o.user_id = ?
             ORDER BY o.created_at ASC, oi.id ASC",
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
impl PurchaseHistoryProvider for SqlOrderRepository {
    async fn purchased_product_ids(
        &self,
        user_id: UserId,
    ) -> Result<Vec<ProductId>, StoreError> {
        Ok(self.product_ids_for(user_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use rust_decimal::Decimal;
    use storefront_core::domain::identity::UserId;
    use storefront_core::domain::product::ProductId;
    use storefront_core::recommend::PurchaseHistoryProvider;

    use super::{OrderLine, SqlOrderRepository};
    use crate::repositories::test_support::{insert_user, launch, product, seed_catalog, setup_pool};

    fn line(product_id: i64) -> OrderLine {
        OrderLine {
            product_id: ProductId(product_id),
            unit_price: Decimal::new(1_500, 2),
            quantity: 1,
        }
    }

    #[tokio::test]
    async fn purchases_list_every_ordered_product_in_order() {
        let pool = setup_pool().await;
        seed_catalog(&pool, &(1..=3).map(|id| product(id, 1, true)).collect::<Vec<_>>()).await;
        insert_user(&pool, 1).await;
        insert_user(&pool, 2).await;
        let repo = SqlOrderRepository::new(pool);

        repo.record_order(UserId(1), &[line(2), line(1)], launch()).await.expect("first order");
        repo.record_order(UserId(1), &[line(2)], launch() + Duration::days(1))
            .await
            .expect("second order");
        repo.record_order(UserId(2), &[line(3)], launch()).await.expect("other order");

        let purchased = repo.purchased_product_ids(UserId(1)).await.expect("purchases");

        assert_eq!(purchased, vec![ProductId(2), ProductId(1), ProductId(2)]);
    }

    #[tokio::test]
    async fn unknown_product_rolls_back_the_order() {
        let pool = setup_pool().await;
        seed_catalog(&pool, &[product(1, 1, true)]).await;
        insert_user(&pool, 1).await;
        let repo = SqlOrderRepository::new(pool.clone());

        let result = repo.record_order(UserId(1), &[line(1), line(99)], launch()).await;

        assert!(result.is_err());
        let orders: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM customer_order")
            .fetch_one(&pool)
            .await
            .expect("count orders");
        assert_eq!(orders, 0);
    }
}
