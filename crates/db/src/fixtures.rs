use serde::Serialize;
use sqlx::Executor;

use crate::connection::DbPool;
use crate::repositories::{push_id_list, RepositoryError};

const DEMO_CATEGORY_IDS: &[i64] = &[1, 2, 3];
const DEMO_PRODUCT_IDS: &[i64] = &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12];
const DEMO_UNAVAILABLE_PRODUCT_IDS: &[i64] = &[12];
const DEMO_USER_IDS: &[i64] = &[1, 2];
const DEMO_WISHLIST_ENTRY_IDS: &[i64] = &[1, 2, 3];
const DEMO_ORDER_IDS: &[i64] = &[1];

/// Demo storefront catalog: three categories, twelve products (one
/// unavailable), two shoppers with wishlists and one completed order.
///
/// Loading is idempotent, so the dataset can be applied to a database that
/// already holds it.
pub struct DemoCatalogSeed;

impl DemoCatalogSeed {
    pub const SQL: &str = include_str!("../../../config/fixtures/demo_catalog.sql");

    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;

        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        Ok(SeedResult {
            categories: DEMO_CATEGORY_IDS.len(),
            products: DEMO_PRODUCT_IDS.len(),
            users: DEMO_USER_IDS.len(),
        })
    }

    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        checks.push(("categories", count_ids(pool, "category", DEMO_CATEGORY_IDS).await?));
        checks.push(("products", count_ids(pool, "product", DEMO_PRODUCT_IDS).await?));
        checks.push(("users", count_ids(pool, "storefront_user", DEMO_USER_IDS).await?));
        checks.push((
            "wishlist-entries",
            count_ids(pool, "wishlist_entry", DEMO_WISHLIST_ENTRY_IDS).await?,
        ));
        checks.push(("orders", count_ids(pool, "customer_order", DEMO_ORDER_IDS).await?));

        let mut unavailable =
            sqlx::QueryBuilder::new("SELECT COUNT(1) FROM product WHERE available = 0 AND id IN ");
        push_id_list(&mut unavailable, DEMO_UNAVAILABLE_PRODUCT_IDS.iter().copied());
        let unavailable_count: i64 = unavailable.build_query_scalar().fetch_one(pool).await?;
        checks.push((
            "unavailable-products",
            unavailable_count == DEMO_UNAVAILABLE_PRODUCT_IDS.len() as i64,
        ));

        let order_items: i64 =
            sqlx::query_scalar("SELECT COUNT(1) FROM order_item WHERE order_id = 1")
                .fetch_one(pool)
                .await?;
        checks.push(("order-items", order_items > 0));

        let all_present = checks.iter().all(|(_, ok)| *ok);
        Ok(VerificationResult { all_present, checks })
    }

    /// Removes the demo rows and every view recorded against demo products.
    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        let mut tx = pool.begin().await?;

        for (table, column, ids) in [
            ("product_view", "product_id", DEMO_PRODUCT_IDS),
            ("order_item", "order_id", DEMO_ORDER_IDS),
            ("customer_order", "id", DEMO_ORDER_IDS),
            ("wishlist_entry", "id", DEMO_WISHLIST_ENTRY_IDS),
            ("storefront_user", "id", DEMO_USER_IDS),
            ("product", "id", DEMO_PRODUCT_IDS),
            ("category", "id", DEMO_CATEGORY_IDS),
        ] {
            let mut builder =
                sqlx::QueryBuilder::new(format!("DELETE FROM {table} WHERE {column} IN "));
            push_id_list(&mut builder, ids.iter().copied());
            builder.build().execute(&mut *tx).await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

async fn count_ids(pool: &DbPool, table: &str, ids: &[i64]) -> Result<bool, RepositoryError> {
    let mut builder = sqlx::QueryBuilder::new(format!("SELECT COUNT(1) FROM {table} WHERE id IN "));
    push_id_list(&mut builder, ids.iter().copied());
    let count: i64 = builder.build_query_scalar().fetch_one(pool).await?;
    Ok(count == ids.len() as i64)
}

#[derive(Debug, Serialize)]
pub struct SeedResult {
    pub categories: usize,
    pub products: usize,
    pub users: usize,
}

#[derive(Debug, Serialize)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}
