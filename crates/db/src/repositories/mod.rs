use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{QueryBuilder, Sqlite};
use thiserror::Error;

use storefront_core::errors::StoreError;
use storefront_core::recommend::{RecommendationEngine, RecommendationSettings};

use crate::DbPool;

pub mod interaction;
pub mod order;
pub mod product;
pub mod wishlist;

pub use interaction::SqlInteractionRepository;
pub use order::{OrderLine, SqlOrderRepository};
pub use product::SqlCatalogRepository;
pub use wishlist::SqlWishlistRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for StoreError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::Database(sqlx::Error::Database(source))
                if source.is_foreign_key_violation()
                    || source.is_unique_violation()
                    || source.is_check_violation() =>
            {
                Self::Constraint(source.to_string())
            }
            RepositoryError::Database(source) => Self::Unavailable(source.to_string()),
            RepositoryError::Decode(message) => Self::Decode(message),
        }
    }
}

/// Every SQL repository over one pool.
#[derive(Clone)]
pub struct SqlStorefront {
    pub catalog: Arc<SqlCatalogRepository>,
    pub interactions: Arc<SqlInteractionRepository>,
    pub wishlist: Arc<SqlWishlistRepository>,
    pub orders: Arc<SqlOrderRepository>,
}

impl SqlStorefront {
    pub fn new(pool: DbPool) -> Self {
        Self {
            catalog: Arc::new(SqlCatalogRepository::new(pool.clone())),
            interactions: Arc::new(SqlInteractionRepository::new(pool.clone())),
            wishlist: Arc::new(SqlWishlistRepository::new(pool.clone())),
            orders: Arc::new(SqlOrderRepository::new(pool)),
        }
    }

    pub fn engine(&self, settings: RecommendationSettings) -> RecommendationEngine {
        RecommendationEngine::with_settings(
            self.catalog.clone(),
            self.interactions.clone(),
            self.wishlist.clone(),
            self.orders.clone(),
            settings,
        )
    }
}

/// Microsecond precision with a `Z` suffix keeps stored timestamps
/// lexicographically ordered.
pub(crate) fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(
    column: &str,
    value: String,
) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(&value).map(|timestamp| timestamp.with_timezone(&Utc)).map_err(
        |error| {
            RepositoryError::Decode(format!("invalid timestamp in `{column}`: `{value}` ({error})"))
        },
    )
}

pub(crate) fn parse_u32(column: &str, value: i64) -> Result<u32, RepositoryError> {
    u32::try_from(value).map_err(|_| {
        RepositoryError::Decode(format!(
            "invalid value for `{column}` (expected non-negative u32): {value}"
        ))
    })
}

pub(crate) fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

/// Appends `(?, ?, ...)` binding every value.
pub(crate) fn push_id_list<'args>(
    builder: &mut QueryBuilder<'args, Sqlite>,
    ids: impl IntoIterator<Item = i64>,
) {
    builder.push("(");
    let mut separated = builder.separated(", ");
    for id in ids {
        separated.push_bind(id);
    }
    separated.push_unseparated(")");
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use rust_decimal::Decimal;
    use storefront_core::domain::product::{Category, CategoryId, Product, ProductId};

    use super::SqlCatalogRepository;
    use crate::{connect_with_settings, migrations, DbPool};

    pub async fn setup_pool() -> DbPool {
        let pool =
            connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect test pool");
        migrations::run_pending(&pool).await.expect("run migrations");
        pool
    }

    pub fn launch() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0).single().expect("valid launch timestamp")
    }

    pub fn product(id: i64, category: i64, available: bool) -> Product {
        Product {
            id: ProductId(id),
            category_id: CategoryId(category),
            name: format!("Product {id}"),
            slug: format!("product-{id}"),
            price: Decimal::new(1_000 + id, 2),
            available,
            created_at: launch() + Duration::minutes(id),
        }
    }

    pub async fn seed_catalog(pool: &DbPool, products: &[Product]) -> SqlCatalogRepository {
        let catalog = SqlCatalogRepository::new(pool.clone());
        let mut categories = products.iter().map(|product| product.category_id).collect::<Vec<_>>();
        categories.sort();
        categories.dedup();
        for category in categories {
            catalog
                .save_category(&Category {
                    id: category,
                    name: format!("Category {category}"),
                    slug: format!("category-{category}"),
                })
                .await
                .expect("save category");
        }
        for product in products {
            catalog.save_product(product).await.expect("save product");
        }
        catalog
    }

    pub async fn insert_user(pool: &DbPool, user_id: i64) {
        sqlx::query("INSERT INTO storefront_user (id, username, created_at) VALUES (?, ?, ?)")
            .bind(user_id)
            .bind(format!("user-{user_id}"))
            .bind("2026-01-01T00:00:00.000000Z")
            .execute(pool)
            .await
            .expect("insert user");
    }
}
