use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, QueryBuilder, Row, Sqlite};
use tracing::debug;

use storefront_core::domain::identity::Identity;
use storefront_core::domain::interaction::{PopularityMeasure, ViewRecord};
use storefront_core::domain::product::ProductId;
use storefront_core::errors::StoreError;
use storefront_core::recommend::InteractionStore;

use super::{format_timestamp, parse_timestamp, parse_u32, push_id_list, sql_limit, RepositoryError};
use crate::DbPool;

pub struct SqlInteractionRepository {
    pool: DbPool,
}

impl SqlInteractionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InteractionStore for SqlInteractionRepository {
    async fn record_view(
        &self,
        identity: &Identity,
        product_id: ProductId,
        viewed_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let Some((kind, key)) = identity.storage_key() else {
            return Ok(());
        };

        sqlx::query(
            "INSERT INTO product_view (
                identity_kind,
                identity_key,
                product_id,
                view_count,
                last_viewed_at
             ) VALUES (?, ?, ?, 1, ?)
             ON CONFLICT(identity_kind, identity_key, product_id) DO UPDATE SET
                view_count = product_view.view_count + 1,
                last_viewed_at = excluded.last_viewed_at",
        )
        .bind(kind)
        .bind(&key)
        .bind(product_id.0)
        .bind(format_timestamp(viewed_at))
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        debug!(
            event_name = "db.product_view.upserted",
            identity_kind = kind,
            product_id = product_id.0,
            "product view upserted"
        );
        Ok(())
    }

    async fn view_record(
        &self,
        identity: &Identity,
        product_id: ProductId,
    ) -> Result<Option<ViewRecord>, StoreError> {
        let Some((kind, key)) = identity.storage_key() else {
            return Ok(None);
        };

        let row = sqlx::query(
            "SELECT product_id, view_count, last_viewed_at
             FROM product_view
             WHERE identity_kind = ? AND identity_key = ? AND product_id = ?",
        )
        .bind(kind)
        .bind(&key)
        .bind(product_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(row.map(|row| view_from_row(identity, row)).transpose()?)
    }

    async fn recent_views(
        &self,
        identity: &Identity,
        limit: usize,
    ) -> Result<Vec<ViewRecord>, StoreError> {
        let Some((kind, key)) = identity.storage_key() else {
            return Ok(Vec::new());
        };

        let rows = sqlx::query(
            "SELECT product_id, view_count, last_viewed_at
             FROM product_view
             WHERE identity_kind = ? AND identity_key = ?
             ORDER BY last_viewed_at DESC, view_count DESC, id DESC
             LIMIT ?",
        )
        .bind(kind)
        .bind(&key)
        .bind(sql_limit(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(rows.into_iter().map(|row| view_from_row(identity, row)).collect::<Result<Vec<_>, _>>()?)
    }

    async fn popular_product_ids(
        &self,
        measure: PopularityMeasure,
        exclude: &HashSet<ProductId>,
        limit: usize,
    ) -> Result<Vec<ProductId>, StoreError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let popularity = match measure {
            PopularityMeasure::DistinctViewers => "COUNT(*)",
            PopularityMeasure::TotalViews => "SUM(pv.view_count)",
        };

        let mut builder = QueryBuilder::<Sqlite>::new(format!(
            "SELECT pv.product_id, {popularity} AS popularity
             FROM product_view pv
             JOIN product p ON p.id = pv.product_id
             WHERE p.available = 1"
        ));
        if !exclude.is_empty() {
            builder.push(" AND pv.product_id NOT IN ");
            push_id_list(&mut builder, exclude.iter().map(|id| id.0));
        }
        builder.push(" GROUP BY pv.product_id ORDER BY popularity DESC, pv.product_id ASC LIMIT ");
        builder.push_bind(sql_limit(limit));

        let rows = builder.build().fetch_all(&self.pool).await.map_err(RepositoryError::from)?;
        Ok(rows
            .into_iter()
            .map(|row| row.try_get::<i64, _>("product_id").map(ProductId))
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(RepositoryError::from)?)
    }
}

fn view_from_row(identity: &Identity, row: SqliteRow) -> Result<ViewRecord, RepositoryError> {
    Ok(ViewRecord {
        identity: identity.clone(),
        product_id: ProductId(row.try_get("product_id")?),
        view_count: parse_u32("view_count", row.try_get("view_count")?)?,
        last_viewed_at: parse_timestamp("last_viewed_at", row.try_get("last_viewed_at")?)?,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use chrono::Duration;
    use storefront_core::domain::identity::{Identity, SessionKey, UserId};
    use storefront_core::domain::interaction::PopularityMeasure;
    use storefront_core::domain::product::ProductId;
    use storefront_core::errors::StoreError;
    use storefront_core::recommend::InteractionStore;
    use tempfile::TempDir;

    use super::SqlInteractionRepository;
    use crate::repositories::test_support::{launch, product, seed_catalog, setup_pool};
    use crate::{connect_with_settings, migrations};

    fn session(key: &str) -> Identity {
        Identity::Session(SessionKey(key.to_string()))
    }

    #[tokio::test]
    async fn repeated_views_upsert_one_row() {
        let pool = setup_pool().await;
        seed_catalog(&pool, &[product(1, 1, true)]).await;
        let repo = SqlInteractionRepository::new(pool.clone());
        let shopper = session("sess-upsert");

        repo.record_view(&shopper, ProductId(1), launch()).await.expect("first view");
        repo.record_view(&shopper, ProductId(1), launch() + Duration::seconds(30))
            .await
            .expect("second view");

        let record =
            repo.view_record(&shopper, ProductId(1)).await.expect("load view").expect("record");
        let rows: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM product_view")
            .fetch_one(&pool)
            .await
            .expect("count rows");

        assert_eq!(rows, 1);
        assert_eq!(record.view_count, 2);
        assert_eq!(record.last_viewed_at, launch() + Duration::seconds(30));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_views_from_one_identity_collapse_into_one_row() {
        let dir = TempDir::new().expect("temp dir");
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("views.db").display());
        let pool = connect_with_settings(&url, 8, 30).await.expect("connect file pool");
        migrations::run_pending(&pool).await.expect("run migrations");
        seed_catalog(&pool, &[product(1, 1, true)]).await;
        let repo = Arc::new(SqlInteractionRepository::new(pool.clone()));

        let handles = (0..50)
            .map(|offset| {
                let repo = Arc::clone(&repo);
                tokio::spawn(async move {
                    repo.record_view(
                        &session("sess-burst"),
                        ProductId(1),
                        launch() + Duration::seconds(offset),
                    )
                    .await
                })
            })
            .collect::<Vec<_>>();
        for handle in handles {
            handle.await.expect("join view task").expect("record view");
        }

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM product_view")
            .fetch_one(&pool)
            .await
            .expect("count rows");
        let record = repo
            .view_record(&session("sess-burst"), ProductId(1))
            .await
            .expect("load view")
            .expect("record");

        assert_eq!(rows, 1);
        assert_eq!(record.view_count, 50);
    }

    #[tokio::test]
    async fn view_of_missing_product_is_rejected_as_constraint() {
        let pool = setup_pool().await;
        let repo = SqlInteractionRepository::new(pool.clone());

        let result = repo.record_view(&session("s"), ProductId(999), launch()).await;

        assert!(
            matches!(
                result,
                Err(StoreError::Constraint(ref message)) if message.contains("FOREIGN KEY")
            ),
            "unexpected result: {result:?}"
        );
        let rows: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM product_view")
            .fetch_one(&pool)
            .await
            .expect("count rows");
        assert_eq!(rows, 0);
    }

    #[tokio::test]
    async fn user_and_session_with_same_key_stay_apart() {
        let pool = setup_pool().await;
        seed_catalog(&pool, &[product(1, 1, true), product(2, 1, true)]).await;
        let repo = SqlInteractionRepository::new(pool);
        let member = Identity::User(UserId(7));
        let guest = session("7");

        repo.record_view(&member, ProductId(1), launch()).await.expect("member view");
        repo.record_view(&guest, ProductId(2), launch()).await.expect("guest view");

        let member_views = repo.recent_views(&member, 20).await.expect("member views");
        let guest_views = repo.recent_views(&guest, 20).await.expect("guest views");

        assert_eq!(member_views.len(), 1);
        assert_eq!(member_views[0].product_id, ProductId(1));
        assert_eq!(guest_views.len(), 1);
        assert_eq!(guest_views[0].product_id, ProductId(2));
    }

    #[tokio::test]
    async fn anonymous_views_are_dropped() {
        let pool = setup_pool().await;
        seed_catalog(&pool, &[product(1, 1, true)]).await;
        let repo = SqlInteractionRepository::new(pool.clone());

        repo.record_view(&Identity::Anonymous, ProductId(1), launch()).await.expect("record");

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM product_view")
            .fetch_one(&pool)
            .await
            .expect("count rows");
        assert_eq!(rows, 0);
        assert!(repo.recent_views(&Identity::Anonymous, 5).await.expect("views").is_empty());
    }

    #[tokio::test]
    async fn recent_views_order_by_recency_then_count() {
        let pool = setup_pool().await;
        seed_catalog(&pool, &(1..=4).map(|id| product(id, 1, true)).collect::<Vec<_>>()).await;
        let repo = SqlInteractionRepository::new(pool);
        let shopper = session("sess-recent");
        let same_moment = launch() + Duration::minutes(5);

        repo.record_view(&shopper, ProductId(1), launch()).await.expect("view 1");
        repo.record_view(&shopper, ProductId(2), same_moment).await.expect("view 2");
        repo.record_view(&shopper, ProductId(3), launch()).await.expect("view 3");
        repo.record_view(&shopper, ProductId(3), same_moment).await.expect("view 3 again");
        repo.record_view(&shopper, ProductId(4), launch() + Duration::minutes(9))
            .await
            .expect("view 4");

        let recent = repo.recent_views(&shopper, 3).await.expect("recent views");

        assert_eq!(
            recent.iter().map(|view| view.product_id).collect::<Vec<_>>(),
            vec![ProductId(4), ProductId(3), ProductId(2)]
        );
    }

    #[tokio::test]
    async fn popularity_ranks_available_products_by_measure() {
        let pool = setup_pool().await;
        seed_catalog(
            &pool,
            &[product(1, 1, true), product(2, 1, true), product(3, 1, false), product(4, 1, true)],
        )
        .await;
        let repo = SqlInteractionRepository::new(pool);

        for _ in 0..3 {
            repo.record_view(&session("fan"), ProductId(4), launch()).await.expect("fan view");
        }
        for key in ["a", "b"] {
            repo.record_view(&session(key), ProductId(2), launch()).await.expect("view 2");
            repo.record_view(&session(key), ProductId(1), launch()).await.expect("view 1");
            repo.record_view(&session(key), ProductId(3), launch()).await.expect("view 3");
        }

        let distinct = repo
            .popular_product_ids(PopularityMeasure::DistinctViewers, &HashSet::new(), 10)
            .await
            .expect("distinct");
        let total = repo
            .popular_product_ids(PopularityMeasure::TotalViews, &HashSet::new(), 10)
            .await
            .expect("total");
        let excluded = repo
            .popular_product_ids(
                PopularityMeasure::DistinctViewers,
                &HashSet::from([ProductId(1)]),
                1,
            )
            .await
            .expect("excluded");

        assert_eq!(distinct, vec![ProductId(1), ProductId(2), ProductId(4)]);
        assert_eq!(total, vec![ProductId(4), ProductId(1), ProductId(2)]);
        assert_eq!(excluded, vec![ProductId(2)]);
    }
}
