use std::collections::{HashMap, HashSet};
use std::str::FromStr;

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{sqlite::SqliteRow, QueryBuilder, Row, Sqlite};

use storefront_core::domain::product::{Category, CategoryId, Product, ProductId};
use storefront_core::errors::StoreError;
use storefront_core::recommend::CatalogProvider;

use super::{format_timestamp, parse_timestamp, push_id_list, sql_limit, RepositoryError};
use crate::DbPool;

const PRODUCT_COLUMNS: &str =
    "SELECT id, category_id, name, slug, price, available, created_at FROM product";

pub struct SqlCatalogRepository {
    pool: DbPool,
}

impl SqlCatalogRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn save_category(&self, category: &Category) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO category (id, name, slug) VALUES (?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                slug = excluded.slug",
        )
        .bind(category.id.0)
        .bind(&category.name)
        .bind(&category.slug)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn save_product(&self, product: &Product) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO product (id, category_id, name, slug, price, available, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                category_id = excluded.category_id,
                name = excluded.name,
                slug = excluded.slug,
                price = excluded.price,
                available = excluded.available",
        )
        .bind(product.id.0)
        .bind(product.category_id.0)
        .bind(&product.name)
        .bind(&product.slug)
        .bind(product.price.to_string())
        .bind(product.available)
        .bind(format_timestamp(product.created_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn find_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query(&format!("{PRODUCT_COLUMNS} WHERE id = ?"))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.map(product_from_row).transpose()
    }

    async fn fetch_by_ids(
        &self,
        ids: &[ProductId],
        available_only: bool,
    ) -> Result<Vec<Product>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder = QueryBuilder::<Sqlite>::new(PRODUCT_COLUMNS);
        builder.push(" WHERE id IN ");
        push_id_list(&mut builder, ids.iter().map(|id| id.0));
        if available_only {
            builder.push(" AND available = 1");
        }
        builder.push(" ORDER BY id ASC");

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.into_iter().map(product_from_row).collect()
    }
}

#[async_trait]
impl CatalogProvider for SqlCatalogRepository {
    async fn product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        Ok(self.find_product(id).await?)
    }

    async fn products_by_ids(&self, ids: &[ProductId]) -> Result<Vec<Product>, StoreError> {
        Ok(self.fetch_by_ids(ids, false).await?)
    }

    async fn available_products_by_ids(
        &self,
        ids: &[ProductId],
    ) -> Result<Vec<Product>, StoreError> {
        Ok(self.fetch_by_ids(ids, true).await?)
    }

    async fn categories_of(&self, ids: &[ProductId]) -> Result<Vec<CategoryId>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder = QueryBuilder::<Sqlite>::new("SELECT id, category_id FROM product");
        builder.push(" WHERE id IN ");
        push_id_list(&mut builder, ids.iter().map(|id| id.0));

        let category_of = builder
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(RepositoryError::from)?
            .into_iter()
            .map(|row| -> Result<(ProductId, CategoryId), RepositoryError> {
                Ok((ProductId(row.try_get("id")?), CategoryId(row.try_get("category_id")?)))
            })
            .collect::<Result<HashMap<_, _>, RepositoryError>>()?;

        let mut categories = Vec::new();
        for id in ids {
            if let Some(category) = category_of.get(id) {
                if !categories.contains(category) {
                    categories.push(*category);
                }
            }
        }
        Ok(categories)
    }

    async fn available_in_categories(
        &self,
        categories: &[CategoryId],
        exclude: &HashSet<ProductId>,
        limit: usize,
    ) -> Result<Vec<Product>, StoreError> {
        if categories.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let mut builder = QueryBuilder::<Sqlite>::new(PRODUCT_COLUMNS);
        builder.push(" WHERE available = 1 AND category_id IN ");
        push_id_list(&mut builder, categories.iter().map(|category| category.0));
        if !exclude.is_empty() {
            builder.push(" AND id NOT IN ");
            push_id_list(&mut builder, exclude.iter().map(|id| id.0));
        }
        builder.push(" ORDER BY id ASC LIMIT ");
        builder.push_bind(sql_limit(limit));

        let rows = builder.build().fetch_all(&self.pool).await.map_err(RepositoryError::from)?;
        Ok(rows.into_iter().map(product_from_row).collect::<Result<Vec<_>, _>>()?)
    }

    async fn newest_available(
        &self,
        exclude: &HashSet<ProductId>,
        limit: usize,
    ) -> Result<Vec<Product>, StoreError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut builder = QueryBuilder::<Sqlite>::new(PRODUCT_COLUMNS);
        builder.push(" WHERE available = 1");
        if !exclude.is_empty() {
            builder.push(" AND id NOT IN ");
            push_id_list(&mut builder, exclude.iter().map(|id| id.0));
        }
        builder.push(" ORDER BY created_at DESC, id DESC LIMIT ");
        builder.push_bind(sql_limit(limit));

        let rows = builder.build().fetch_all(&self.pool).await.map_err(RepositoryError::from)?;
        Ok(rows.into_iter().map(product_from_row).collect::<Result<Vec<_>, _>>()?)
    }
}

fn product_from_row(row: SqliteRow) -> Result<Product, RepositoryError> {
    let price_raw = row.try_get::<String, _>("price")?;
    let price = Decimal::from_str(&price_raw).map_err(|error| {
        RepositoryError::Decode(format!("invalid price `{price_raw}` ({error})"))
    })?;

    Ok(Product {
        id: ProductId(row.try_get("id")?),
        category_id: CategoryId(row.try_get("category_id")?),
        name: row.try_get("name")?,
        slug: row.try_get("slug")?,
        price,
        available: row.try_get("available")?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use storefront_core::domain::product::{CategoryId, ProductId};
    use storefront_core::recommend::CatalogProvider;

    use crate::repositories::test_support::{product, seed_catalog, setup_pool};

    fn ids(products: &[storefront_core::Product]) -> Vec<i64> {
        products.iter().map(|product| product.id.0).collect()
    }

    #[tokio::test]
    async fn saved_product_round_trips() {
        let pool = setup_pool().await;
        let runner = product(1, 1, true);
        let catalog = seed_catalog(&pool, &[runner.clone()]).await;

        let found = catalog.product(ProductId(1)).await.expect("load product");

        assert_eq!(found, Some(runner));
        assert_eq!(catalog.product(ProductId(99)).await.expect("load missing"), None);
    }

    #[tokio::test]
    async fn available_in_categories_uses_id_order_and_filters() {
        let pool = setup_pool().await;
        let products = vec![
            product(4, 1, true),
            product(2, 1, true),
            product(3, 1, false),
            product(1, 1, true),
            product(5, 2, true),
            product(6, 3, true),
        ];
        let catalog = seed_catalog(&pool, &products).await;

        let found = catalog
            .available_in_categories(
                &[CategoryId(1), CategoryId(2)],
                &HashSet::from([ProductId(2)]),
                10,
            )
            .await
            .expect("query categories");
        let limited = catalog
            .available_in_categories(&[CategoryId(1)], &HashSet::new(), 2)
            .await
            .expect("query limited");

        assert_eq!(ids(&found), vec![1, 4, 5]);
        assert_eq!(ids(&limited), vec![1, 2]);
    }

    #[tokio::test]
    async fn newest_available_orders_by_creation_time() {
        let pool = setup_pool().await;
        let products = (1..=5).map(|id| product(id, 1, id != 4)).collect::<Vec<_>>();
        let catalog = seed_catalog(&pool, &products).await;

        let newest = catalog
            .newest_available(&HashSet::from([ProductId(5)]), 3)
            .await
            .expect("query newest");

        assert_eq!(ids(&newest), vec![3, 2, 1]);
    }

    #[tokio::test]
    async fn categories_of_keeps_first_occurrence_order() {
        let pool = setup_pool().await;
        let products = vec![product(1, 2, true), product(2, 1, true), product(3, 2, true)];
        let catalog = seed_catalog(&pool, &products).await;

        let categories = catalog
            .categories_of(&[ProductId(3), ProductId(2), ProductId(1), ProductId(42)])
            .await
            .expect("query categories");

        assert_eq!(categories, vec![CategoryId(2), CategoryId(1)]);
    }

    #[tokio::test]
    async fn lookups_by_id_respect_availability() {
        let pool = setup_pool().await;
        let products = vec![product(1, 1, true), product(2, 1, false), product(3, 1, true)];
        let catalog = seed_catalog(&pool, &products).await;
        let wanted = [ProductId(3), ProductId(2), ProductId(1)];

        let all = catalog.products_by_ids(&wanted).await.expect("all by id");
        let available = catalog.available_products_by_ids(&wanted).await.expect("available by id");

        assert_eq!(ids(&all), vec![1, 2, 3]);
        assert_eq!(ids(&available), vec![1, 3]);
        assert!(catalog.products_by_ids(&[]).await.expect("empty lookup").is_empty());
    }
}
