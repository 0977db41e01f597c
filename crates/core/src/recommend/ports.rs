//! Data-access seams consumed by the recommendation engine.
//!
//! Every catalog query that says "available" must only return products with
//! `available == true`. Unless noted otherwise, results come back in catalog
//! order (ascending product id).

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::identity::{Identity, UserId};
use crate::domain::interaction::{PopularityMeasure, ViewRecord};
use crate::domain::product::{CategoryId, Product, ProductId};
use crate::errors::StoreError;

#[async_trait]
pub trait CatalogProvider: Send + Sync {
    async fn product(&self, id: ProductId) -> Result<Option<Product>, StoreError>;

    /// Products (available or not) for the given ids. Unknown ids are skipped.
    async fn products_by_ids(&self, ids: &[ProductId]) -> Result<Vec<Product>, StoreError>;

    /// Available products for the given ids. Unknown or unavailable ids are
    /// skipped.
    async fn available_products_by_ids(
        &self,
        ids: &[ProductId],
    ) -> Result<Vec<Product>, StoreError>;

    /// Distinct categories of the given products, first occurrence first.
    async fn categories_of(&self, ids: &[ProductId]) -> Result<Vec<CategoryId>, StoreError>;

    async fn available_in_categories(
        &self,
        categories: &[CategoryId],
        exclude: &HashSet<ProductId>,
        limit: usize,
    ) -> Result<Vec<Product>, StoreError>;

    /// Available products ordered by creation time, newest first.
    async fn newest_available(
        &self,
        exclude: &HashSet<ProductId>,
        limit: usize,
    ) -> Result<Vec<Product>, StoreError>;
}

#[async_trait]
pub trait InteractionStore: Send + Sync {
    /// Creates the view record with a count of one or bumps the existing
    /// record's count and timestamp. Must be atomic per (identity, product).
    /// Anonymous identities are not tracked.
    async fn record_view(
        &self,
        identity: &Identity,
        product_id: ProductId,
        viewed_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    async fn view_record(
        &self,
        identity: &Identity,
        product_id: ProductId,
    ) -> Result<Option<ViewRecord>, StoreError>;

    /// Most recent views first, then most viewed.
    async fn recent_views(
        &self,
        identity: &Identity,
        limit: usize,
    ) -> Result<Vec<ViewRecord>, StoreError>;

    /// Ids of available products ranked by `measure` descending, ties by
    /// ascending product id.
    async fn popular_product_ids(
        &self,
        measure: PopularityMeasure,
        exclude: &HashSet<ProductId>,
        limit: usize,
    ) -> Result<Vec<ProductId>, StoreError>;
}

#[async_trait]
pub trait WishlistProvider: Send + Sync {
    async fn wishlist_product_ids(&self, user_id: UserId) -> Result<Vec<ProductId>, StoreError>;
}

#[async_trait]
pub trait PurchaseHistoryProvider: Send + Sync {
    /// One entry per purchased order line; repeat purchases repeat the id.
    async fn purchased_product_ids(&self, user_id: UserId)
        -> Result<Vec<ProductId>, StoreError>;
}
