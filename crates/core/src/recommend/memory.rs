use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::ports::{CatalogProvider, InteractionStore, PurchaseHistoryProvider, WishlistProvider};
use crate::domain::identity::{Identity, UserId};
use crate::domain::interaction::{PopularityMeasure, ViewRecord};
use crate::domain::product::{CategoryId, Product, ProductId};
use crate::errors::StoreError;

/// Process-local storefront backing every port. Each call takes the lock
/// once, so view upserts are atomic.
#[derive(Default)]
pub struct InMemoryStorefront {
    state: Mutex<StorefrontState>,
}

#[derive(Default)]
struct StorefrontState {
    products: BTreeMap<ProductId, Product>,
    views: Vec<StoredView>,
    next_view_seq: u64,
    wishlists: HashMap<UserId, Vec<ProductId>>,
    purchases: HashMap<UserId, Vec<ProductId>>,
    unavailable: bool,
}

struct StoredView {
    seq: u64,
    record: ViewRecord,
}

impl InMemoryStorefront {
    pub fn with_products(products: impl IntoIterator<Item = Product>) -> Self {
        let store = Self::default();
        for product in products {
            store.insert_product(product);
        }
        store
    }

    pub fn insert_product(&self, product: Product) {
        self.lock().products.insert(product.id, product);
    }

    pub fn add_to_wishlist(&self, user_id: UserId, product_id: ProductId) {
        let mut state = self.lock();
        let entries = state.wishlists.entry(user_id).or_default();
        if !entries.contains(&product_id) {
            entries.push(product_id);
        }
    }

    pub fn record_purchase(&self, user_id: UserId, product_id: ProductId) {
        self.lock().purchases.entry(user_id).or_default().push(product_id);
    }

    /// Simulates a datastore outage: every port call fails until cleared.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock().unavailable = unavailable;
    }

    pub fn view_row_count(&self) -> usize {
        self.lock().views.len()
    }

    fn lock(&self) -> MutexGuard<'_, StorefrontState> {
        match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn read<T>(&self, f: impl FnOnce(&StorefrontState) -> T) -> Result<T, StoreError> {
        let state = self.lock();
        if state.unavailable {
            return Err(StoreError::Unavailable("in-memory storefront is offline".to_string()));
        }
        Ok(f(&state))
    }

    fn write<T>(&self, f: impl FnOnce(&mut StorefrontState) -> T) -> Result<T, StoreError> {
        let mut state = self.lock();
        if state.unavailable {
            return Err(StoreError::Unavailable("in-memory storefront is offline".to_string()));
        }
        Ok(f(&mut state))
    }
}

impl StorefrontState {
    fn available(&self) -> impl Iterator<Item = &Product> {
        self.products.values().filter(|product| product.available)
    }
}

#[async_trait]
impl CatalogProvider for InMemoryStorefront {
    async fn product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        self.read(|state| state.products.get(&id).cloned())
    }

    async fn products_by_ids(&self, ids: &[ProductId]) -> Result<Vec<Product>, StoreError> {
        let wanted = ids.iter().copied().collect::<HashSet<_>>();
        self.read(|state| {
            state
                .products
                .values()
                .filter(|product| wanted.contains(&product.id))
                .cloned()
                .collect()
        })
    }

    async fn available_products_by_ids(
        &self,
        ids: &[ProductId],
    ) -> Result<Vec<Product>, StoreError> {
        let wanted = ids.iter().copied().collect::<HashSet<_>>();
        self.read(|state| {
            state.available().filter(|product| wanted.contains(&product.id)).cloned().collect()
        })
    }

    async fn categories_of(&self, ids: &[ProductId]) -> Result<Vec<CategoryId>, StoreError> {
        self.read(|state| {
            let mut categories = Vec::new();
            for id in ids {
                if let Some(product) = state.products.get(id) {
                    if !categories.contains(&product.category_id) {
                        categories.push(product.category_id);
                    }
                }
            }
            categories
        })
    }

    async fn available_in_categories(
        &self,
        categories: &[CategoryId],
        exclude: &HashSet<ProductId>,
        limit: usize,
    ) -> Result<Vec<Product>, StoreError> {
        self.read(|state| {
            state
                .available()
                .filter(|product| categories.contains(&product.category_id))
                .filter(|product| !exclude.contains(&product.id))
                .take(limit)
                .cloned()
                .collect()
        })
    }

    async fn newest_available(
        &self,
        exclude: &HashSet<ProductId>,
        limit: usize,
    ) -> Result<Vec<Product>, StoreError> {
        self.read(|state| {
            let mut products = state
                .available()
                .filter(|product| !exclude.contains(&product.id))
                .cloned()
                .collect::<Vec<_>>();
            products.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
            products.truncate(limit);
            products
        })
    }
}

#[async_trait]
impl InteractionStore for InMemoryStorefront {
    async fn record_view(
        &self,
        identity: &Identity,
        product_id: ProductId,
        viewed_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        if identity.is_anonymous() {
            return Ok(());
        }

        self.write(|state| {
            let existing = state.views.iter().position(|view| {
                view.record.identity == *identity && view.record.product_id == product_id
            });
            match existing {
                Some(index) => {
                    let view = &mut state.views[index];
                    view.record.view_count += 1;
                    view.record.last_viewed_at = viewed_at;
                }
                None => {
                    let seq = state.next_view_seq;
                    state.next_view_seq += 1;
                    state.views.push(StoredView {
                        seq,
                        record: ViewRecord {
                            identity: identity.clone(),
                            product_id,
                            view_count: 1,
                            last_viewed_at: viewed_at,
                        },
                    });
                }
            }
        })
    }

    async fn view_record(
        &self,
        identity: &Identity,
        product_id: ProductId,
    ) -> Result<Option<ViewRecord>, StoreError> {
        self.read(|state| {
            state
                .views
                .iter()
                .find(|view| {
                    view.record.identity == *identity && view.record.product_id == product_id
                })
                .map(|view| view.record.clone())
        })
    }

    async fn recent_views(
        &self,
        identity: &Identity,
        limit: usize,
    ) -> Result<Vec<ViewRecord>, StoreError> {
        if identity.is_anonymous() {
            return Ok(Vec::new());
        }

        self.read(|state| {
            let mut views = state
                .views
                .iter()
                .filter(|view| view.record.identity == *identity)
                .collect::<Vec<_>>();
            views.sort_by(|a, b| {
                b.record
                    .last_viewed_at
                    .cmp(&a.record.last_viewed_at)
                    .then(b.record.view_count.cmp(&a.record.view_count))
                    .then(b.seq.cmp(&a.seq))
            });
            views.into_iter().take(limit).map(|view| view.record.clone()).collect()
        })
    }

    async fn popular_product_ids(
        &self,
        measure: PopularityMeasure,
        exclude: &HashSet<ProductId>,
        limit: usize,
    ) -> Result<Vec<ProductId>, StoreError> {
        self.read(|state| {
            let mut totals: BTreeMap<ProductId, u64> = BTreeMap::new();
            for view in &state.views {
                let product_id = view.record.product_id;
                let eligible = state.products.get(&product_id).is_some_and(|p| p.available)
                    && !exclude.contains(&product_id);
                if !eligible {
                    continue;
                }
                let increment = match measure {
                    PopularityMeasure::DistinctViewers => 1,
                    PopularityMeasure::TotalViews => u64::from(view.record.view_count),
                };
                *totals.entry(product_id).or_insert(0) += increment;
            }

            let mut ranked = totals.into_iter().collect::<Vec<_>>();
            // BTreeMap iteration is ascending by id; stable sort keeps that for ties.
            ranked.sort_by(|a, b| b.1.cmp(&a.1));
            ranked.into_iter().take(limit).map(|(product_id, _)| product_id).collect()
        })
    }
}

#[async_trait]
impl WishlistProvider for InMemoryStorefront {
    async fn wishlist_product_ids(&self, user_id: UserId) -> Result<Vec<ProductId>, StoreError> {
        self.read(|state| state.wishlists.get(&user_id).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl PurchaseHistoryProvider for InMemoryStorefront {
    async fn purchased_product_ids(
        &self,
        user_id: UserId,
    ) -> Result<Vec<ProductId>, StoreError> {
        self.read(|state| state.purchases.get(&user_id).cloned().unwrap_or_default())
    }
}
