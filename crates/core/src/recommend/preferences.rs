//! Preference aggregation from views, wishlist and purchase history.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::ports::{CatalogProvider, InteractionStore, PurchaseHistoryProvider, WishlistProvider};
use crate::domain::identity::Identity;
use crate::domain::product::{CategoryId, ProductId};
use crate::errors::StoreError;

/// Signals derived for one identity. Computed per call, never stored.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    pub viewed_products: Vec<ProductId>,
    pub wishlist_products: Vec<ProductId>,
    pub purchased_products: Vec<ProductId>,
    pub favorite_categories: Vec<CategoryId>,
}

impl Preferences {
    pub fn is_empty(&self) -> bool {
        self.viewed_products.is_empty()
            && self.wishlist_products.is_empty()
            && self.purchased_products.is_empty()
    }

    /// Viewed, wishlisted and purchased ids in that order, repeats kept.
    pub fn signal_products(&self) -> impl Iterator<Item = ProductId> + '_ {
        self.viewed_products
            .iter()
            .chain(self.wishlist_products.iter())
            .chain(self.purchased_products.iter())
            .copied()
    }
}

#[derive(Clone)]
pub struct PreferenceAggregator {
    catalog: Arc<dyn CatalogProvider>,
    interactions: Arc<dyn InteractionStore>,
    wishlist: Arc<dyn WishlistProvider>,
    purchases: Arc<dyn PurchaseHistoryProvider>,
    history_window: usize,
    favorite_category_limit: usize,
}

impl PreferenceAggregator {
    pub fn new(
        catalog: Arc<dyn CatalogProvider>,
        interactions: Arc<dyn InteractionStore>,
        wishlist: Arc<dyn WishlistProvider>,
        purchases: Arc<dyn PurchaseHistoryProvider>,
        history_window: usize,
        favorite_category_limit: usize,
    ) -> Self {
        Self {
            catalog,
            interactions,
            wishlist,
            purchases,
            history_window,
            favorite_category_limit,
        }
    }

    pub async fn preferences_for(&self, identity: &Identity) -> Result<Preferences, StoreError> {
        if identity.is_anonymous() {
            return Ok(Preferences::default());
        }

        let viewed_products = self
            .interactions
            .recent_views(identity, self.history_window)
            .await?
            .into_iter()
            .map(|record| record.product_id)
            .collect::<Vec<_>>();

        // Wishlists and orders belong to accounts; guests have neither.
        let (wishlist_products, purchased_products) = match identity.user_id() {
            Some(user_id) => (
                self.wishlist.wishlist_product_ids(user_id).await?,
                self.purchases.purchased_product_ids(user_id).await?,
            ),
            None => (Vec::new(), Vec::new()),
        };

        let mut preferences = Preferences {
            viewed_products,
            wishlist_products,
            purchased_products,
            favorite_categories: Vec::new(),
        };

        if !preferences.is_empty() {
            let mut distinct = preferences.signal_products().collect::<Vec<_>>();
            distinct.sort_unstable();
            distinct.dedup();

            let category_of = self
                .catalog
                .products_by_ids(&distinct)
                .await?
                .into_iter()
                .map(|product| (product.id, product.category_id))
                .collect::<HashMap<_, _>>();

            preferences.favorite_categories = rank_favorite_categories(
                preferences.signal_products(),
                &category_of,
                self.favorite_category_limit,
            );
        }

        Ok(preferences)
    }
}

/// Counts one hit per signal occurrence and keeps the `limit` most frequent
/// categories. Equal counts keep the order in which categories first appear.
/// Products missing from `category_of` are ignored.
pub fn rank_favorite_categories(
    signals: impl IntoIterator<Item = ProductId>,
    category_of: &HashMap<ProductId, CategoryId>,
    limit: usize,
) -> Vec<CategoryId> {
    let mut first_seen: Vec<CategoryId> = Vec::new();
    let mut counts: HashMap<CategoryId, usize> = HashMap::new();

    for product_id in signals {
        let Some(category_id) = category_of.get(&product_id).copied() else {
            continue;
        };
        let count = counts.entry(category_id).or_insert(0);
        if *count == 0 {
            first_seen.push(category_id);
        }
        *count += 1;
    }

    // Stable sort keeps first-seen order among equal counts.
    first_seen.sort_by(|a, b| counts[b].cmp(&counts[a]));
    first_seen.truncate(limit);
    first_seen
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::rank_favorite_categories;
    use crate::domain::product::{CategoryId, ProductId};

    fn catalog(pairs: &[(i64, i64)]) -> HashMap<ProductId, CategoryId> {
        pairs
            .iter()
            .map(|(product, category)| (ProductId(*product), CategoryId(*category)))
            .collect()
    }

    #[test]
    fn most_frequent_category_ranks_first() {
        let category_of = catalog(&[(1, 100), (2, 100), (3, 100), (4, 200)]);
        let signals = [4, 1, 2, 3].map(ProductId);

        let ranked = rank_favorite_categories(signals, &category_of, 5);

        assert_eq!(ranked, vec![CategoryId(100), CategoryId(200)]);
    }

    #[test]
    fn ties_keep_first_encountered_order() {
        let category_of = catalog(&[(1, 300), (2, 100), (3, 200)]);
        let signals = [3, 1, 2].map(ProductId);

        let ranked = rank_favorite_categories(signals, &category_of, 5);

        assert_eq!(ranked, vec![CategoryId(200), CategoryId(300), CategoryId(100)]);
    }

    #[test]
    fn repeated_signals_count_every_occurrence() {
        let category_of = catalog(&[(1, 100), (2, 200), (3, 200)]);
        // Product 1 was viewed, wishlisted and purchased.
        let signals = [2, 3, 1, 1, 1].map(ProductId);

        let ranked = rank_favorite_categories(signals, &category_of, 5);

        assert_eq!(ranked, vec![CategoryId(100), CategoryId(200)]);
    }

    #[test]
    fn ranking_is_truncated_and_skips_unknown_products() {
        let category_of = catalog(&[(1, 1), (2, 2), (3, 3), (4, 4), (5, 5), (6, 6)]);
        let signals = [1, 2, 3, 4, 5, 6, 99].map(ProductId);

        let ranked = rank_favorite_categories(signals, &category_of, 5);

        assert_eq!(ranked.len(), 5);
        assert!(!ranked.contains(&CategoryId(6)));
    }
}
