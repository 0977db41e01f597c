use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::ports::{CatalogProvider, InteractionStore};
use crate::domain::interaction::PopularityMeasure;
use crate::domain::product::{Product, ProductId};
use crate::errors::StoreError;

/// Non-personalized ranking used when an identity yields no candidates.
#[derive(Clone)]
pub struct PopularityFallback {
    catalog: Arc<dyn CatalogProvider>,
    interactions: Arc<dyn InteractionStore>,
    measure: PopularityMeasure,
}

impl PopularityFallback {
    pub fn new(
        catalog: Arc<dyn CatalogProvider>,
        interactions: Arc<dyn InteractionStore>,
        measure: PopularityMeasure,
    ) -> Self {
        Self { catalog, interactions, measure }
    }

    /// Available products with recorded views, most popular first.
    pub async fn most_viewed(
        &self,
        limit: usize,
        exclude: &HashSet<ProductId>,
    ) -> Result<Vec<Product>, StoreError> {
        let ranked_ids =
            self.interactions.popular_product_ids(self.measure, exclude, limit).await?;
        if ranked_ids.is_empty() {
            return Ok(Vec::new());
        }

        let position = ranked_ids
            .iter()
            .enumerate()
            .map(|(index, id)| (*id, index))
            .collect::<HashMap<_, _>>();

        let mut products = self
            .catalog
            .available_products_by_ids(&ranked_ids)
            .await?
            .into_iter()
            .filter(|product| !exclude.contains(&product.id))
            .collect::<Vec<_>>();
        products.sort_by_key(|product| position.get(&product.id).copied().unwrap_or(usize::MAX));
        products.truncate(limit);

        Ok(products)
    }

    /// Newest available products.
    pub async fn newest(
        &self,
        limit: usize,
        exclude: &HashSet<ProductId>,
    ) -> Result<Vec<Product>, StoreError> {
        self.catalog.newest_available(exclude, limit).await
    }
}
