//! Tiered candidate scoring.
//!
//! Three tiers feed one shared score table:
//!
//! | tier               | source categories                | default pool | default weight |
//! |--------------------|----------------------------------|--------------|----------------|
//! | category affinity  | favourite categories             | 30           | 10             |
//! | wishlist adjacency | categories of wishlisted items   | 20           | 15             |
//! | purchase adjacency | categories of purchased items    | 20           | 20             |
//!
//! Adjacency tiers skip the items they are derived from and add their weight
//! even when an earlier tier already scored the product.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::debug;

use super::ports::CatalogProvider;
use super::preferences::Preferences;
use super::settings::{RecommendationSettings, TierSettings};
use crate::domain::product::{Product, ProductId};
use crate::errors::StoreError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScoringTier {
    CategoryAffinity,
    WishlistAdjacency,
    PurchaseAdjacency,
}

impl ScoringTier {
    pub const ALL: [ScoringTier; 3] =
        [Self::CategoryAffinity, Self::WishlistAdjacency, Self::PurchaseAdjacency];

    pub fn name(&self) -> &'static str {
        match self {
            Self::CategoryAffinity => "category_affinity",
            Self::WishlistAdjacency => "wishlist_adjacency",
            Self::PurchaseAdjacency => "purchase_adjacency",
        }
    }

    /// Whether the tier adds to products an earlier tier already scored.
    pub fn accumulates(&self) -> bool {
        !matches!(self, Self::CategoryAffinity)
    }

    fn settings(&self, settings: &RecommendationSettings) -> TierSettings {
        match self {
            Self::CategoryAffinity => settings.category_affinity,
            Self::WishlistAdjacency => settings.wishlist_adjacency,
            Self::PurchaseAdjacency => settings.purchase_adjacency,
        }
    }
}

/// Accumulated scores for one ranking pass.
///
/// `order` records first sightings and breaks score ties; `scores` holds
/// the running totals.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CandidateScores {
    order: Vec<ProductId>,
    scores: HashMap<ProductId, u32>,
}

impl CandidateScores {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `weight` to `product_id`, registering it on first sight.
    pub fn award(&mut self, product_id: ProductId, weight: u32) {
        match self.scores.get_mut(&product_id) {
            Some(score) => *score = score.saturating_add(weight),
            None => {
                self.order.push(product_id);
                self.scores.insert(product_id, weight);
            }
        }
    }

    /// Adds `weight` only if the product has not been scored yet.
    pub fn award_first_seen(&mut self, product_id: ProductId, weight: u32) {
        if !self.scores.contains_key(&product_id) {
            self.award(product_id, weight);
        }
    }

    pub fn score(&self, product_id: ProductId) -> Option<u32> {
        self.scores.get(&product_id).copied()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Product ids sorted by score, highest first; equal scores keep
    /// first-seen order.
    pub fn ranked(&self, limit: usize) -> Vec<ProductId> {
        let mut ranked = self.order.clone();
        ranked.sort_by(|a, b| self.scores[b].cmp(&self.scores[a]));
        ranked.truncate(limit);
        ranked
    }
}

#[derive(Clone)]
pub struct CandidateScorer {
    catalog: Arc<dyn CatalogProvider>,
    settings: RecommendationSettings,
}

impl CandidateScorer {
    pub fn new(catalog: Arc<dyn CatalogProvider>, settings: RecommendationSettings) -> Self {
        Self { catalog, settings }
    }

    pub async fn score(
        &self,
        preferences: &Preferences,
        exclude: &HashSet<ProductId>,
    ) -> Result<CandidateScores, StoreError> {
        let mut scores = CandidateScores::new();

        for tier in ScoringTier::ALL {
            let pool = self.tier_pool(tier, preferences, exclude).await?;
            let TierSettings { weight, .. } = tier.settings(&self.settings);

            for product in &pool {
                if tier.accumulates() {
                    scores.award(product.id, weight);
                } else {
                    scores.award_first_seen(product.id, weight);
                }
            }

            debug!(
                event_name = "recommend.tier_scored",
                tier = tier.name(),
                pool_size = pool.len(),
                candidates = scores.len(),
                "scoring tier applied"
            );
        }

        Ok(scores)
    }

    /// Ranks the scored candidates and loads them, preserving rank order.
    pub async fn ranked_products(
        &self,
        scores: &CandidateScores,
        limit: usize,
    ) -> Result<Vec<Product>, StoreError> {
        let ranked_ids = scores.ranked(limit);
        if ranked_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut products = self.catalog.available_products_by_ids(&ranked_ids).await?;
        let position = ranked_ids
            .iter()
            .enumerate()
            .map(|(index, id)| (*id, index))
            .collect::<HashMap<_, _>>();
        products.sort_by_key(|product| position.get(&product.id).copied().unwrap_or(usize::MAX));
        products.truncate(limit);

        Ok(products)
    }

    async fn tier_pool(
        &self,
        tier: ScoringTier,
        preferences: &Preferences,
        exclude: &HashSet<ProductId>,
    ) -> Result<Vec<Product>, StoreError> {
        let TierSettings { pool, .. } = tier.settings(&self.settings);

        match tier {
            ScoringTier::CategoryAffinity => {
                if preferences.favorite_categories.is_empty() {
                    return Ok(Vec::new());
                }
                self.catalog
                    .available_in_categories(&preferences.favorite_categories, exclude, pool)
                    .await
            }
            ScoringTier::WishlistAdjacency => {
                self.adjacent_pool(&preferences.wishlist_products, exclude, pool).await
            }
            ScoringTier::PurchaseAdjacency => {
                self.adjacent_pool(&preferences.purchased_products, exclude, pool).await
            }
        }
    }

    async fn adjacent_pool(
        &self,
        sources: &[ProductId],
        exclude: &HashSet<ProductId>,
        pool: usize,
    ) -> Result<Vec<Product>, StoreError> {
        if sources.is_empty() {
            return Ok(Vec::new());
        }

        let categories = self.catalog.categories_of(sources).await?;
        if categories.is_empty() {
            return Ok(Vec::new());
        }

        let mut excluded = exclude.clone();
        excluded.extend(sources.iter().copied());

        self.catalog.available_in_categories(&categories, &excluded, pool).await
    }
}

#[cfg(test)]
mod tests {
    use super::{CandidateScores, ScoringTier};
    use crate::domain::product::ProductId;

    #[test]
    fn first_seen_award_ignores_repeat_sightings() {
        let mut scores = CandidateScores::new();
        scores.award_first_seen(ProductId(1), 10);
        scores.award_first_seen(ProductId(1), 10);

        assert_eq!(scores.score(ProductId(1)), Some(10));
        assert_eq!(scores.len(), 1);
    }

    #[test]
    fn cross_tier_awards_accumulate() {
        let mut scores = CandidateScores::new();
        scores.award_first_seen(ProductId(7), 10);
        scores.award(ProductId(7), 15);

        assert_eq!(scores.score(ProductId(7)), Some(25));
        assert_eq!(scores.len(), 1);
    }

    #[test]
    fn accumulated_score_saturates_at_the_ceiling() {
        let mut scores = CandidateScores::new();
        scores.award_first_seen(ProductId(1), u32::MAX);
        scores.award(ProductId(1), u32::MAX);
        scores.award(ProductId(1), 15);

        assert_eq!(scores.score(ProductId(1)), Some(u32::MAX));
    }

    #[test]
    fn ranking_orders_by_score_then_first_sighting() {
        let mut scores = CandidateScores::new();
        scores.award_first_seen(ProductId(3), 10);
        scores.award_first_seen(ProductId(1), 10);
        scores.award(ProductId(2), 20);
        scores.award(ProductId(1), 15);
        scores.award(ProductId(4), 20);

        assert_eq!(
            scores.ranked(10),
            vec![ProductId(1), ProductId(2), ProductId(4), ProductId(3)]
        );
        assert_eq!(scores.ranked(2), vec![ProductId(1), ProductId(2)]);
        assert!(scores.ranked(0).is_empty());
    }

    #[test]
    fn only_category_affinity_skips_scored_products() {
        assert!(!ScoringTier::CategoryAffinity.accumulates());
        assert!(ScoringTier::WishlistAdjacency.accumulates());
        assert!(ScoringTier::PurchaseAdjacency.accumulates());
    }
}
