//! Recommendation facade used by presentation code.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info};

use super::fallback::PopularityFallback;
use super::ports::{CatalogProvider, InteractionStore, PurchaseHistoryProvider, WishlistProvider};
use super::preferences::{PreferenceAggregator, Preferences};
use super::scoring::CandidateScorer;
use super::settings::RecommendationSettings;
use crate::domain::identity::Identity;
use crate::domain::product::{Product, ProductId};
use crate::errors::StoreError;

/// Ranking strategies, tried in [`FALLBACK_CHAIN`] order until one produces
/// products.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RankingStrategy {
    Personalized,
    MostViewed,
    Newest,
}

pub const FALLBACK_CHAIN: [RankingStrategy; 3] =
    [RankingStrategy::Personalized, RankingStrategy::MostViewed, RankingStrategy::Newest];

impl RankingStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Personalized => "personalized",
            Self::MostViewed => "most_viewed",
            Self::Newest => "newest",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StrategyOutcome {
    Ranked(Vec<Product>),
    NoCandidates,
}

/// Products returned by the fallback chain and the strategy that produced
/// them. `strategy` is `None` when every strategy came up empty.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Ranking {
    pub strategy: Option<RankingStrategy>,
    pub products: Vec<Product>,
}

impl Ranking {
    fn empty() -> Self {
        Self { strategy: None, products: Vec::new() }
    }
}

pub struct RecommendationEngine {
    catalog: Arc<dyn CatalogProvider>,
    interactions: Arc<dyn InteractionStore>,
    aggregator: PreferenceAggregator,
    scorer: CandidateScorer,
    fallback: PopularityFallback,
    settings: RecommendationSettings,
}

impl RecommendationEngine {
    pub fn new(
        catalog: Arc<dyn CatalogProvider>,
        interactions: Arc<dyn InteractionStore>,
        wishlist: Arc<dyn WishlistProvider>,
        purchases: Arc<dyn PurchaseHistoryProvider>,
    ) -> Self {
        Self::with_settings(
            catalog,
            interactions,
            wishlist,
            purchases,
            RecommendationSettings::default(),
        )
    }

    pub fn with_settings(
        catalog: Arc<dyn CatalogProvider>,
        interactions: Arc<dyn InteractionStore>,
        wishlist: Arc<dyn WishlistProvider>,
        purchases: Arc<dyn PurchaseHistoryProvider>,
        settings: RecommendationSettings,
    ) -> Self {
        let aggregator = PreferenceAggregator::new(
            Arc::clone(&catalog),
            Arc::clone(&interactions),
            wishlist,
            purchases,
            settings.history_window,
            settings.favorite_category_limit,
        );
        let scorer = CandidateScorer::new(Arc::clone(&catalog), settings);
        let fallback = PopularityFallback::new(
            Arc::clone(&catalog),
            Arc::clone(&interactions),
            settings.popularity_measure,
        );

        Self { catalog, interactions, aggregator, scorer, fallback, settings }
    }

    /// Builds an engine over a single backend implementing every port.
    pub fn from_store<S>(store: Arc<S>, settings: RecommendationSettings) -> Self
    where
        S: CatalogProvider
            + InteractionStore
            + WishlistProvider
            + PurchaseHistoryProvider
            + 'static,
    {
        Self::with_settings(
            store.clone() as Arc<dyn CatalogProvider>,
            store.clone() as Arc<dyn InteractionStore>,
            store.clone() as Arc<dyn WishlistProvider>,
            store as Arc<dyn PurchaseHistoryProvider>,
            settings,
        )
    }

    pub fn settings(&self) -> &RecommendationSettings {
        &self.settings
    }

    /// Records one product-detail view. Call before requesting "similar"
    /// recommendations for the same page.
    pub async fn record_view(
        &self,
        identity: &Identity,
        product: &Product,
    ) -> Result<(), StoreError> {
        if identity.is_anonymous() {
            debug!(
                event_name = "recommend.view_skipped",
                product_id = product.id.0,
                "anonymous view not tracked"
            );
            return Ok(());
        }

        self.interactions.record_view(identity, product.id, Utc::now()).await?;
        debug!(
            event_name = "recommend.view_recorded",
            product_id = product.id.0,
            "product view recorded"
        );
        Ok(())
    }

    pub async fn preferences(&self, identity: &Identity) -> Result<Preferences, StoreError> {
        self.aggregator.preferences_for(identity).await
    }

    /// "You may also like" for a product page: same-category products first,
    /// topped up from the personalized chain. Never contains `product`.
    pub async fn recommendations_for_product(
        &self,
        identity: &Identity,
        product: &Product,
        limit: usize,
    ) -> Result<Vec<Product>, StoreError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut exclude = HashSet::from([product.id]);
        let mut recommendations =
            self.catalog.available_in_categories(&[product.category_id], &exclude, limit).await?;
        recommendations.retain(|candidate| eligible(candidate, &exclude));
        recommendations.truncate(limit);

        if recommendations.len() < limit {
            exclude.extend(recommendations.iter().map(|candidate| candidate.id));
            let remaining = limit - recommendations.len();
            let more = self.personalized_recommendations(identity, remaining, &exclude).await?;
            recommendations.extend(more);
        }

        recommendations.truncate(limit);
        info!(
            event_name = "recommend.product_page_ranked",
            product_id = product.id.0,
            returned = recommendations.len(),
            limit,
            "similar-product recommendations computed"
        );
        Ok(recommendations)
    }

    pub async fn personalized_recommendations(
        &self,
        identity: &Identity,
        limit: usize,
        exclude: &HashSet<ProductId>,
    ) -> Result<Vec<Product>, StoreError> {
        Ok(self.personalized_ranking(identity, limit, exclude).await?.products)
    }

    /// Runs the fallback chain and reports which strategy answered.
    pub async fn personalized_ranking(
        &self,
        identity: &Identity,
        limit: usize,
        exclude: &HashSet<ProductId>,
    ) -> Result<Ranking, StoreError> {
        if limit == 0 {
            return Ok(Ranking::empty());
        }

        let preferences = self.aggregator.preferences_for(identity).await?;
        debug!(
            event_name = "recommend.preferences_loaded",
            viewed = preferences.viewed_products.len(),
            wishlisted = preferences.wishlist_products.len(),
            purchased = preferences.purchased_products.len(),
            favorite_categories = preferences.favorite_categories.len(),
            "preferences aggregated"
        );

        for strategy in FALLBACK_CHAIN {
            match self.run_strategy(strategy, &preferences, limit, exclude).await? {
                StrategyOutcome::Ranked(products) => {
                    info!(
                        event_name = "recommend.strategy_selected",
                        strategy = strategy.as_str(),
                        returned = products.len(),
                        limit,
                        "personalized recommendations computed"
                    );
                    return Ok(Ranking { strategy: Some(strategy), products });
                }
                StrategyOutcome::NoCandidates => {
                    debug!(
                        event_name = "recommend.strategy_exhausted",
                        strategy = strategy.as_str(),
                        "strategy produced no candidates"
                    );
                }
            }
        }

        Ok(Ranking::empty())
    }

    /// Home page "Recommended for you" with the configured size.
    pub async fn homepage_recommendations(
        &self,
        identity: &Identity,
    ) -> Result<Vec<Product>, StoreError> {
        self.personalized_recommendations(identity, self.settings.homepage_limit, &HashSet::new())
            .await
    }

    /// Product page "You may also like" with the configured size.
    pub async fn product_page_recommendations(
        &self,
        identity: &Identity,
        product: &Product,
    ) -> Result<Vec<Product>, StoreError> {
        self.recommendations_for_product(identity, product, self.settings.product_page_limit).await
    }

    async fn run_strategy(
        &self,
        strategy: RankingStrategy,
        preferences: &Preferences,
        limit: usize,
        exclude: &HashSet<ProductId>,
    ) -> Result<StrategyOutcome, StoreError> {
        let mut products = match strategy {
            RankingStrategy::Personalized => {
                let scores = self.scorer.score(preferences, exclude).await?;
                if scores.is_empty() {
                    return Ok(StrategyOutcome::NoCandidates);
                }
                self.scorer.ranked_products(&scores, limit).await?
            }
            RankingStrategy::MostViewed => self.fallback.most_viewed(limit, exclude).await?,
            RankingStrategy::Newest => self.fallback.newest(limit, exclude).await?,
        };

        products.retain(|product| eligible(product, exclude));
        products.truncate(limit);

        if products.is_empty() {
            Ok(StrategyOutcome::NoCandidates)
        } else {
            Ok(StrategyOutcome::Ranked(products))
        }
    }
}

fn eligible(product: &Product, exclude: &HashSet<ProductId>) -> bool {
    product.is_recommendable() && !exclude.contains(&product.id)
}
