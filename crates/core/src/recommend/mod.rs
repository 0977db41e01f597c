//! Recommendation Engine
//!
//! Deterministic, rule-based product ranking over implicit feedback: product
//! views, wishlist membership and purchase history. Personalization scores
//! candidates by category co-occurrence; identities without usable signals
//! fall back to the most viewed and then the newest products.

mod engine;
mod fallback;
mod memory;
pub mod ports;
mod preferences;
mod scoring;
mod settings;

pub use engine::{
    Ranking, RankingStrategy, RecommendationEngine, StrategyOutcome, FALLBACK_CHAIN,
};
pub use fallback::PopularityFallback;
pub use memory::InMemoryStorefront;
pub use ports::{CatalogProvider, InteractionStore, PurchaseHistoryProvider, WishlistProvider};
pub use preferences::{rank_favorite_categories, PreferenceAggregator, Preferences};
pub use scoring::{CandidateScorer, CandidateScores, ScoringTier};
pub use settings::*;
