use crate::domain::interaction::PopularityMeasure;

/// Views considered when deriving preferences.
pub const DEFAULT_HISTORY_WINDOW: usize = 20;
/// Favourite categories kept per identity.
pub const DEFAULT_FAVORITE_CATEGORY_LIMIT: usize = 5;

pub const DEFAULT_CATEGORY_POOL: usize = 30;
pub const DEFAULT_WISHLIST_POOL: usize = 20;
pub const DEFAULT_PURCHASE_POOL: usize = 20;

pub const DEFAULT_CATEGORY_WEIGHT: u32 = 10;
pub const DEFAULT_WISHLIST_WEIGHT: u32 = 15;
pub const DEFAULT_PURCHASE_WEIGHT: u32 = 20;

/// "Recommended for you" listing size.
pub const DEFAULT_HOMEPAGE_LIMIT: usize = 8;
/// "You may also like" listing size on a product page.
pub const DEFAULT_PRODUCT_PAGE_LIMIT: usize = 6;

/// Pool size and weight of one scoring tier.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TierSettings {
    pub pool: usize,
    pub weight: u32,
}

/// Tuning knobs for the recommendation engine. Immutable for the lifetime
/// of an engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecommendationSettings {
    pub history_window: usize,
    pub favorite_category_limit: usize,
    pub category_affinity: TierSettings,
    pub wishlist_adjacency: TierSettings,
    pub purchase_adjacency: TierSettings,
    pub popularity_measure: PopularityMeasure,
    pub homepage_limit: usize,
    pub product_page_limit: usize,
}

impl Default for RecommendationSettings {
    fn default() -> Self {
        Self {
            history_window: DEFAULT_HISTORY_WINDOW,
            favorite_category_limit: DEFAULT_FAVORITE_CATEGORY_LIMIT,
            category_affinity: TierSettings {
                pool: DEFAULT_CATEGORY_POOL,
                weight: DEFAULT_CATEGORY_WEIGHT,
            },
            wishlist_adjacency: TierSettings {
                pool: DEFAULT_WISHLIST_POOL,
                weight: DEFAULT_WISHLIST_WEIGHT,
            },
            purchase_adjacency: TierSettings {
                pool: DEFAULT_PURCHASE_POOL,
                weight: DEFAULT_PURCHASE_WEIGHT,
            },
            popularity_measure: PopularityMeasure::DistinctViewers,
            homepage_limit: DEFAULT_HOMEPAGE_LIMIT,
            product_page_limit: DEFAULT_PRODUCT_PAGE_LIMIT,
        }
    }
}
