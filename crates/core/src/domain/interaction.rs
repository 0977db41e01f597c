use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::identity::Identity;
use crate::domain::product::ProductId;

/// Aggregated views of one product by one identity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewRecord {
    pub identity: Identity,
    pub product_id: ProductId,
    pub view_count: u32,
    pub last_viewed_at: DateTime<Utc>,
}

/// How the most-viewed fallback counts popularity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PopularityMeasure {
    /// Number of identities that viewed the product (one row each).
    #[default]
    DistinctViewers,
    /// Sum of every identity's view count.
    TotalViews,
}

impl PopularityMeasure {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DistinctViewers => "distinct_viewers",
            Self::TotalViews => "total_views",
        }
    }
}
