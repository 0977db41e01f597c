pub mod config;
pub mod domain;
pub mod errors;
pub mod recommend;

pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
pub use domain::identity::{Identity, SessionKey, UserId};
pub use domain::interaction::{PopularityMeasure, ViewRecord};
pub use domain::product::{Category, CategoryId, Product, ProductId};
pub use errors::{ApplicationError, DomainError, InterfaceError, StoreError};
pub use recommend::{
    InMemoryStorefront, Preferences, Ranking, RankingStrategy, RecommendationEngine,
    RecommendationSettings,
};
