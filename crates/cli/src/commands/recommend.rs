use std::collections::HashSet;

use serde_json::json;
use storefront_core::config::{ConfigOverrides, LoadOptions};
use storefront_core::domain::identity::{Identity, SessionKey, UserId};
use storefront_core::domain::interaction::PopularityMeasure;
use storefront_core::domain::product::{Product, ProductId};
use storefront_core::errors::DomainError;
use storefront_core::recommend::{CatalogProvider, RankingStrategy, RecommendationEngine};
use storefront_db::SqlStorefront;

use crate::commands::{
    application_failure, build_runtime, load_config, open_database, product_summary,
    CommandResult, StepFailure,
};

const COMMAND: &str = "recommend";

#[derive(Debug, Clone, Default)]
pub struct RecommendRequest {
    /// Product page seed; home page recommendations when absent.
    pub product: Option<i64>,
    pub limit: Option<usize>,
    pub user: Option<i64>,
    pub session: Option<String>,
    pub popularity: Option<PopularityMeasure>,
}

struct Recommendation {
    strategy: Option<RankingStrategy>,
    products: Vec<Product>,
}

pub fn run(request: RecommendRequest) -> CommandResult {
    let options = LoadOptions {
        overrides: ConfigOverrides {
            popularity_measure: request.popularity,
            ..ConfigOverrides::default()
        },
        ..LoadOptions::default()
    };
    let config = match load_config(COMMAND, options) {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match build_runtime(COMMAND) {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let identity =
        Identity::resolve(request.user.map(UserId), request.session.clone().map(SessionKey));

    let result = runtime.block_on(async {
        let pool = open_database(&config).await?;
        let storefront = SqlStorefront::new(pool.clone());
        let engine = storefront.engine(config.recommendations);

        let outcome = recommend(&storefront, &engine, &identity, &request).await;
        pool.close().await;
        outcome
    });

    match result {
        Ok(recommendation) => {
            let message = match request.product {
                Some(seed) => format!(
                    "{} recommendations for product {seed}",
                    recommendation.products.len()
                ),
                None => format!(
                    "{} personalized recommendations",
                    recommendation.products.len()
                ),
            };
            let data = json!({
                "identity": identity,
                "seed_product_id": request.product,
                "strategy": recommendation.strategy,
                "products": recommendation.products.iter().map(product_summary).collect::<Vec<_>>(),
            });
            CommandResult::success_with_data(COMMAND, message, Some(data))
        }
        Err(failure) => CommandResult::from_step_failure(COMMAND, failure),
    }
}

async fn recommend(
    storefront: &SqlStorefront,
    engine: &RecommendationEngine,
    identity: &Identity,
    request: &RecommendRequest,
) -> Result<Recommendation, StepFailure> {
    let settings = *engine.settings();

    match request.product.map(ProductId) {
        Some(seed_id) => {
            let seed = storefront
                .catalog
                .product(seed_id)
                .await
                .map_err(|error| application_failure(COMMAND, error))?
                .ok_or_else(|| {
                    application_failure(COMMAND, DomainError::ProductNotFound(seed_id))
                })?;
            let limit = request.limit.unwrap_or(settings.product_page_limit);
            let products = engine
                .recommendations_for_product(identity, &seed, limit)
                .await
                .map_err(|error| application_failure(COMMAND, error))?;
            Ok(Recommendation { strategy: None, products })
        }
        None => {
            let limit = request.limit.unwrap_or(settings.homepage_limit);
            let ranking = engine
                .personalized_ranking(identity, limit, &HashSet::new())
                .await
                .map_err(|error| application_failure(COMMAND, error))?;
            Ok(Recommendation { strategy: ranking.strategy, products: ranking.products })
        }
    }
}
