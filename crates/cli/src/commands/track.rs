use storefront_core::config::LoadOptions;
use storefront_core::domain::identity::{Identity, SessionKey, UserId};
use storefront_core::domain::interaction::ViewRecord;
use storefront_core::domain::product::ProductId;
use storefront_core::errors::DomainError;
use storefront_core::recommend::{CatalogProvider, InteractionStore, RecommendationEngine};
use storefront_db::SqlStorefront;

use crate::commands::{
    application_failure, build_runtime, load_config, open_database, CommandResult, StepFailure,
};

const COMMAND: &str = "track";

/// Records one product-detail view for a user or session.
pub fn run(product_id: i64, user: Option<i64>, session: Option<String>) -> CommandResult {
    let config = match load_config(COMMAND, LoadOptions::default()) {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match build_runtime(COMMAND) {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let identity = Identity::resolve(user.map(UserId), session.map(SessionKey));
    let product_id = ProductId(product_id);

    let result = runtime.block_on(async {
        let pool = open_database(&config).await?;
        let storefront = SqlStorefront::new(pool.clone());
        let engine = storefront.engine(config.recommendations);

        let outcome = track_view(&storefront, &engine, &identity, product_id).await;
        pool.close().await;
        outcome
    });

    match result {
        Ok(None) => CommandResult::success(
            COMMAND,
            format!("anonymous view of product {product_id} was not tracked"),
        ),
        Ok(Some(record)) => CommandResult::success_with_serialized(
            COMMAND,
            format!("recorded view of product {product_id} (count {})", record.view_count),
            &record,
        ),
        Err(failure) => CommandResult::from_step_failure(COMMAND, failure),
    }
}

async fn track_view(
    storefront: &SqlStorefront,
    engine: &RecommendationEngine,
    identity: &Identity,
    product_id: ProductId,
) -> Result<Option<ViewRecord>, StepFailure> {
    let product = storefront
        .catalog
        .product(product_id)
        .await
        .map_err(|error| application_failure(COMMAND, error))?
        .ok_or_else(|| application_failure(COMMAND, DomainError::ProductNotFound(product_id)))?;

    engine
        .record_view(identity, &product)
        .await
        .map_err(|error| application_failure(COMMAND, error))?;

    storefront
        .interactions
        .view_record(identity, product_id)
        .await
        .map_err(|error| application_failure(COMMAND, error))
}
