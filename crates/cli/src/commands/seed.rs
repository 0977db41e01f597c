use storefront_core::config::LoadOptions;
use storefront_db::{DemoCatalogSeed, SeedResult};

use crate::commands::{build_runtime, load_config, open_database, CommandResult, StepFailure};

pub fn run() -> CommandResult {
    let config = match load_config("seed", LoadOptions::default()) {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match build_runtime("seed") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = open_database(&config).await?;

        let seeded = DemoCatalogSeed::load(&pool)
            .await
            .map_err(|error| StepFailure::new("seed_execution", error.to_string(), 5))?;

        let verification = DemoCatalogSeed::verify(&pool)
            .await
            .map_err(|error| StepFailure::new("seed_verification", error.to_string(), 6))?;

        pool.close().await;

        if verification.all_present {
            Ok::<SeedResult, StepFailure>(seeded)
        } else {
            let failed_checks = verification
                .checks
                .iter()
                .filter_map(|(check, passed)| (!passed).then_some(*check))
                .collect::<Vec<_>>();
            Err(StepFailure::new("seed_verification", verification_message(&failed_checks), 6))
        }
    });

    match result {
        Ok(seeded) => {
            CommandResult::success_with_serialized("seed", summary_message(&seeded), &seeded)
        }
        Err(failure) => CommandResult::from_step_failure("seed", failure),
    }
}

fn summary_message(seeded: &SeedResult) -> String {
    format!(
        "demo catalog loaded: {} categories, {} products, {} users",
        seeded.categories, seeded.products, seeded.users
    )
}

fn verification_message(failed_checks: &[&str]) -> String {
    if failed_checks.is_empty() {
        "Some seed data failed to load".to_string()
    } else {
        format!("Seed verification failed for checks: {}", failed_checks.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::verification_message;

    #[test]
    fn verification_error_message_targets_failed_checks() {
        let checks = [("categories", true), ("products", false), ("order-items", false)];

        let failed_checks = checks
            .iter()
            .filter_map(|(check, passed)| (!passed).then_some(*check))
            .collect::<Vec<_>>();

        assert_eq!(
            verification_message(&failed_checks),
            "Seed verification failed for checks: products, order-items"
        );
    }

    #[test]
    fn verification_error_message_falls_back_to_generic_when_no_labels() {
        assert_eq!(verification_message(&[]), "Some seed data failed to load");
    }
}
