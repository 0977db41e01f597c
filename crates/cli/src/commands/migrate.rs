use storefront_core::config::LoadOptions;

use crate::commands::{
    build_runtime, load_config, open_database, CommandResult, StepFailure,
};

pub fn run() -> CommandResult {
    let config = match load_config("migrate", LoadOptions::default()) {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match build_runtime("migrate") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = open_database(&config).await?;
        pool.close().await;
        Ok::<(), StepFailure>(())
    });

    match result {
        Ok(()) => CommandResult::success("migrate", "applied pending migrations"),
        Err(failure) => CommandResult::from_step_failure("migrate", failure),
    }
}
