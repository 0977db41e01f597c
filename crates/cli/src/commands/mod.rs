pub mod config;
pub mod migrate;
pub mod recommend;
pub mod seed;
pub mod track;

use serde::Serialize;
use serde_json::Value;
use storefront_core::config::{AppConfig, LoadOptions};
use storefront_core::errors::{ApplicationError, InterfaceError};
use storefront_core::Product;
use storefront_db::{connect_with_config, migrations, DbPool};
use tokio::runtime::Runtime;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        Self::success_with_data(command, message, None)
    }

    pub fn success_with_data(
        command: &str,
        message: impl Into<String>,
        data: Option<Value>,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            data,
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    /// Like [`Self::success_with_data`], but a payload that cannot be
    /// serialized becomes a `serialization` failure.
    pub fn success_with_serialized<T: Serialize>(
        command: &str,
        message: impl Into<String>,
        data: &T,
    ) -> Self {
        match serde_json::to_value(data) {
            Ok(value) => Self::success_with_data(command, message, Some(value)),
            Err(error) => Self::failure(
                command,
                "serialization",
                format!("failed to serialize command data: {error}"),
                9,
            ),
        }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
            data: None,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }

    pub(crate) fn from_step_failure(command: &str, failure: StepFailure) -> Self {
        Self::failure(command, failure.error_class, failure.message, failure.exit_code)
    }
}

/// A failed command step: error class, message and process exit code.
#[derive(Debug)]
pub(crate) struct StepFailure {
    error_class: &'static str,
    message: String,
    exit_code: u8,
}

impl StepFailure {
    pub(crate) fn new(
        error_class: &'static str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        Self { error_class, message: message.into(), exit_code }
    }
}

impl From<InterfaceError> for StepFailure {
    fn from(error: InterfaceError) -> Self {
        let exit_code = match error {
            InterfaceError::BadRequest { .. } => 7,
            InterfaceError::ServiceUnavailable { .. } => 8,
            InterfaceError::Internal { .. } => 9,
        };
        Self::new(error.error_class(), error.to_string(), exit_code)
    }
}

/// Maps an engine or lookup failure through the interface error layer, using
/// the command name as correlation id.
pub(crate) fn application_failure(
    command: &str,
    error: impl Into<ApplicationError>,
) -> StepFailure {
    StepFailure::from(error.into().into_interface(format!("cli-{command}")))
}

pub(crate) fn load_config(
    command: &str,
    options: LoadOptions,
) -> Result<AppConfig, CommandResult> {
    AppConfig::load(options).map_err(|error| {
        CommandResult::failure(
            command,
            "config_validation",
            format!("configuration issue: {error}"),
            2,
        )
    })
}

pub(crate) fn build_runtime(command: &str) -> Result<Runtime, CommandResult> {
    tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
        CommandResult::failure(
            command,
            "runtime_init",
            format!("failed to initialize async runtime: {error}"),
            3,
        )
    })
}

/// Connects and applies pending migrations so every command sees the
/// current schema.
pub(crate) async fn open_database(config: &AppConfig) -> Result<DbPool, StepFailure> {
    let pool = connect_with_config(&config.database)
        .await
        .map_err(|error| StepFailure::new("db_connectivity", error.to_string(), 4))?;
    migrations::run_pending(&pool)
        .await
        .map_err(|error| StepFailure::new("migration", error.to_string(), 5))?;
    Ok(pool)
}

pub(crate) fn product_summary(product: &Product) -> Value {
    serde_json::json!({
        "id": product.id.0,
        "name": product.name,
        "category_id": product.category_id.0,
        "price": product.price.to_string(),
    })
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

#[cfg(test)]
mod tests {
    use serde::ser::{Error as _, Serializer};
    use serde::Serialize;
    use serde_json::Value;
    use storefront_core::errors::{ApplicationError, DomainError, StoreError};
    use storefront_core::ProductId;

    use super::{CommandResult, StepFailure};

    #[test]
    fn success_payload_omits_empty_data() {
        let result = CommandResult::success("migrate", "applied pending migrations");
        let payload: Value = serde_json::from_str(&result.output).expect("json payload");

        assert_eq!(result.exit_code, 0);
        assert_eq!(payload["status"], "ok");
        assert!(payload.get("data").is_none());
        assert!(payload["error_class"].is_null());
    }

    struct Unserializable;

    impl Serialize for Unserializable {
        fn serialize<S: Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
            Err(S::Error::custom("record is not representable"))
        }
    }

    #[test]
    fn unserializable_data_becomes_a_failure() {
        let result =
            CommandResult::success_with_serialized("track", "recorded view", &Unserializable);
        let payload: Value = serde_json::from_str(&result.output).expect("json payload");

        assert_eq!(result.exit_code, 9);
        assert_eq!(payload["command"], "track");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "serialization");
        assert!(payload["message"].as_str().expect("message").contains("not representable"));
    }

    #[test]
    fn interface_errors_map_to_distinct_exit_codes() {
        let missing = StepFailure::from(
            ApplicationError::from(DomainError::ProductNotFound(ProductId(5)))
                .into_interface("cli-track"),
        );
        let offline = StepFailure::from(
            ApplicationError::from(StoreError::Unavailable("locked".to_string()))
                .into_interface("cli-track"),
        );

        assert_eq!((missing.error_class, missing.exit_code), ("bad_request", 7));
        assert_eq!((offline.error_class, offline.exit_code), ("storage_unavailable", 8));
    }

    #[test]
    fn rejected_writes_are_bad_requests() {
        let rejected = StepFailure::from(
            ApplicationError::from(StoreError::Constraint(
                "FOREIGN KEY constraint failed".to_string(),
            ))
            .into_interface("cli-track"),
        );

        assert_eq!((rejected.error_class, rejected.exit_code), ("bad_request", 7));
    }
}
