use thiserror::Error;

use crate::domain::product::ProductId;

/// Failure of a data-access port. The engine passes these through untouched.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("storage returned undecodable data: {0}")]
    Decode(String),
    /// A write referenced a missing row or collided with a unique key.
    #[error("storage rejected the write: {0}")]
    Constraint(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("product {0} does not exist")]
    ProductNotFound(ProductId),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Storage(#[from] StoreError),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::ServiceUnavailable { .. } => {
                "Recommendations are temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn error_class(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => "bad_request",
            Self::ServiceUnavailable { .. } => "storage_unavailable",
            Self::Internal { .. } => "internal",
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        match value {
            ApplicationError::Domain(error) => Self::BadRequest {
                message: error.to_string(),
                correlation_id: "unassigned".to_owned(),
            },
            ApplicationError::Storage(error @ StoreError::Constraint(_)) => Self::BadRequest {
                message: error.to_string(),
                correlation_id: "unassigned".to_owned(),
            },
            ApplicationError::Storage(error @ StoreError::Decode(_)) => Self::Internal {
                message: error.to_string(),
                correlation_id: "unassigned".to_owned(),
            },
            ApplicationError::Storage(error @ StoreError::Unavailable(_)) => {
                Self::ServiceUnavailable {
                    message: error.to_string(),
                    correlation_id: "unassigned".to_owned(),
                }
            }
            ApplicationError::Configuration(message) => {
                Self::Internal { message, correlation_id: "unassigned".to_owned() }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::product::ProductId;
    use crate::errors::{ApplicationError, DomainError, InterfaceError, StoreError};

    #[test]
    fn unknown_product_maps_to_bad_request_interface_error() {
        let interface = ApplicationError::from(DomainError::ProductNotFound(ProductId(99)))
            .into_interface("req-1");

        assert!(matches!(
            interface,
            InterfaceError::BadRequest {
                ref correlation_id,
                ref message,
            } if correlation_id == "req-1" && message.contains("99")
        ));
        assert_eq!(interface.error_class(), "bad_request");
    }

    #[test]
    fn storage_error_maps_to_service_unavailable() {
        let interface =
            ApplicationError::from(StoreError::Unavailable("database is locked".to_owned()))
                .into_interface("req-2");

        assert!(matches!(interface, InterfaceError::ServiceUnavailable { .. }));
        assert_eq!(
            interface.user_message(),
            "Recommendations are temporarily unavailable. Please retry shortly."
        );
    }

    #[test]
    fn rejected_write_maps_to_bad_request() {
        let interface = ApplicationError::from(StoreError::Constraint(
            "FOREIGN KEY constraint failed".to_owned(),
        ))
        .into_interface("req-4");

        assert!(matches!(
            interface,
            InterfaceError::BadRequest { ref message, .. } if message.contains("FOREIGN KEY")
        ));
        assert_eq!(interface.error_class(), "bad_request");
    }

    #[test]
    fn undecodable_row_maps_to_internal() {
        let interface = ApplicationError::from(StoreError::Decode("invalid price `x`".to_owned()))
            .into_interface("req-5");

        assert_eq!(interface.error_class(), "internal");
    }

    #[test]
    fn configuration_error_maps_to_internal() {
        let interface = ApplicationError::Configuration("history_window must be positive".into())
            .into_interface("req-3");

        assert!(matches!(interface, InterfaceError::Internal { .. }));
        assert_eq!(interface.user_message(), "An unexpected internal error occurred.");
    }
}
