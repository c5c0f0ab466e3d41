//! Global application error types.
//!
//! `ServiceError` is the taxonomy every handler ultimately maps onto an HTTP
//! status. `StoreError` is what the credential store reports; it is
//! reclassified into `ServiceError` at the service boundary.

use thiserror::Error;

/// Errors reported by a `CredentialStore` implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique index rejected the write. `field` names the offending column.
    #[error("unique constraint violated on {field}")]
    UniqueViolation { field: String },

    #[error("store backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(error: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_error) = &error {
            if db_error.is_unique_violation() {
                // SQLite reports "UNIQUE constraint failed: users.<column>"
                let field = db_error
                    .message()
                    .rsplit('.')
                    .next()
                    .map(|column| column.trim().to_string())
                    .unwrap_or_else(|| "unknown".to_string());
                return StoreError::UniqueViolation { field };
            }
        }
        StoreError::Backend(error.into())
    }
}

/// Generic service error that can be used across all entities
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("{entity} not found: {identifier}")]
    NotFound { entity: String, identifier: String },

    #[error("{entity} already exists: {identifier}")]
    AlreadyExists { entity: String, identifier: String },

    /// Bad credentials or an unusable token. Carries no detail on purpose so
    /// that every authentication failure renders identically.
    #[error("Invalid credentials")]
    Authentication,

    #[error("Internal error: {message}")]
    Internal { message: String },
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn not_found(entity: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            identifier: identifier.into(),
        }
    }

    pub fn already_exists(entity: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self::AlreadyExists {
            entity: entity.into(),
            identifier: identifier.into(),
        }
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::UniqueViolation { field } => Self::already_exists("User", field),
            StoreError::Backend(source) => {
                tracing::error!("Credential store failure: {:#}", source);
                Self::internal_error("Persistence failure")
            }
        }
    }
}

/// Formats `validator` output into the single message carried by
/// `ServiceError::Validation`.
pub fn validation_errors_to_message(errors: &validator::ValidationErrors) -> String {
    let mut messages: Vec<String> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, errors)| {
            errors.iter().map(move |error| {
                format!(
                    "{}: {}",
                    field,
                    error.message.as_ref().unwrap_or(&"Invalid value".into())
                )
            })
        })
        .collect();
    messages.sort();
    messages.join(", ")
}
