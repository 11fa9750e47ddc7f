use thiserror::Error;

/// Enumerates high-level errors returned by this library.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The managed document store isn't configured or couldn't be
    /// reached.
    #[error("Document store unavailable: {reason}")]
    StoreUnavailable { reason: String },

    /// Represents an SQL error.
    #[error("SQLx error")]
    Sqlx { source: sqlx::Error },

    /// The document store refused an operation.
    #[error("Document store error: {message}")]
    Store { message: String },

    /// A stored document didn't have the shape of the entity it
    /// belongs to.
    #[error("Malformed document")]
    MalformedDocument { source: serde_json::Error },

    /// A timestamp couldn't be rendered.
    #[error("Failed to format timestamp")]
    Timestamp { source: time::error::Format },

    /// A field in a request failed validation.
    #[error("Invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    /// Represents an error with the request.
    #[error("Bad request")]
    BadRequest,

    /// The requested record doesn't exist.
    #[error("{kind} not found")]
    NotFound { kind: &'static str },
}

impl BackendError {
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        BackendError::Validation {
            field,
            reason: reason.into(),
        }
    }

    pub fn store(message: impl Into<String>) -> Self {
        BackendError::Store {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(source: serde_json::Error) -> Self {
        BackendError::MalformedDocument { source }
    }
}

impl From<time::error::Format> for BackendError {
    fn from(source: time::error::Format) -> Self {
        BackendError::Timestamp { source }
    }
}

/// Fails with a validation error if `value` is empty or only whitespace.
pub fn require_non_blank(field: &'static str, value: &str) -> Result<(), BackendError> {
    if value.trim().is_empty() {
        return Err(BackendError::validation(field, "must not be blank"));
    }

    Ok(())
}

pub(crate) fn map_sqlx_error(source: sqlx::Error) -> BackendError {
    BackendError::Sqlx { source }
}
