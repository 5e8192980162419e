//! Domain errors for the Parlor assistant.

use thiserror::Error;

/// Domain-level errors raised by repositories and validation.
#[derive(Debug, Error)]
pub enum DomainError {
    /// No stored channel has this id
    #[error("Channel not found: {0}")]
    ChannelNotFound(String),

    /// Input rejected before reaching storage
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// Storage layer failure
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Stored value could not be decoded
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Result alias for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}

/// Errors raised while wiring handlers into the dispatcher.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    /// Handler declared no event type; carries the handler name
    #[error("Handler '{0}' does not declare an event type; register it with an explicit type")]
    MissingEventType(String),
}
