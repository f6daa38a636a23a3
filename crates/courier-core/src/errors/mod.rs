//! Error types shared by the dispatch pipeline
//!
//! Infrastructure-level failures (bus, store, serialization) are carried by
//! [`CoreError`]. Provider-call failures are categorized separately via
//! [`crate::model::FailureCategory`] because they drive retry policy, not
//! error propagation.

use thiserror::Error;

/// Core result type used throughout the pipeline
pub type CoreResult<T> = Result<T, CoreError>;

/// Core error types for Courier
#[derive(Debug, Error)]
pub enum CoreError {
    /// Request validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Entity not found errors
    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    /// Disallowed status transition
    #[error(transparent)]
    InvalidTransition(#[from] crate::transitions::TransitionError),

    /// Payload siteId/sessionName disagrees with the stored row
    #[error("Tenant mismatch: {0}")]
    TenantMismatch(String),

    /// Missing or unusable credentials/configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Bus publish/receive failures
    #[error("Bus error: {0}")]
    Bus(String),

    /// Store access failures
    #[error("Store error: {0}")]
    Store(String),

    /// Serialization/Deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Create a validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        CoreError::Validation(message.into())
    }

    /// Create a not found error
    pub fn not_found<S: Into<String>>(entity_type: S, id: S) -> Self {
        CoreError::NotFound {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }

    /// Create a tenant mismatch error
    pub fn tenant_mismatch<S: Into<String>>(message: S) -> Self {
        CoreError::TenantMismatch(message.into())
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        CoreError::Configuration(message.into())
    }

    /// Create a bus error
    pub fn bus<S: Into<String>>(message: S) -> Self {
        CoreError::Bus(message.into())
    }

    /// Create a store error
    pub fn store<S: Into<String>>(message: S) -> Self {
        CoreError::Store(message.into())
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        CoreError::Internal(message.into())
    }

    /// Whether a later attempt may succeed without operator intervention
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::Bus(_) | CoreError::Store(_))
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Serialization(err.to_string())
    }
}

impl From<redis::RedisError> for CoreError {
    fn from(err: redis::RedisError) -> Self {
        CoreError::Bus(err.to_string())
    }
}
