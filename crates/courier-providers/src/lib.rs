//! # courier-providers
//!
//! Delivery provider adapters. Each channel is served by an adapter
//! implementing [`Provider`]: a name and a `send` returning a categorized
//! outcome. Adapters never panic out of `send`; transport problems come
//! back as TEMPORARY failures so the retry controller can handle them.
//!
//! HTTP status mapping, shared by all adapters:
//! 401/403 → AUTH, 429 and 5xx → TEMPORARY, other 4xx → PERMANENT,
//! timeouts and IO errors → TEMPORARY.

pub mod mock;
pub mod sendgrid;
pub mod whatsapp;

use async_trait::async_trait;
use courier_core::model::{FailureCategory, ProviderCredentials};
use courier_core::payload::DispatchPayload;
use std::fmt;
use thiserror::Error;

pub use mock::MockProvider;
pub use sendgrid::SendgridProvider;
pub use whatsapp::WhatsappProvider;

/// Adapter construction errors
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP client error: {0}")]
    HttpClient(String),
}

/// Known provider adapters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderName {
    Sendgrid,
    Whatsapp,
    Mock,
}

impl fmt::Display for ProviderName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderName::Sendgrid => write!(f, "sendgrid"),
            ProviderName::Whatsapp => write!(f, "whatsapp"),
            ProviderName::Mock => write!(f, "mock"),
        }
    }
}

/// Categorized result of one provider call
#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    Delivered,
    Failed {
        category: FailureCategory,
        message: String,
    },
}

impl SendOutcome {
    pub fn failed(category: FailureCategory, message: impl Into<String>) -> Self {
        SendOutcome::Failed {
            category,
            message: message.into(),
        }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, SendOutcome::Delivered)
    }
}

/// One provider adapter per channel
#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> ProviderName;

    /// Deliver a payload with the resolved credentials. Must not error out
    /// of the call; every failure is a categorized outcome.
    async fn send(&self, payload: &DispatchPayload, credentials: &ProviderCredentials)
        -> SendOutcome;
}

/// Map an HTTP response status to a failure category
pub fn categorize_status(status: reqwest::StatusCode) -> FailureCategory {
    match status.as_u16() {
        401 | 403 => FailureCategory::Auth,
        429 => FailureCategory::Temporary,
        500..=599 => FailureCategory::Temporary,
        400..=499 => FailureCategory::Permanent,
        _ => FailureCategory::Temporary,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_status_mapping() {
        assert_eq!(categorize_status(StatusCode::UNAUTHORIZED), FailureCategory::Auth);
        assert_eq!(categorize_status(StatusCode::FORBIDDEN), FailureCategory::Auth);
        assert_eq!(
            categorize_status(StatusCode::TOO_MANY_REQUESTS),
            FailureCategory::Temporary
        );
        assert_eq!(
            categorize_status(StatusCode::INTERNAL_SERVER_ERROR),
            FailureCategory::Temporary
        );
        assert_eq!(
            categorize_status(StatusCode::SERVICE_UNAVAILABLE),
            FailureCategory::Temporary
        );
        assert_eq!(
            categorize_status(StatusCode::BAD_REQUEST),
            FailureCategory::Permanent
        );
        assert_eq!(
            categorize_status(StatusCode::NOT_FOUND),
            FailureCategory::Permanent
        );
    }

    #[test]
    fn test_outcome_helpers() {
        assert!(SendOutcome::Delivered.is_delivered());
        assert!(!SendOutcome::failed(FailureCategory::Auth, "401").is_delivered());
    }
}
