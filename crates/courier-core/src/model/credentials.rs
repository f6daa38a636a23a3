//! Resolved provider credentials
//!
//! These values exist only in process memory during a send. The manual
//! `Debug` implementation keeps key material out of logs even when a value
//! ends up in a formatted error.

use std::fmt;

/// Credentials handed to a provider adapter for a single send
#[derive(Clone, PartialEq)]
pub enum ProviderCredentials {
    Sendgrid {
        api_key: String,
        from_email: String,
        from_name: String,
    },
    WhatsappSession {
        session_name: String,
        api_key: String,
    },
}

impl ProviderCredentials {
    /// Channel-facing label, safe to log
    pub fn kind(&self) -> &'static str {
        match self {
            ProviderCredentials::Sendgrid { .. } => "sendgrid",
            ProviderCredentials::WhatsappSession { .. } => "whatsapp-session",
        }
    }
}

impl fmt::Debug for ProviderCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderCredentials::Sendgrid {
                from_email,
                from_name,
                ..
            } => f
                .debug_struct("Sendgrid")
                .field("api_key", &"[REDACTED]")
                .field("from_email", from_email)
                .field("from_name", from_name)
                .finish(),
            ProviderCredentials::WhatsappSession { session_name, .. } => f
                .debug_struct("WhatsappSession")
                .field("session_name", session_name)
                .field("api_key", &"[REDACTED]")
                .finish(),
        }
    }
}
