//! Append-only status history entries

use crate::model::MessageStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which path observed the transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HistorySource {
    /// Ingress request handling
    Api,
    /// Background jobs and database-side triggers
    Trigger,
    /// Channel worker processing
    Worker,
}

impl fmt::Display for HistorySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HistorySource::Api => write!(f, "API"),
            HistorySource::Trigger => write!(f, "TRIGGER"),
            HistorySource::Worker => write!(f, "WORKER"),
        }
    }
}

/// One ledger row. Entries are never updated or removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusHistoryEntry {
    pub message_id: String,
    pub status: MessageStatus,
    pub error_message: Option<String>,
    pub retry_count: i32,
    pub timestamp: DateTime<Utc>,
    pub source: HistorySource,
}

impl StatusHistoryEntry {
    /// Create an entry stamped with the current time
    pub fn now(
        message_id: impl Into<String>,
        status: MessageStatus,
        retry_count: i32,
        source: HistorySource,
    ) -> Self {
        Self {
            message_id: message_id.into(),
            status,
            error_message: None,
            retry_count,
            timestamp: Utc::now(),
            source,
        }
    }

    /// Attach a (pre-sanitized) error message
    pub fn with_error(mut self, error: Option<String>) -> Self {
        self.error_message = error;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_creation() {
        let entry = StatusHistoryEntry::now("msg-1", MessageStatus::Pending, 0, HistorySource::Api);

        assert_eq!(entry.message_id, "msg-1");
        assert_eq!(entry.status, MessageStatus::Pending);
        assert_eq!(entry.retry_count, 0);
        assert!(entry.error_message.is_none());
    }

    #[test]
    fn test_entry_with_error() {
        let entry = StatusHistoryEntry::now("msg-1", MessageStatus::Failed, 1, HistorySource::Worker)
            .with_error(Some("TEMPORARY: provider returned 503".to_string()));

        assert_eq!(entry.source, HistorySource::Worker);
        assert!(entry.error_message.unwrap().starts_with("TEMPORARY"));
    }
}
