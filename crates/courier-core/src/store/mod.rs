//! Store ports
//!
//! Every cross-replica coordination point in the pipeline is a conditional
//! update on the message row: the method returns `true` when this caller
//! won the transition and `false` when another actor got there first. No
//! in-memory locking exists across services; these compare-and-set
//! contracts are the whole concurrency story.

pub mod memory;

use crate::errors::CoreResult;
use crate::model::{
    ChannelSession, FailureType, GlobalProviderConfig, Message, MessageStatus, Site,
    StatusHistoryEntry,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub use memory::{MemoryHistoryStore, MemoryMessageStore, MemoryTenantDirectory};

/// Durable message log
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Insert a freshly accepted row (PENDING or SCHEDULED)
    async fn insert(&self, message: &Message) -> CoreResult<()>;

    /// Load a row by message id
    async fn find(&self, message_id: &str) -> CoreResult<Option<Message>>;

    /// Atomic retry claim: `from` (FAILED, or PENDING for the publish
    /// rescue) → RETRYING, clearing `failure_type` and incrementing
    /// `retry_count` by one. The increment here is the only place in the
    /// system where the counter moves; the retry controller is its single
    /// writer.
    async fn claim_for_retry(&self, message_id: &str, from: MessageStatus) -> CoreResult<bool>;

    /// RETRYING → PENDING after a successful republish, clearing
    /// `failure_type` and `error_message`
    async fn release_to_pending(&self, message_id: &str) -> CoreResult<bool>;

    /// Terminal success: → DELIVERED with `sent_at`/`delivered_at` set and
    /// `failure_type` cleared. Conditional on the row not already being in
    /// a terminal state, so a late worker cannot overwrite DELIVERED.
    async fn mark_delivered(&self, message_id: &str, at: DateTime<Utc>) -> CoreResult<bool>;

    /// Worker failure: → FAILED with `failure_type = CONSUMER` and a
    /// sanitized error. Never touches `retry_count`. Conditional on the
    /// row not being terminal.
    async fn mark_consumer_failed(&self, message_id: &str, error: &str) -> CoreResult<bool>;

    /// Republish failure: RETRYING → FAILED with `failure_type = PUBLISH`
    /// and a sanitized error. Called by the retry controller only.
    async fn record_publish_failure(&self, message_id: &str, error: &str) -> CoreResult<bool>;

    /// Retries exhausted: RETRYING → FAILED (held there), restoring
    /// `failure_type` and prefixing the error with "Max retries exceeded"
    /// while preserving the prior cause.
    async fn note_retries_exhausted(
        &self,
        message_id: &str,
        failure: FailureType,
    ) -> CoreResult<()>;

    /// SCHEDULED → PENDING, clearing `scheduled_at` and `failure_type`
    async fn promote_scheduled(&self, message_id: &str) -> CoreResult<bool>;

    /// FAILED rows of one failure type eligible for retry, oldest first
    async fn failed_batch(
        &self,
        failure: FailureType,
        max_retries: i32,
        older_than: DateTime<Utc>,
        limit: u64,
    ) -> CoreResult<Vec<Message>>;

    /// PENDING rows whose publish apparently never happened: in PENDING
    /// since before `older_than` with retries left, oldest first
    async fn stuck_pending_batch(
        &self,
        older_than: DateTime<Utc>,
        max_retries: i32,
        limit: u64,
    ) -> CoreResult<Vec<Message>>;

    /// SCHEDULED rows whose time has arrived, earliest schedule first
    async fn due_scheduled_batch(&self, now: DateTime<Utc>, limit: u64)
        -> CoreResult<Vec<Message>>;
}

/// Append-only status history
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Append one entry. Ordering/dedup policy lives in the ledger, not
    /// here.
    async fn append(&self, entry: &StatusHistoryEntry) -> CoreResult<()>;

    /// Timestamp of the most recent entry for `(message_id, status)`
    async fn last_timestamp(
        &self,
        message_id: &str,
        status: MessageStatus,
    ) -> CoreResult<Option<DateTime<Utc>>>;

    /// Whether any SENT or DELIVERED entry exists for the message
    async fn has_success_entry(&self, message_id: &str) -> CoreResult<bool>;

    /// All entries for a message, oldest first
    async fn entries(&self, message_id: &str) -> CoreResult<Vec<StatusHistoryEntry>>;
}

/// Read-only tenant lookups for credential resolution and authentication
#[async_trait]
pub trait TenantDirectory: Send + Sync {
    /// Active site by id
    async fn find_active_site(&self, site_id: Uuid) -> CoreResult<Option<Site>>;

    /// Active site by api-key hash (indexed equality, no scans)
    async fn find_active_site_by_api_key_hash(&self, hash: &str) -> CoreResult<Option<Site>>;

    /// Active provider session by name
    async fn find_active_session(&self, session_name: &str) -> CoreResult<Option<ChannelSession>>;

    /// The active global fallback configuration, if any
    async fn active_global_config(&self) -> CoreResult<Option<GlobalProviderConfig>>;
}
