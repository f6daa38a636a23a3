//! Status history ledger
//!
//! Records every status transition exactly once: transitions are validated
//! against the fixed map, near-duplicate entries for the same
//! `(message_id, status)` pair inside a one-second window are suppressed,
//! and business counters are emitted on successful appends. Both the
//! application paths and a database-side trigger may feed the same table;
//! the dedup window is what makes the dual write safe.

use crate::errors::CoreResult;
use crate::metrics::DispatchMetrics;
use crate::model::{MessageStatus, StatusHistoryEntry};
use crate::store::HistoryStore;
use crate::transitions;
use chrono::Duration;
use std::sync::Arc;
use tracing::debug;

/// Window inside which a repeated `(message_id, status)` entry is treated
/// as the same transition observed twice.
const DEDUP_WINDOW_MS: i64 = 1_000;

/// Append-only ledger over a history store
pub struct StatusLedger {
    history: Arc<dyn HistoryStore>,
    metrics: Arc<DispatchMetrics>,
}

impl StatusLedger {
    pub fn new(history: Arc<dyn HistoryStore>, metrics: Arc<DispatchMetrics>) -> Self {
        Self { history, metrics }
    }

    /// Record a transition to `entry.status`.
    ///
    /// `previous` is the row status before the transition (`None` for the
    /// insert of a fresh row). Returns `Ok(true)` when an entry was
    /// written, `Ok(false)` when a near-duplicate was suppressed, and
    /// `INVALID_TRANSITION` when the fixed map forbids the move.
    pub async fn append(
        &self,
        previous: Option<MessageStatus>,
        entry: StatusHistoryEntry,
    ) -> CoreResult<bool> {
        match previous {
            Some(from) => transitions::check(from, entry.status)?,
            None => {
                if !transitions::permits_initial(entry.status) {
                    return Err(transitions::TransitionError {
                        from: entry.status,
                        to: entry.status,
                    }
                    .into());
                }
            }
        }

        if let Some(last) = self
            .history
            .last_timestamp(&entry.message_id, entry.status)
            .await?
        {
            if entry.timestamp - last < Duration::milliseconds(DEDUP_WINDOW_MS) {
                debug!(
                    message_id = %entry.message_id,
                    status = %entry.status,
                    "Suppressed near-duplicate history entry"
                );
                return Ok(false);
            }
        }

        self.history.append(&entry).await?;

        match entry.status {
            MessageStatus::Delivered => self.metrics.delivered.inc(),
            MessageStatus::Failed => self.metrics.failed.inc(),
            MessageStatus::Retrying => self.metrics.retried.inc(),
            _ => {}
        }

        Ok(true)
    }

    /// Access the underlying store (rescue-rule and test queries)
    pub fn history(&self) -> &Arc<dyn HistoryStore> {
        &self.history
    }
}
