//! Status transition validator
//!
//! Pure fixed-map validation of message lifecycle transitions. No time,
//! environment, or I/O branch; every ledger append goes through this map.

use crate::model::MessageStatus;
use thiserror::Error;

/// Disallowed status transition
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid status transition from {from} to {to}")]
pub struct TransitionError {
    pub from: MessageStatus,
    pub to: MessageStatus,
}

/// Whether `from → to` is a permitted transition.
///
/// FAILED → RETRYING is reachable only through the retry controller's
/// atomic claim; DELIVERED, BOUNCED, and REJECTED are terminal.
pub fn permits(from: MessageStatus, to: MessageStatus) -> bool {
    use MessageStatus::*;

    match from {
        Scheduled => matches!(to, Pending | Failed),
        Pending => matches!(to, Sent | Delivered | Failed | Retrying | Bounced | Rejected),
        Retrying => matches!(to, Pending | Sent | Delivered | Failed | Bounced | Rejected),
        Sent => matches!(to, Delivered | Failed | Bounced | Rejected),
        Failed => matches!(to, Retrying),
        Delivered | Bounced | Rejected => false,
    }
}

/// Whether `status` is a legal first state for a freshly inserted row
pub fn permits_initial(status: MessageStatus) -> bool {
    matches!(status, MessageStatus::Pending | MessageStatus::Scheduled)
}

/// Validate `from → to`, returning the offending pair on violation
pub fn check(from: MessageStatus, to: MessageStatus) -> Result<(), TransitionError> {
    if permits(from, to) {
        Ok(())
    } else {
        Err(TransitionError { from, to })
    }
}
