//! Scheduled-message promoter
//!
//! Moves SCHEDULED rows whose time has arrived into PENDING and publishes
//! them, mirroring the ingress publish-after-commit rule. The conditional
//! SCHEDULED → PENDING update keeps replicas from promoting the same row
//! twice.

use chrono::Utc;
use courier_core::bus::{MessageBus, TopicMap};
use courier_core::errors::CoreResult;
use courier_core::ledger::StatusLedger;
use courier_core::model::{HistorySource, MessageStatus, StatusHistoryEntry};
use courier_core::payload::DispatchPayload;
use courier_core::store::MessageStore;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Scheduler cadence and page size
#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub interval: Duration,
    pub batch_size: u64,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            batch_size: 100,
        }
    }
}

/// Periodic SCHEDULED → PENDING promoter
pub struct Scheduler {
    store: Arc<dyn MessageStore>,
    ledger: Arc<StatusLedger>,
    bus: Arc<dyn MessageBus>,
    topics: TopicMap,
    settings: SchedulerSettings,
    is_running: Arc<AtomicBool>,
}

impl Scheduler {
    pub fn new(
        store: Arc<dyn MessageStore>,
        ledger: Arc<StatusLedger>,
        bus: Arc<dyn MessageBus>,
        topics: TopicMap,
        settings: SchedulerSettings,
    ) -> Self {
        Self {
            store,
            ledger,
            bus,
            topics,
            settings,
            is_running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Promote one page of due rows; returns how many this replica won
    pub async fn tick(&self) -> CoreResult<usize> {
        let due = self
            .store
            .due_scheduled_batch(Utc::now(), self.settings.batch_size)
            .await?;

        let mut promoted = 0;
        for row in due {
            if !self.store.promote_scheduled(&row.message_id).await? {
                // Another replica took it.
                continue;
            }
            promoted += 1;

            self.ledger
                .append(
                    Some(MessageStatus::Scheduled),
                    StatusHistoryEntry::now(
                        row.message_id.clone(),
                        MessageStatus::Pending,
                        row.retry_count,
                        HistorySource::Trigger,
                    ),
                )
                .await?;

            let mut pending = row.clone();
            pending.status = MessageStatus::Pending;
            pending.scheduled_at = None;
            let payload = DispatchPayload::from_message(&pending);

            // Promotion is committed; publish mirrors the ingress rule,
            // and a failure here is the rescue path's problem.
            if let Err(err) = self
                .bus
                .publish(self.topics.topic(row.channel), &row.message_id, &payload)
                .await
            {
                warn!(message_id = %row.message_id, "Publish after promotion failed: {err}");
            }
        }

        Ok(promoted)
    }

    /// Run the promotion loop until `stop` is called
    pub async fn run(&self) {
        self.is_running.store(true, Ordering::SeqCst);
        info!("Scheduler started");

        while self.is_running.load(Ordering::SeqCst) {
            match self.tick().await {
                Ok(0) => {}
                Ok(promoted) => info!(promoted, "Promoted scheduled messages"),
                Err(err) => error!("Scheduler tick failed: {err}"),
            }
            tokio::time::sleep(self.settings.interval).await;
        }

        info!("Scheduler stopped");
    }

    pub fn stop(&self) {
        self.is_running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }
}
