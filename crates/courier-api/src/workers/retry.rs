//! Retry controller
//!
//! The single writer of `retry_count` and the only component that sends
//! to dead-letter queues. Each tick scans FAILED rows per failure type,
//! claims candidates with an atomic FAILED → RETRYING update (the claim
//! increments the counter, one increment per retry cycle), republishes,
//! and escalates exhausted rows to the channel DLQ. PENDING rows whose
//! publish never happened are rescued through the same claim flow.

use chrono::{Duration as ChronoDuration, Utc};
use courier_core::bus::{MessageBus, TopicMap};
use courier_core::errors::CoreResult;
use courier_core::ledger::StatusLedger;
use courier_core::metrics::DispatchMetrics;
use courier_core::model::{
    FailureType, HistorySource, Message, MessageStatus, StatusHistoryEntry,
};
use courier_core::payload::DispatchPayload;
use courier_core::sanitize::sanitize;
use courier_core::store::{HistoryStore, MessageStore};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Retry policy, read once at startup
#[derive(Debug, Clone)]
pub struct RetrySettings {
    pub max_retries: i32,
    pub retry_delay: ChronoDuration,
    pub batch_size: u64,
    pub scan_interval: Duration,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: ChronoDuration::minutes(5),
            batch_size: 50,
            scan_interval: Duration::from_secs(300),
        }
    }
}

/// Periodic scanner owning retry and DLQ decisions for the whole system
pub struct RetryController {
    store: Arc<dyn MessageStore>,
    ledger: Arc<StatusLedger>,
    bus: Arc<dyn MessageBus>,
    topics: TopicMap,
    metrics: Arc<DispatchMetrics>,
    settings: RetrySettings,
    is_running: Arc<AtomicBool>,
}

impl RetryController {
    pub fn new(
        store: Arc<dyn MessageStore>,
        ledger: Arc<StatusLedger>,
        bus: Arc<dyn MessageBus>,
        topics: TopicMap,
        metrics: Arc<DispatchMetrics>,
        settings: RetrySettings,
    ) -> Self {
        Self {
            store,
            ledger,
            bus,
            topics,
            metrics,
            settings,
            is_running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// One full scan: both failure types, then the publish rescue
    pub async fn tick(&self) -> CoreResult<()> {
        for failure in [FailureType::Publish, FailureType::Consumer] {
            loop {
                let cutoff = Utc::now() - self.settings.retry_delay;
                let batch = self
                    .store
                    .failed_batch(
                        failure,
                        self.settings.max_retries,
                        cutoff,
                        self.settings.batch_size,
                    )
                    .await?;
                if batch.is_empty() {
                    break;
                }
                let mut claimed = 0;
                for row in &batch {
                    match self.retry_candidate(row, MessageStatus::Failed, failure).await {
                        Ok(true) => claimed += 1,
                        Ok(false) => {}
                        Err(err) => {
                            error!(message_id = %row.message_id, "Retry cycle failed: {err}");
                        }
                    }
                }
                // A page that produced no claims cannot shrink; stop
                // instead of rescanning it forever.
                if claimed == 0 {
                    break;
                }
            }
        }

        self.rescue_stuck_pending().await
    }

    /// A PENDING row past the retry delay with no successful history entry
    /// never made it onto the bus; treat it as a publish failure.
    async fn rescue_stuck_pending(&self) -> CoreResult<()> {
        loop {
            let cutoff = Utc::now() - self.settings.retry_delay;
            let batch = self
                .store
                .stuck_pending_batch(cutoff, self.settings.max_retries, self.settings.batch_size)
                .await?;
            if batch.is_empty() {
                break;
            }

            let mut claimed = 0;
            for row in &batch {
                if self.ledger.history().has_success_entry(&row.message_id).await? {
                    continue;
                }
                match self
                    .retry_candidate(row, MessageStatus::Pending, FailureType::Publish)
                    .await
                {
                    Ok(true) => claimed += 1,
                    Ok(false) => {}
                    Err(err) => {
                        error!(message_id = %row.message_id, "Publish rescue failed: {err}");
                    }
                }
            }

            // Rows skipped for having succeeded already would repeat
            // forever; stop once a page produced no claims.
            if claimed == 0 || (batch.len() as u64) < self.settings.batch_size {
                break;
            }
        }
        Ok(())
    }

    /// Claim → re-read → DLQ-or-republish for one candidate. The claim is
    /// the cross-process mutual exclusion; losing it means another replica
    /// owns this cycle. Returns whether this replica won the claim.
    async fn retry_candidate(
        &self,
        row: &Message,
        from: MessageStatus,
        failure: FailureType,
    ) -> CoreResult<bool> {
        if !self.store.claim_for_retry(&row.message_id, from).await? {
            return Ok(false);
        }

        let Some(claimed) = self.store.find(&row.message_id).await? else {
            return Ok(true);
        };

        self.ledger
            .append(
                Some(from),
                StatusHistoryEntry::now(
                    claimed.message_id.clone(),
                    MessageStatus::Retrying,
                    claimed.retry_count,
                    HistorySource::Trigger,
                ),
            )
            .await?;

        if claimed.retry_count >= self.settings.max_retries {
            self.send_to_dlq(&claimed, failure).await?;
            return Ok(true);
        }

        let payload = DispatchPayload::from_message(&claimed);
        let topic = self.topics.topic(claimed.channel);

        // The claim is committed; only now may the payload reach the bus.
        match self
            .bus
            .publish(topic, &claimed.message_id, &payload)
            .await
        {
            Ok(()) => {
                if self.store.release_to_pending(&claimed.message_id).await? {
                    self.ledger
                        .append(
                            Some(MessageStatus::Retrying),
                            StatusHistoryEntry::now(
                                claimed.message_id.clone(),
                                MessageStatus::Pending,
                                claimed.retry_count,
                                HistorySource::Trigger,
                            ),
                        )
                        .await?;
                }
                info!(
                    message_id = %claimed.message_id,
                    retry_count = claimed.retry_count,
                    "Republished for retry"
                );
            }
            Err(publish_err) => {
                let error = sanitize(&format!("PUBLISH: {publish_err}"));
                warn!(message_id = %claimed.message_id, "Republish failed: {error}");
                if self
                    .store
                    .record_publish_failure(&claimed.message_id, &error)
                    .await?
                {
                    self.ledger
                        .append(
                            Some(MessageStatus::Retrying),
                            StatusHistoryEntry::now(
                                claimed.message_id.clone(),
                                MessageStatus::Failed,
                                claimed.retry_count,
                                HistorySource::Trigger,
                            )
                            .with_error(Some(error)),
                        )
                        .await?;
                }
                if claimed.retry_count >= self.settings.max_retries {
                    self.send_to_dlq(&claimed, FailureType::Publish).await?;
                }
            }
        }

        Ok(true)
    }

    /// Retries exhausted: payload goes to the channel DLQ and the row is
    /// held in FAILED with the exhaustion note.
    async fn send_to_dlq(&self, row: &Message, failure: FailureType) -> CoreResult<()> {
        let payload = DispatchPayload::from_message(row);
        let dlq = self.topics.dlq(row.channel);

        self.bus
            .send_to_dlq(dlq, &row.message_id, &payload)
            .await?;
        self.store
            .note_retries_exhausted(&row.message_id, failure)
            .await?;
        self.ledger
            .append(
                Some(MessageStatus::Retrying),
                StatusHistoryEntry::now(
                    row.message_id.clone(),
                    MessageStatus::Failed,
                    row.retry_count,
                    HistorySource::Trigger,
                )
                .with_error(Some("Max retries exceeded".to_string())),
            )
            .await?;
        self.metrics.dlq.inc();

        warn!(
            message_id = %row.message_id,
            dlq = %dlq,
            retry_count = row.retry_count,
            "Retries exhausted; sent to dead-letter queue"
        );
        Ok(())
    }

    /// Run the scan loop until `stop` is called
    pub async fn run(&self) {
        self.is_running.store(true, Ordering::SeqCst);
        info!(
            max_retries = self.settings.max_retries,
            "Retry controller started"
        );

        while self.is_running.load(Ordering::SeqCst) {
            if let Err(err) = self.tick().await {
                error!("Retry scan failed: {err}");
            }
            tokio::time::sleep(self.settings.scan_interval).await;
        }

        info!("Retry controller stopped");
    }

    pub fn stop(&self) {
        self.is_running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }
}
