//! Channel worker loop
//!
//! One worker per channel polls that channel's topic and feeds records to
//! the dispatch service. A record is acknowledged only after its status
//! update has been persisted; on infrastructure errors the record stays
//! in-flight and the loop backs off.

use crate::services::DispatchService;
use courier_core::bus::{MessageBus, TopicMap};
use courier_core::errors::CoreResult;
use courier_core::model::Channel;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Polling consumer for one channel topic
pub struct ChannelWorker {
    channel: Channel,
    bus: Arc<dyn MessageBus>,
    topics: TopicMap,
    dispatch: Arc<DispatchService>,
    poll_interval: Duration,
    is_running: Arc<AtomicBool>,
}

impl ChannelWorker {
    pub fn new(
        channel: Channel,
        bus: Arc<dyn MessageBus>,
        topics: TopicMap,
        dispatch: Arc<DispatchService>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            channel,
            bus,
            topics,
            dispatch,
            poll_interval,
            is_running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Receive and process one record. Returns `Ok(false)` when the topic
    /// was empty.
    async fn step(&self) -> CoreResult<bool> {
        let topic = self.topics.topic(self.channel);
        let Some(record) = self.bus.receive(topic).await? else {
            return Ok(false);
        };

        match self.dispatch.process_record(&record).await {
            Ok(()) => {
                // Status is persisted; the delivery may now be forgotten.
                self.bus.ack(topic, &record.receipt).await?;
            }
            Err(err) => {
                // Leave the record unacknowledged; the store was not
                // reachable enough to even mark a failure.
                error!(
                    channel = %self.channel,
                    key = ?record.key,
                    "Processing failed, leaving record in flight: {err}"
                );
            }
        }
        Ok(true)
    }

    /// Process records until the topic is empty; returns how many were
    /// handled. Used by tests and by drain-on-shutdown.
    pub async fn drain(&self) -> CoreResult<usize> {
        let mut processed = 0;
        while self.step().await? {
            processed += 1;
        }
        Ok(processed)
    }

    /// Run the polling loop until `stop` is called
    pub async fn run(&self) {
        self.is_running.store(true, Ordering::SeqCst);
        info!(channel = %self.channel, "Channel worker started");

        while self.is_running.load(Ordering::SeqCst) {
            match self.step().await {
                Ok(true) => {}
                Ok(false) => tokio::time::sleep(self.poll_interval).await,
                Err(err) => {
                    error!(channel = %self.channel, "Worker receive failed: {err}");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }

        info!(channel = %self.channel, "Channel worker stopped");
    }

    pub fn stop(&self) {
        self.is_running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }
}
