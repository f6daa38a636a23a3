//! In-memory bus
//!
//! Mirrors the Redis transport's semantics with process-local queues:
//! FIFO per topic, receive moves records into an in-flight list, ack
//! removes them. Used by the pipeline tests and by local runs without
//! Redis; publish failures can be injected to exercise the retry
//! controller's rescue path.

use crate::bus::{BusRecord, MessageBus};
use crate::errors::{CoreError, CoreResult};
use crate::payload::DispatchPayload;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Process-local FIFO queues keyed by topic
#[derive(Default)]
pub struct MemoryBus {
    queues: Mutex<HashMap<String, VecDeque<BusRecord>>>,
    in_flight: Mutex<HashMap<String, Vec<BusRecord>>>,
    publish_failures: AtomicUsize,
    receipt_counter: AtomicUsize,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` publish calls fail
    pub fn inject_publish_failures(&self, count: usize) {
        self.publish_failures.store(count, Ordering::SeqCst);
    }

    /// Number of records currently queued on a topic
    pub fn len(&self, topic: &str) -> usize {
        self.queues
            .lock()
            .unwrap()
            .get(topic)
            .map(VecDeque::len)
            .unwrap_or(0)
    }

    pub fn is_empty(&self, topic: &str) -> bool {
        self.len(topic) == 0
    }

    /// Number of received-but-unacknowledged records on a topic
    pub fn in_flight_len(&self, topic: &str) -> usize {
        self.in_flight
            .lock()
            .unwrap()
            .get(topic)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

#[async_trait]
impl MessageBus for MemoryBus {
    async fn publish(&self, topic: &str, key: &str, payload: &DispatchPayload) -> CoreResult<()> {
        let remaining = self.publish_failures.load(Ordering::SeqCst);
        if remaining > 0
            && self
                .publish_failures
                .compare_exchange(remaining, remaining - 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
        {
            return Err(CoreError::bus("injected publish failure"));
        }

        let receipt = self.receipt_counter.fetch_add(1, Ordering::SeqCst);
        let record = BusRecord {
            key: Some(key.to_string()),
            value: payload.to_json()?,
            receipt: receipt.to_string(),
        };
        self.queues
            .lock()
            .unwrap()
            .entry(topic.to_string())
            .or_default()
            .push_back(record);
        Ok(())
    }

    async fn receive(&self, topic: &str) -> CoreResult<Option<BusRecord>> {
        let record = self
            .queues
            .lock()
            .unwrap()
            .get_mut(topic)
            .and_then(VecDeque::pop_front);

        if let Some(record) = &record {
            self.in_flight
                .lock()
                .unwrap()
                .entry(topic.to_string())
                .or_default()
                .push(record.clone());
        }
        Ok(record)
    }

    async fn ack(&self, topic: &str, receipt: &str) -> CoreResult<()> {
        if let Some(records) = self.in_flight.lock().unwrap().get_mut(topic) {
            records.retain(|r| r.receipt != receipt);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Channel, Message};

    fn payload() -> DispatchPayload {
        DispatchPayload::from_message(&Message::new(Channel::Email, "u@x.com", None))
    }

    #[tokio::test]
    async fn test_fifo_order_and_ack() {
        let bus = MemoryBus::new();
        let first = payload();
        let second = payload();

        bus.publish("t", &first.message_id, &first).await.unwrap();
        bus.publish("t", &second.message_id, &second).await.unwrap();

        let got = bus.receive("t").await.unwrap().unwrap();
        assert_eq!(got.key.as_deref(), Some(first.message_id.as_str()));
        assert_eq!(bus.in_flight_len("t"), 1);

        bus.ack("t", &got.receipt).await.unwrap();
        assert_eq!(bus.in_flight_len("t"), 0);

        let got = bus.receive("t").await.unwrap().unwrap();
        assert_eq!(got.key.as_deref(), Some(second.message_id.as_str()));
        assert!(bus.receive("t").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_injected_publish_failure() {
        let bus = MemoryBus::new();
        bus.inject_publish_failures(1);

        let p = payload();
        assert!(bus.publish("t", &p.message_id, &p).await.is_err());
        // Only the injected call fails; the next one goes through.
        bus.publish("t", &p.message_id, &p).await.unwrap();
        assert_eq!(bus.len("t"), 1);
    }

    #[tokio::test]
    async fn test_dlq_send_uses_publish_path() {
        let bus = MemoryBus::new();
        let p = payload();

        bus.send_to_dlq("t-dlq", &p.message_id, &p).await.unwrap();
        assert_eq!(bus.len("t-dlq"), 1);
    }
}
