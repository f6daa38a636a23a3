//! Bus abstraction
//!
//! Publish-only interface for the ingress side, consume interface for
//! workers, and the channel → topic/DLQ mapping. A payload must never be
//! visible on the bus before its message row is committed; callers publish
//! strictly after their transaction completes.

pub mod memory;
pub mod redis_bus;

use crate::errors::CoreResult;
use crate::model::Channel;
use crate::payload::DispatchPayload;
use async_trait::async_trait;

pub use memory::MemoryBus;
pub use redis_bus::RedisBus;

/// One record received from a topic
#[derive(Debug, Clone, PartialEq)]
pub struct BusRecord {
    /// Record key as published (the message id); workers fall back to this
    /// when the payload itself carries no id.
    pub key: Option<String>,
    /// Raw JSON payload
    pub value: String,
    /// Opaque acknowledge handle for this delivery
    pub receipt: String,
}

/// Transport for channel topics and dead-letter queues.
///
/// `receive` moves a record into an in-flight holding area;
/// `ack` removes it once the consumer has persisted the outcome. Workers
/// acknowledge only after the status update completes.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Publish a payload to a topic, keyed by message id
    async fn publish(&self, topic: &str, key: &str, payload: &DispatchPayload) -> CoreResult<()>;

    /// Pop the next record from a topic into the in-flight area, if any
    async fn receive(&self, topic: &str) -> CoreResult<Option<BusRecord>>;

    /// Acknowledge a received record, removing it from the in-flight area
    async fn ack(&self, topic: &str, receipt: &str) -> CoreResult<()>;

    /// Send a payload to a dead-letter queue
    async fn send_to_dlq(&self, dlq: &str, key: &str, payload: &DispatchPayload) -> CoreResult<()> {
        self.publish(dlq, key, payload).await
    }
}

/// Channel → destination names, read once from configuration at startup
#[derive(Debug, Clone, PartialEq)]
pub struct TopicMap {
    pub email_topic: String,
    pub whatsapp_topic: String,
    pub email_dlq: String,
    pub whatsapp_dlq: String,
}

impl TopicMap {
    /// Topic for a channel
    pub fn topic(&self, channel: Channel) -> &str {
        match channel {
            Channel::Email => &self.email_topic,
            Channel::Whatsapp => &self.whatsapp_topic,
        }
    }

    /// Dead-letter queue for a channel
    pub fn dlq(&self, channel: Channel) -> &str {
        match channel {
            Channel::Email => &self.email_dlq,
            Channel::Whatsapp => &self.whatsapp_dlq,
        }
    }
}

impl Default for TopicMap {
    fn default() -> Self {
        Self {
            email_topic: "notifications-email".to_string(),
            whatsapp_topic: "notifications-whatsapp".to_string(),
            email_dlq: "notifications-email-dlq".to_string(),
            whatsapp_dlq: "notifications-whatsapp-dlq".to_string(),
        }
    }
}
