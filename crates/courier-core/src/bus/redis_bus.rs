//! Redis-backed bus transport
//!
//! Each topic and DLQ is a Redis list; records are pushed with LPUSH and
//! popped with RPOP, so a topic behaves as a FIFO queue shared by all
//! worker replicas. Records carry an envelope with the publish key so
//! workers can recover an identifier even from payloads that lost theirs.

use crate::bus::{BusRecord, MessageBus};
use crate::errors::{CoreError, CoreResult};
use crate::payload::DispatchPayload;
use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client as RedisClient};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Serialize, Deserialize)]
struct Envelope {
    key: String,
    value: String,
}

/// Redis list transport for channel topics and DLQs
#[derive(Clone)]
pub struct RedisBus {
    connection_manager: ConnectionManager,
    key_prefix: String,
}

impl RedisBus {
    /// Connect to Redis; `key_prefix` namespaces all queue keys
    pub async fn new(redis_url: &str, key_prefix: Option<String>) -> CoreResult<Self> {
        let client = RedisClient::open(redis_url)
            .map_err(|e| CoreError::bus(format!("Failed to create Redis client: {e}")))?;

        let connection_manager = ConnectionManager::new(client)
            .await
            .map_err(|e| CoreError::bus(format!("Failed to create connection manager: {e}")))?;

        Ok(Self {
            connection_manager,
            key_prefix: key_prefix.unwrap_or_else(|| "courier:bus:".to_string()),
        })
    }

    fn topic_key(&self, topic: &str) -> String {
        format!("{}{}", self.key_prefix, topic)
    }

    fn processing_key(&self, topic: &str) -> String {
        format!("{}{}:processing", self.key_prefix, topic)
    }
}

#[async_trait]
impl MessageBus for RedisBus {
    async fn publish(&self, topic: &str, key: &str, payload: &DispatchPayload) -> CoreResult<()> {
        let mut conn = self.connection_manager.clone();
        let envelope = serde_json::to_string(&Envelope {
            key: key.to_string(),
            value: payload.to_json()?,
        })?;

        let topic_key = self.topic_key(topic);
        let _: () = conn
            .lpush(&topic_key, &envelope)
            .await
            .map_err(|e| CoreError::bus(format!("Failed to publish to {topic}: {e}")))?;

        debug!(topic = %topic, key = %key, "Published record");
        Ok(())
    }

    async fn receive(&self, topic: &str) -> CoreResult<Option<BusRecord>> {
        let mut conn = self.connection_manager.clone();
        let topic_key = self.topic_key(topic);
        let processing_key = self.processing_key(topic);

        // Move the record into the processing list so an unacknowledged
        // delivery stays visible instead of vanishing with the pop.
        let raw: Option<String> = conn
            .rpoplpush(&topic_key, &processing_key)
            .await
            .map_err(|e| CoreError::bus(format!("Failed to receive from {topic}: {e}")))?;

        match raw {
            Some(raw) => {
                let envelope: Envelope = serde_json::from_str(&raw)?;
                debug!(topic = %topic, key = %envelope.key, "Received record");
                Ok(Some(BusRecord {
                    key: Some(envelope.key),
                    value: envelope.value,
                    receipt: raw,
                }))
            }
            None => Ok(None),
        }
    }

    async fn ack(&self, topic: &str, receipt: &str) -> CoreResult<()> {
        let mut conn = self.connection_manager.clone();
        let processing_key = self.processing_key(topic);

        let _: () = conn
            .lrem(&processing_key, 1, receipt)
            .await
            .map_err(|e| CoreError::bus(format!("Failed to ack on {topic}: {e}")))?;
        Ok(())
    }
}
