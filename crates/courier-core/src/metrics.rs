//! Dispatch metrics
//!
//! Prometheus counters for the pipeline's business events, registered on a
//! dedicated registry so the export handler can encode exactly this set.

use prometheus::{Encoder, IntCounter, Registry, TextEncoder};
use std::sync::Arc;

/// Counters emitted by the pipeline
pub struct DispatchMetrics {
    registry: Registry,
    pub sent: IntCounter,
    pub delivered: IntCounter,
    pub failed: IntCounter,
    pub retried: IntCounter,
    pub dlq: IntCounter,
}

impl DispatchMetrics {
    /// Create and register the counter set
    pub fn new() -> Arc<Self> {
        let registry = Registry::new();

        let sent = IntCounter::new("messages_sent_total", "Accepted send requests").expect("valid metric");
        let delivered =
            IntCounter::new("messages_delivered_total", "Messages delivered by a provider")
                .expect("valid metric");
        let failed = IntCounter::new("messages_failed_total", "Messages that entered FAILED")
            .expect("valid metric");
        let retried = IntCounter::new("messages_retried_total", "Retry cycles started")
            .expect("valid metric");
        let dlq = IntCounter::new("messages_dlq_total", "Messages sent to a dead-letter queue")
            .expect("valid metric");

        for counter in [&sent, &delivered, &failed, &retried, &dlq] {
            registry
                .register(Box::new(counter.clone()))
                .expect("unique metric registration");
        }

        Arc::new(Self {
            registry,
            sent,
            delivered,
            failed,
            retried,
            dlq,
        })
    }

    /// Encode the registry in Prometheus text format
    pub fn encode(&self) -> String {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        if encoder
            .encode(&self.registry.gather(), &mut buffer)
            .is_err()
        {
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_start_at_zero() {
        let metrics = DispatchMetrics::new();

        assert_eq!(metrics.sent.get(), 0);
        assert_eq!(metrics.delivered.get(), 0);
        assert_eq!(metrics.dlq.get(), 0);
    }

    #[test]
    fn test_encode_contains_counter_names() {
        let metrics = DispatchMetrics::new();
        metrics.sent.inc();
        metrics.retried.inc();

        let text = metrics.encode();
        assert!(text.contains("messages_sent_total 1"));
        assert!(text.contains("messages_retried_total 1"));
        assert!(text.contains("messages_dlq_total 0"));
    }
}
