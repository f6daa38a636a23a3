//! Ingress service
//!
//! Translates a validated send request into exactly one message row and
//! one bus publication. The publish runs strictly after the insert has
//! committed; a payload must never be visible on the bus before its row
//! exists. A publish failure leaves the committed PENDING row for the
//! retry controller's rescue rule.

use chrono::{DateTime, Utc};
use courier_core::bus::{MessageBus, TopicMap};
use courier_core::errors::{CoreError, CoreResult};
use courier_core::ledger::StatusLedger;
use courier_core::metrics::DispatchMetrics;
use courier_core::model::{Channel, HistorySource, Message, MessageStatus, Site, StatusHistoryEntry};
use courier_core::payload::DispatchPayload;
use courier_core::store::MessageStore;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};
use validator::Validate;

/// `POST /send` request body
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SendRequest {
    pub channel: Channel,
    #[validate(length(min = 1, message = "recipient must not be empty"))]
    pub recipient: String,
    pub subject: Option<String>,
    pub body: Option<String>,
    #[serde(default)]
    pub is_html: bool,
    pub image_url: Option<String>,
    pub video_url: Option<String>,
    pub document_url: Option<String>,
    pub file_name: Option<String>,
    pub caption: Option<String>,
    pub from_email: Option<String>,
    pub from_name: Option<String>,
    pub whatsapp_session_name: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Accepts validated requests into the message log
pub struct IngressService {
    store: Arc<dyn MessageStore>,
    ledger: Arc<StatusLedger>,
    bus: Arc<dyn MessageBus>,
    topics: TopicMap,
    metrics: Arc<DispatchMetrics>,
}

impl IngressService {
    pub fn new(
        store: Arc<dyn MessageStore>,
        ledger: Arc<StatusLedger>,
        bus: Arc<dyn MessageBus>,
        topics: TopicMap,
        metrics: Arc<DispatchMetrics>,
    ) -> Self {
        Self {
            store,
            ledger,
            bus,
            topics,
            metrics,
        }
    }

    /// Accept a send request for the authenticated site (`None` for the
    /// global email path) and return the generated message id.
    pub async fn accept(&self, request: SendRequest, site: Option<&Site>) -> CoreResult<String> {
        request
            .validate()
            .map_err(|e| CoreError::validation(e.to_string()))?;

        if request.channel == Channel::Email
            && request.body.as_deref().map_or(true, str::is_empty)
        {
            return Err(CoreError::validation("body is required for EMAIL sends"));
        }
        if request.channel == Channel::Whatsapp && site.is_none() {
            return Err(CoreError::validation(
                "WHATSAPP sends require an authenticated site",
            ));
        }
        if let Some(at) = request.scheduled_at {
            if at <= Utc::now() {
                return Err(CoreError::validation(
                    "scheduledAt must be strictly in the future",
                ));
            }
        }

        let mut message = Message::new(request.channel, request.recipient, site.map(|s| s.id))
            .with_body(request.subject, request.body, request.is_html)
            .with_media(
                request.image_url,
                request.video_url,
                request.document_url,
                request.file_name,
                request.caption,
            )
            .with_sender(request.from_email, request.from_name)
            .with_session(request.whatsapp_session_name)
            .with_metadata(request.metadata);
        if let Some(at) = request.scheduled_at {
            message = message.with_schedule(at);
        }

        self.store.insert(&message).await?;
        self.ledger
            .append(
                None,
                StatusHistoryEntry::now(
                    message.message_id.clone(),
                    message.status,
                    0,
                    HistorySource::Api,
                ),
            )
            .await?;
        self.metrics.sent.inc();

        info!(
            message_id = %message.message_id,
            channel = %message.channel,
            status = %message.status,
            "Accepted send request"
        );

        // Scheduled rows wait for the scheduler; everything else goes to
        // the bus now that the row is committed.
        if message.status == MessageStatus::Pending {
            let payload = DispatchPayload::from_message(&message);
            if let Err(err) = self
                .bus
                .publish(
                    self.topics.topic(message.channel),
                    &message.message_id,
                    &payload,
                )
                .await
            {
                // The row stays PENDING; the retry controller treats it as
                // a publish failure once it exceeds the retry delay.
                warn!(
                    message_id = %message.message_id,
                    "Publish after accept failed: {err}"
                );
            }
        }

        Ok(message.message_id)
    }
}
