//! Per-record dispatch flow
//!
//! The channel workers hand every received bus record to this service:
//! parse, idempotency gate, tenant verification, credential resolution,
//! provider call, terminal status update, history append. The flow never
//! errors for business failures; those end as FAILED rows. An `Err` return
//! means infrastructure trouble (store unreachable) and tells the worker
//! loop to leave the record unacknowledged.

use crate::services::resolver::CredentialResolver;
use chrono::Utc;
use courier_core::bus::BusRecord;
use courier_core::errors::{CoreError, CoreResult};
use courier_core::ledger::StatusLedger;
use courier_core::model::{
    Channel, FailureCategory, HistorySource, Message, MessageStatus, StatusHistoryEntry,
};
use courier_core::payload::DispatchPayload;
use courier_core::sanitize::sanitize;
use courier_core::store::MessageStore;
use courier_providers::{Provider, SendOutcome};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Worker-side processing shared by all channels
pub struct DispatchService {
    store: Arc<dyn MessageStore>,
    ledger: Arc<StatusLedger>,
    resolver: CredentialResolver,
    email_provider: Arc<dyn Provider>,
    whatsapp_provider: Arc<dyn Provider>,
}

impl DispatchService {
    pub fn new(
        store: Arc<dyn MessageStore>,
        ledger: Arc<StatusLedger>,
        resolver: CredentialResolver,
        email_provider: Arc<dyn Provider>,
        whatsapp_provider: Arc<dyn Provider>,
    ) -> Self {
        Self {
            store,
            ledger,
            resolver,
            email_provider,
            whatsapp_provider,
        }
    }

    fn provider_for(&self, channel: Channel) -> &Arc<dyn Provider> {
        match channel {
            Channel::Email => &self.email_provider,
            Channel::Whatsapp => &self.whatsapp_provider,
        }
    }

    fn is_deliverable(status: MessageStatus) -> bool {
        matches!(
            status,
            MessageStatus::Pending | MessageStatus::Retrying | MessageStatus::Sent
        )
    }

    /// Process one received record end-to-end. `Ok(())` means the record
    /// may be acknowledged.
    pub async fn process_record(&self, record: &BusRecord) -> CoreResult<()> {
        let payload = match DispatchPayload::parse(&record.value) {
            Ok(payload) => payload,
            Err(parse_err) => {
                // Fall back to the bus-native identifier; a record with no
                // identity at all is reported and dropped.
                let Some(message_id) = record.key.clone() else {
                    error!("Discarding bus record with no message identifier");
                    return Ok(());
                };
                let Some(row) = self.store.find(&message_id).await? else {
                    error!(message_id = %message_id, "Discarding malformed record for unknown message");
                    return Ok(());
                };
                if !Self::is_deliverable(row.status) {
                    return Ok(());
                }
                return self
                    .record_failure(
                        &row,
                        FailureCategory::Temporary,
                        format!("malformed bus payload: {parse_err}"),
                    )
                    .await;
            }
        };

        let message_id = payload.message_id.clone();
        let Some(row) = self.store.find(&message_id).await? else {
            warn!(message_id = %message_id, "Record references an unknown message; discarding");
            return Ok(());
        };

        // Idempotency gate: only PENDING, RETRYING, and SENT rows are
        // deliverable. A redelivered record for anything else (DELIVERED,
        // FAILED awaiting the retry controller, ...) is acknowledged
        // without another provider call.
        if !Self::is_deliverable(row.status) {
            debug!(
                message_id = %message_id,
                status = %row.status,
                "Not in a deliverable state; acknowledging without send"
            );
            return Ok(());
        }

        // Tenant verification against the stored row, not the payload.
        if row.site_id != payload.site_id {
            return self
                .record_failure(
                    &row,
                    FailureCategory::Config,
                    "Tenant isolation violation: payload siteId does not match message tenant"
                        .to_string(),
                )
                .await;
        }

        let credentials = match self.resolver.resolve(&payload).await {
            Ok(credentials) => credentials,
            Err(CoreError::TenantMismatch(msg)) => {
                return self
                    .record_failure(
                        &row,
                        FailureCategory::Config,
                        format!("Tenant isolation violation: {msg}"),
                    )
                    .await;
            }
            Err(CoreError::Configuration(msg)) => {
                return self.record_failure(&row, FailureCategory::Config, msg).await;
            }
            Err(other) => {
                // Store/directory trouble: worth another delivery attempt.
                return self
                    .record_failure(&row, FailureCategory::Temporary, other.to_string())
                    .await;
            }
        };

        match self
            .provider_for(row.channel)
            .send(&payload, &credentials)
            .await
        {
            SendOutcome::Delivered => {
                let now = Utc::now();
                if self.store.mark_delivered(&message_id, now).await? {
                    self.ledger
                        .append(
                            Some(row.status),
                            StatusHistoryEntry::now(
                                message_id.clone(),
                                MessageStatus::Delivered,
                                row.retry_count,
                                HistorySource::Worker,
                            ),
                        )
                        .await?;
                    info!(message_id = %message_id, channel = %row.channel, "Delivered");
                } else {
                    // Lost the terminal race; the row already holds its
                    // final state.
                    debug!(message_id = %message_id, "Terminal update skipped");
                }
                Ok(())
            }
            SendOutcome::Failed { category, message } => {
                self.record_failure(&row, category, message).await
            }
        }
    }

    /// Consumer failure path: FAILED + CONSUMER with a sanitized error.
    /// Never touches `retry_count`, never publishes to the DLQ; both
    /// belong to the retry controller.
    async fn record_failure(
        &self,
        row: &Message,
        category: FailureCategory,
        message: String,
    ) -> CoreResult<()> {
        let error = sanitize(&format!("{category}: {message}"));
        warn!(
            message_id = %row.message_id,
            category = %category,
            "Send failed: {error}"
        );

        if self
            .store
            .mark_consumer_failed(&row.message_id, &error)
            .await?
        {
            self.ledger
                .append(
                    Some(row.status),
                    StatusHistoryEntry::now(
                        row.message_id.clone(),
                        MessageStatus::Failed,
                        row.retry_count,
                        HistorySource::Worker,
                    )
                    .with_error(Some(error)),
                )
                .await?;
        }
        Ok(())
    }
}
