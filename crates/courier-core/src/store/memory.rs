//! In-memory store implementations
//!
//! Mirror the SQL repositories' conditional-update semantics over locked
//! maps. Used by the pipeline tests and by local runs without a database;
//! the compare-and-set behavior must stay equivalent to the SeaORM
//! implementations in `courier-db`.

use crate::errors::{CoreError, CoreResult};
use crate::model::{
    ChannelSession, FailureType, GlobalProviderConfig, Message, MessageStatus, Site,
    StatusHistoryEntry,
};
use crate::store::{HistoryStore, MessageStore, TenantDirectory};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

/// Message log over a locked map
#[derive(Default)]
pub struct MemoryMessageStore {
    rows: Mutex<HashMap<String, Message>>,
}

impl MemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of one row; test helper
    pub fn snapshot(&self, message_id: &str) -> Option<Message> {
        self.rows.lock().unwrap().get(message_id).cloned()
    }

    /// Snapshot of every row; test helper for invariant sweeps
    pub fn all(&self) -> Vec<Message> {
        self.rows.lock().unwrap().values().cloned().collect()
    }

    fn update<F>(&self, message_id: &str, condition: impl Fn(&Message) -> bool, apply: F) -> bool
    where
        F: FnOnce(&mut Message),
    {
        let mut rows = self.rows.lock().unwrap();
        match rows.get_mut(message_id) {
            Some(row) if condition(row) => {
                apply(row);
                row.updated_at = Utc::now();
                true
            }
            _ => false,
        }
    }
}

#[async_trait]
impl MessageStore for MemoryMessageStore {
    async fn insert(&self, message: &Message) -> CoreResult<()> {
        if message.requires_site() && message.site_id.is_none() {
            return Err(CoreError::validation(
                "WHATSAPP messages require a tenant binding",
            ));
        }
        let mut rows = self.rows.lock().unwrap();
        if rows.contains_key(&message.message_id) {
            return Err(CoreError::store(format!(
                "duplicate message id {}",
                message.message_id
            )));
        }
        rows.insert(message.message_id.clone(), message.clone());
        Ok(())
    }

    async fn find(&self, message_id: &str) -> CoreResult<Option<Message>> {
        Ok(self.rows.lock().unwrap().get(message_id).cloned())
    }

    async fn claim_for_retry(&self, message_id: &str, from: MessageStatus) -> CoreResult<bool> {
        Ok(self.update(
            message_id,
            |row| row.status == from,
            |row| {
                row.status = MessageStatus::Retrying;
                row.failure_type = None;
                row.retry_count += 1;
            },
        ))
    }

    async fn release_to_pending(&self, message_id: &str) -> CoreResult<bool> {
        Ok(self.update(
            message_id,
            |row| row.status == MessageStatus::Retrying,
            |row| {
                row.status = MessageStatus::Pending;
                row.failure_type = None;
                row.error_message = None;
            },
        ))
    }

    async fn mark_delivered(&self, message_id: &str, at: DateTime<Utc>) -> CoreResult<bool> {
        Ok(self.update(
            message_id,
            |row| !row.status.is_terminal(),
            |row| {
                row.status = MessageStatus::Delivered;
                row.sent_at = Some(at);
                row.delivered_at = Some(at);
                row.failure_type = None;
                row.error_message = None;
            },
        ))
    }

    async fn mark_consumer_failed(&self, message_id: &str, error: &str) -> CoreResult<bool> {
        let error = error.to_string();
        Ok(self.update(
            message_id,
            |row| !row.status.is_terminal(),
            move |row| {
                row.status = MessageStatus::Failed;
                row.failure_type = Some(FailureType::Consumer);
                row.error_message = Some(error);
            },
        ))
    }

    async fn record_publish_failure(&self, message_id: &str, error: &str) -> CoreResult<bool> {
        let error = error.to_string();
        Ok(self.update(
            message_id,
            |row| row.status == MessageStatus::Retrying,
            move |row| {
                row.status = MessageStatus::Failed;
                row.failure_type = Some(FailureType::Publish);
                row.error_message = Some(error);
            },
        ))
    }

    async fn note_retries_exhausted(
        &self,
        message_id: &str,
        failure: FailureType,
    ) -> CoreResult<()> {
        self.update(
            message_id,
            |row| !row.status.is_terminal(),
            |row| {
                let prior = row.error_message.take();
                row.status = MessageStatus::Failed;
                row.failure_type = Some(failure);
                row.error_message = Some(match prior {
                    Some(prior) if !prior.is_empty() => {
                        format!("Max retries exceeded; last error: {prior}")
                    }
                    _ => "Max retries exceeded".to_string(),
                });
            },
        );
        Ok(())
    }

    async fn promote_scheduled(&self, message_id: &str) -> CoreResult<bool> {
        Ok(self.update(
            message_id,
            |row| row.status == MessageStatus::Scheduled,
            |row| {
                row.status = MessageStatus::Pending;
                row.scheduled_at = None;
                row.failure_type = None;
            },
        ))
    }

    async fn failed_batch(
        &self,
        failure: FailureType,
        max_retries: i32,
        older_than: DateTime<Utc>,
        limit: u64,
    ) -> CoreResult<Vec<Message>> {
        let rows = self.rows.lock().unwrap();
        let mut batch: Vec<Message> = rows
            .values()
            .filter(|row| {
                row.status == MessageStatus::Failed
                    && row.failure_type == Some(failure)
                    && row.retry_count < max_retries
                    && row.created_at < older_than
            })
            .cloned()
            .collect();
        batch.sort_by_key(|row| row.created_at);
        batch.truncate(limit as usize);
        Ok(batch)
    }

    async fn stuck_pending_batch(
        &self,
        older_than: DateTime<Utc>,
        max_retries: i32,
        limit: u64,
    ) -> CoreResult<Vec<Message>> {
        let rows = self.rows.lock().unwrap();
        let mut batch: Vec<Message> = rows
            .values()
            .filter(|row| {
                row.status == MessageStatus::Pending
                    && row.retry_count < max_retries
                    && row.updated_at < older_than
            })
            .cloned()
            .collect();
        batch.sort_by_key(|row| row.updated_at);
        batch.truncate(limit as usize);
        Ok(batch)
    }

    async fn due_scheduled_batch(
        &self,
        now: DateTime<Utc>,
        limit: u64,
    ) -> CoreResult<Vec<Message>> {
        let rows = self.rows.lock().unwrap();
        let mut batch: Vec<Message> = rows
            .values()
            .filter(|row| {
                row.status == MessageStatus::Scheduled
                    && row.scheduled_at.is_some_and(|at| at <= now)
            })
            .cloned()
            .collect();
        batch.sort_by_key(|row| row.scheduled_at);
        batch.truncate(limit as usize);
        Ok(batch)
    }
}

/// Append-only history over a locked vec
#[derive(Default)]
pub struct MemoryHistoryStore {
    entries: Mutex<Vec<StatusHistoryEntry>>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn append(&self, entry: &StatusHistoryEntry) -> CoreResult<()> {
        self.entries.lock().unwrap().push(entry.clone());
        Ok(())
    }

    async fn last_timestamp(
        &self,
        message_id: &str,
        status: MessageStatus,
    ) -> CoreResult<Option<DateTime<Utc>>> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.message_id == message_id && e.status == status)
            .map(|e| e.timestamp)
            .max())
    }

    async fn has_success_entry(&self, message_id: &str) -> CoreResult<bool> {
        Ok(self.entries.lock().unwrap().iter().any(|e| {
            e.message_id == message_id
                && matches!(e.status, MessageStatus::Sent | MessageStatus::Delivered)
        }))
    }

    async fn entries(&self, message_id: &str) -> CoreResult<Vec<StatusHistoryEntry>> {
        let mut entries: Vec<StatusHistoryEntry> = self
            .entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.message_id == message_id)
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.timestamp);
        Ok(entries)
    }
}

/// Tenant lookups over locked maps
#[derive(Default)]
pub struct MemoryTenantDirectory {
    sites: Mutex<HashMap<Uuid, Site>>,
    sessions: Mutex<HashMap<String, ChannelSession>>,
    global_config: Mutex<Option<GlobalProviderConfig>>,
}

impl MemoryTenantDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_site(&self, site: Site) {
        self.sites.lock().unwrap().insert(site.id, site);
    }

    pub fn add_session(&self, session: ChannelSession) {
        self.sessions
            .lock()
            .unwrap()
            .insert(session.session_name.clone(), session);
    }

    pub fn set_global_config(&self, config: GlobalProviderConfig) {
        *self.global_config.lock().unwrap() = Some(config);
    }
}

#[async_trait]
impl TenantDirectory for MemoryTenantDirectory {
    async fn find_active_site(&self, site_id: Uuid) -> CoreResult<Option<Site>> {
        Ok(self
            .sites
            .lock()
            .unwrap()
            .get(&site_id)
            .filter(|s| s.is_active)
            .cloned())
    }

    async fn find_active_site_by_api_key_hash(&self, hash: &str) -> CoreResult<Option<Site>> {
        Ok(self
            .sites
            .lock()
            .unwrap()
            .values()
            .find(|s| s.is_active && s.api_key_hash == hash)
            .cloned())
    }

    async fn find_active_session(&self, session_name: &str) -> CoreResult<Option<ChannelSession>> {
        Ok(self
            .sessions
            .lock()
            .unwrap()
            .get(session_name)
            .filter(|s| s.is_active)
            .cloned())
    }

    async fn active_global_config(&self) -> CoreResult<Option<GlobalProviderConfig>> {
        Ok(self
            .global_config
            .lock()
            .unwrap()
            .clone()
            .filter(|c| c.is_active))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Channel;

    async fn store_with(message: Message) -> (MemoryMessageStore, String) {
        let store = MemoryMessageStore::new();
        let id = message.message_id.clone();
        store.insert(&message).await.unwrap();
        (store, id)
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicate_ids() {
        let store = MemoryMessageStore::new();
        let message = Message::new(Channel::Email, "u@x.com", None);

        store.insert(&message).await.unwrap();
        assert!(store.insert(&message).await.is_err());
    }

    #[tokio::test]
    async fn test_insert_rejects_whatsapp_without_site() {
        let store = MemoryMessageStore::new();
        let message = Message::new(Channel::Whatsapp, "5511999990000", None);

        assert!(store.insert(&message).await.is_err());
    }

    #[tokio::test]
    async fn test_claim_is_exclusive() {
        let mut message = Message::new(Channel::Email, "u@x.com", None);
        message.status = MessageStatus::Failed;
        message.failure_type = Some(FailureType::Consumer);
        let (store, id) = store_with(message).await;

        assert!(store.claim_for_retry(&id, MessageStatus::Failed).await.unwrap());
        // Second claim loses: the row is already RETRYING.
        assert!(!store.claim_for_retry(&id, MessageStatus::Failed).await.unwrap());

        let row = store.snapshot(&id).unwrap();
        assert_eq!(row.status, MessageStatus::Retrying);
        assert_eq!(row.retry_count, 1);
        assert!(row.failure_type.is_none());
    }

    #[tokio::test]
    async fn test_late_worker_cannot_overwrite_delivered() {
        let (store, id) = store_with(Message::new(Channel::Email, "u@x.com", None)).await;

        assert!(store.mark_delivered(&id, Utc::now()).await.unwrap());
        assert!(!store.mark_consumer_failed(&id, "late failure").await.unwrap());
        assert!(!store.mark_delivered(&id, Utc::now()).await.unwrap());

        let row = store.snapshot(&id).unwrap();
        assert_eq!(row.status, MessageStatus::Delivered);
        assert!(row.error_message.is_none());
    }

    #[tokio::test]
    async fn test_consumer_failure_never_touches_retry_count() {
        let (store, id) = store_with(Message::new(Channel::Email, "u@x.com", None)).await;

        store.mark_consumer_failed(&id, "provider 503").await.unwrap();

        let row = store.snapshot(&id).unwrap();
        assert_eq!(row.status, MessageStatus::Failed);
        assert_eq!(row.failure_type, Some(FailureType::Consumer));
        assert_eq!(row.retry_count, 0);
        assert!(row.failure_state_consistent());
    }

    #[tokio::test]
    async fn test_exhaustion_preserves_prior_cause() {
        let mut message = Message::new(Channel::Email, "u@x.com", None);
        message.status = MessageStatus::Retrying;
        message.error_message = Some("provider 503".to_string());
        message.retry_count = 3;
        let (store, id) = store_with(message).await;

        store
            .note_retries_exhausted(&id, FailureType::Consumer)
            .await
            .unwrap();

        let row = store.snapshot(&id).unwrap();
        assert_eq!(row.status, MessageStatus::Failed);
        let error = row.error_message.unwrap();
        assert!(error.starts_with("Max retries exceeded"));
        assert!(error.contains("provider 503"));
    }

    #[tokio::test]
    async fn test_promote_scheduled_clears_schedule() {
        let message = Message::new(Channel::Email, "u@x.com", None)
            .with_schedule(Utc::now() - chrono::Duration::seconds(1));
        let (store, id) = store_with(message).await;

        assert!(store.promote_scheduled(&id).await.unwrap());
        assert!(!store.promote_scheduled(&id).await.unwrap());

        let row = store.snapshot(&id).unwrap();
        assert_eq!(row.status, MessageStatus::Pending);
        assert!(row.scheduled_at.is_none());
    }

    #[tokio::test]
    async fn test_failed_batch_filters_and_orders() {
        let store = MemoryMessageStore::new();
        let cutoff = Utc::now() + chrono::Duration::seconds(1);

        let mut eligible = Message::new(Channel::Email, "a@x.com", None);
        eligible.status = MessageStatus::Failed;
        eligible.failure_type = Some(FailureType::Consumer);
        let mut exhausted = Message::new(Channel::Email, "b@x.com", None);
        exhausted.status = MessageStatus::Failed;
        exhausted.failure_type = Some(FailureType::Consumer);
        exhausted.retry_count = 3;
        let mut wrong_type = Message::new(Channel::Email, "c@x.com", None);
        wrong_type.status = MessageStatus::Failed;
        wrong_type.failure_type = Some(FailureType::Publish);

        for m in [&eligible, &exhausted, &wrong_type] {
            store.insert(m).await.unwrap();
        }

        let batch = store
            .failed_batch(FailureType::Consumer, 3, cutoff, 50)
            .await
            .unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].message_id, eligible.message_id);
    }

    #[tokio::test]
    async fn test_history_last_timestamp_and_success_lookup() {
        let history = MemoryHistoryStore::new();
        let entry = StatusHistoryEntry::now("m1", MessageStatus::Pending, 0, HistorySource::Api);
        history.append(&entry).await.unwrap();

        assert!(history
            .last_timestamp("m1", MessageStatus::Pending)
            .await
            .unwrap()
            .is_some());
        assert!(history
            .last_timestamp("m1", MessageStatus::Delivered)
            .await
            .unwrap()
            .is_none());
        assert!(!history.has_success_entry("m1").await.unwrap());

        let delivered =
            StatusHistoryEntry::now("m1", MessageStatus::Delivered, 0, HistorySource::Worker);
        history.append(&delivered).await.unwrap();
        assert!(history.has_success_entry("m1").await.unwrap());
    }

    use crate::model::HistorySource;

    #[tokio::test]
    async fn test_tenant_directory_filters_inactive() {
        let directory = MemoryTenantDirectory::new();
        let site = Site {
            id: Uuid::new_v4(),
            site_name: "acme".to_string(),
            api_key_hash: "00".repeat(32),
            sendgrid_api_key: None,
            email_from_address: None,
            email_from_name: None,
            whatsapp_session_name: None,
            is_active: false,
        };
        let site_id = site.id;
        directory.add_site(site);

        assert!(directory.find_active_site(site_id).await.unwrap().is_none());
        assert!(directory
            .find_active_site_by_api_key_hash(&"00".repeat(32))
            .await
            .unwrap()
            .is_none());
    }
}
