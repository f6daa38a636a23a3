//! Repository tests against an in-memory SQLite database.
//!
//! The compare-and-set semantics here must match the in-memory stores in
//! `courier-core`; both are exercised by the same kinds of assertions.

use chrono::Utc;
use courier_core::model::{Channel, FailureType, Message, MessageStatus};
use courier_core::store::{HistoryStore, MessageStore, TenantDirectory};
use courier_core::model::{HistorySource, StatusHistoryEntry};
use courier_db::{
    establish_connection, migration, DatabaseConfig, SeaOrmHistoryStore, SeaOrmMessageStore,
    SeaOrmTenantDirectory, SecretCipher,
};
use sea_orm::ActiveValue::Set;
use sea_orm::{ActiveModelTrait, DatabaseConnection};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

async fn connect() -> Arc<DatabaseConnection> {
    // A single pooled connection keeps every query on the same in-memory
    // database.
    let config = DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
        min_connections: 1,
        ..Default::default()
    };
    let db = establish_connection(&config).await.unwrap();
    migration::run_migrations(&db).await.unwrap();
    Arc::new(db)
}

fn email_message() -> Message {
    Message::new(Channel::Email, "u@x.com", None)
        .with_body(Some("Hi".to_string()), Some("hello".to_string()), false)
        .with_metadata(HashMap::from([("campaign".to_string(), "spring".to_string())]))
}

#[tokio::test]
async fn insert_and_find_round_trip() {
    let db = connect().await;
    let store = SeaOrmMessageStore::new(db);

    let message = email_message();
    store.insert(&message).await.unwrap();

    let found = store.find(&message.message_id).await.unwrap().unwrap();
    assert_eq!(found.message_id, message.message_id);
    assert_eq!(found.status, MessageStatus::Pending);
    assert_eq!(found.recipient, "u@x.com");
    assert_eq!(
        found.metadata.get("campaign").map(String::as_str),
        Some("spring")
    );
    assert_eq!(found.retry_count, 0);
    assert!(found.failure_type.is_none());

    assert!(store.find("no-such-id").await.unwrap().is_none());
}

#[tokio::test]
async fn whatsapp_without_site_is_rejected() {
    let db = connect().await;
    let store = SeaOrmMessageStore::new(db);

    let message = Message::new(Channel::Whatsapp, "5511999990000", None);
    assert!(store.insert(&message).await.is_err());
}

#[tokio::test]
async fn retry_claim_is_exclusive_and_increments() {
    let db = connect().await;
    let store = SeaOrmMessageStore::new(db);

    let mut message = email_message();
    message.status = MessageStatus::Failed;
    message.failure_type = Some(FailureType::Consumer);
    message.error_message = Some("provider 503".to_string());
    store.insert(&message).await.unwrap();

    assert!(store
        .claim_for_retry(&message.message_id, MessageStatus::Failed)
        .await
        .unwrap());
    assert!(!store
        .claim_for_retry(&message.message_id, MessageStatus::Failed)
        .await
        .unwrap());

    let row = store.find(&message.message_id).await.unwrap().unwrap();
    assert_eq!(row.status, MessageStatus::Retrying);
    assert_eq!(row.retry_count, 1);
    assert!(row.failure_type.is_none());

    // Exhaustion keeps the row FAILED and preserves the cause.
    store
        .note_retries_exhausted(&message.message_id, FailureType::Consumer)
        .await
        .unwrap();
    let row = store.find(&message.message_id).await.unwrap().unwrap();
    assert_eq!(row.status, MessageStatus::Failed);
    assert_eq!(row.failure_type, Some(FailureType::Consumer));
    let error = row.error_message.unwrap();
    assert!(error.starts_with("Max retries exceeded"));
    assert!(error.contains("provider 503"));
}

#[tokio::test]
async fn late_worker_cannot_overwrite_delivered() {
    let db = connect().await;
    let store = SeaOrmMessageStore::new(db);

    let message = email_message();
    store.insert(&message).await.unwrap();

    assert!(store
        .mark_delivered(&message.message_id, Utc::now())
        .await
        .unwrap());
    assert!(!store
        .mark_consumer_failed(&message.message_id, "late failure")
        .await
        .unwrap());

    let row = store.find(&message.message_id).await.unwrap().unwrap();
    assert_eq!(row.status, MessageStatus::Delivered);
    assert!(row.delivered_at.is_some());
    assert!(row.error_message.is_none());
}

#[tokio::test]
async fn scheduled_rows_are_found_and_promoted_once() {
    let db = connect().await;
    let store = SeaOrmMessageStore::new(db);

    let due = email_message().with_schedule(Utc::now() - chrono::Duration::seconds(5));
    let later = email_message().with_schedule(Utc::now() + chrono::Duration::minutes(10));
    store.insert(&due).await.unwrap();
    store.insert(&later).await.unwrap();

    let batch = store.due_scheduled_batch(Utc::now(), 10).await.unwrap();
    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].message_id, due.message_id);

    assert!(store.promote_scheduled(&due.message_id).await.unwrap());
    assert!(!store.promote_scheduled(&due.message_id).await.unwrap());

    let row = store.find(&due.message_id).await.unwrap().unwrap();
    assert_eq!(row.status, MessageStatus::Pending);
    assert!(row.scheduled_at.is_none());
}

#[tokio::test]
async fn failed_batch_respects_filters() {
    let db = connect().await;
    let store = SeaOrmMessageStore::new(db);

    let cutoff = Utc::now() + chrono::Duration::seconds(1);

    let mut eligible = email_message();
    eligible.status = MessageStatus::Failed;
    eligible.failure_type = Some(FailureType::Consumer);
    let mut exhausted = email_message();
    exhausted.status = MessageStatus::Failed;
    exhausted.failure_type = Some(FailureType::Consumer);
    exhausted.retry_count = 3;
    let mut publish_failed = email_message();
    publish_failed.status = MessageStatus::Failed;
    publish_failed.failure_type = Some(FailureType::Publish);

    for m in [&eligible, &exhausted, &publish_failed] {
        store.insert(m).await.unwrap();
    }

    let batch = store
        .failed_batch(FailureType::Consumer, 3, cutoff, 50)
        .await
        .unwrap();
    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].message_id, eligible.message_id);

    let batch = store
        .failed_batch(FailureType::Publish, 3, cutoff, 50)
        .await
        .unwrap();
    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].message_id, publish_failed.message_id);
}

#[tokio::test]
async fn history_append_and_lookups() {
    let db = connect().await;
    let store = SeaOrmMessageStore::new(db.clone());
    let history = SeaOrmHistoryStore::new(db);

    let message = email_message();
    store.insert(&message).await.unwrap();

    let entry = StatusHistoryEntry::now(
        message.message_id.clone(),
        MessageStatus::Pending,
        0,
        HistorySource::Api,
    );
    history.append(&entry).await.unwrap();

    assert!(history
        .last_timestamp(&message.message_id, MessageStatus::Pending)
        .await
        .unwrap()
        .is_some());
    assert!(history
        .last_timestamp(&message.message_id, MessageStatus::Delivered)
        .await
        .unwrap()
        .is_none());
    assert!(!history.has_success_entry(&message.message_id).await.unwrap());

    let delivered = StatusHistoryEntry::now(
        message.message_id.clone(),
        MessageStatus::Delivered,
        0,
        HistorySource::Worker,
    );
    history.append(&delivered).await.unwrap();

    assert!(history.has_success_entry(&message.message_id).await.unwrap());
    let entries = history.entries(&message.message_id).await.unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].status, MessageStatus::Pending);
    assert_eq!(entries[1].status, MessageStatus::Delivered);
}

#[tokio::test]
async fn tenant_directory_decrypts_credentials() {
    let db = connect().await;
    let cipher = SecretCipher::from_key("test-encryption-key").unwrap();

    let site_id = Uuid::new_v4();
    let now = Utc::now();
    courier_db::entities::site::ActiveModel {
        id: Set(site_id),
        site_name: Set("acme".to_string()),
        api_key_hash: Set("ab".repeat(32)),
        sendgrid_api_key: Set(Some(cipher.encrypt("SG.stored-secret").unwrap())),
        email_from_address: Set(Some("no-reply@acme.test".to_string())),
        email_from_name: Set(None),
        whatsapp_session_name: Set(Some("acme-main".to_string())),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db.as_ref())
    .await
    .unwrap();

    let directory = SeaOrmTenantDirectory::new(db, cipher);

    let site = directory.find_active_site(site_id).await.unwrap().unwrap();
    assert_eq!(site.sendgrid_api_key.as_deref(), Some("SG.stored-secret"));

    let by_hash = directory
        .find_active_site_by_api_key_hash(&"ab".repeat(32))
        .await
        .unwrap();
    assert!(by_hash.is_some());
    assert!(directory
        .find_active_site_by_api_key_hash(&"cd".repeat(32))
        .await
        .unwrap()
        .is_none());
}
