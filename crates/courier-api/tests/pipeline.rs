//! End-to-end pipeline scenarios over the in-memory bus and stores.
//!
//! These exercise the full dispatch flow: ingress acceptance, channel
//! worker processing, retry/DLQ control, scheduled promotion, and the
//! tenant-isolation and idempotency guards, with scripted provider
//! outcomes.

use actix_web::{test, web, App};
use chrono::{Duration as ChronoDuration, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use courier_api::middleware::RequestId;
use courier_api::routes;
use courier_api::services::{
    CredentialResolver, DispatchService, IngressService, ResolverSettings, SendRequest,
};
use courier_api::state::AppState;
use courier_api::workers::{
    ChannelWorker, RetryController, RetrySettings, Scheduler, SchedulerSettings,
};
use courier_core::bus::{MemoryBus, MessageBus, TopicMap};
use courier_core::ledger::StatusLedger;
use courier_core::metrics::DispatchMetrics;
use courier_core::model::{
    Channel, FailureCategory, FailureType, MessageStatus, Site,
};
use courier_core::payload::DispatchPayload;
use courier_core::sanitize::contains_secret_pattern;
use courier_core::store::{
    HistoryStore, MemoryHistoryStore, MemoryMessageStore, MemoryTenantDirectory,
};
use courier_providers::{MockProvider, SendOutcome};

const SITE_KEY: &str = "test-site-key-1";
const RETRY_DELAY_MS: i64 = 50;

struct Pipeline {
    store: Arc<MemoryMessageStore>,
    history: Arc<MemoryHistoryStore>,
    bus: Arc<MemoryBus>,
    metrics: Arc<DispatchMetrics>,
    ingress: Arc<IngressService>,
    email_provider: Arc<MockProvider>,
    email_worker: ChannelWorker,
    whatsapp_worker: ChannelWorker,
    retry: RetryController,
    scheduler: Scheduler,
    state: AppState,
    site: Site,
}

fn pipeline() -> Pipeline {
    let store = Arc::new(MemoryMessageStore::new());
    let history = Arc::new(MemoryHistoryStore::new());
    let directory = Arc::new(MemoryTenantDirectory::new());
    let bus = Arc::new(MemoryBus::new());
    let metrics = DispatchMetrics::new();
    let topics = TopicMap::default();
    let ledger = Arc::new(StatusLedger::new(history.clone(), metrics.clone()));

    let site = Site {
        id: Uuid::new_v4(),
        site_name: "acme".to_string(),
        api_key_hash: courier_api::middleware::site_key::hash_site_key(SITE_KEY),
        sendgrid_api_key: Some("site-sendgrid-key".to_string()),
        email_from_address: Some("no-reply@acme.test".to_string()),
        email_from_name: Some("Acme".to_string()),
        whatsapp_session_name: Some("acme-main".to_string()),
        is_active: true,
    };
    directory.add_site(site.clone());
    directory.add_session(courier_core::model::ChannelSession {
        site_user_id: site.id,
        session_name: "acme-main".to_string(),
        session_api_key: Some("session-key".to_string()),
        is_active: true,
    });

    let resolver = CredentialResolver::new(
        directory.clone(),
        ResolverSettings {
            env_sendgrid_api_key: Some("env-key".to_string()),
            default_from_email: "default@courier.local".to_string(),
            default_from_name: "Courier".to_string(),
        },
    );

    let email_provider = Arc::new(MockProvider::new());
    let whatsapp_provider = Arc::new(MockProvider::new());
    let dispatch = Arc::new(DispatchService::new(
        store.clone(),
        ledger.clone(),
        resolver,
        email_provider.clone(),
        whatsapp_provider.clone(),
    ));

    let ingress = Arc::new(IngressService::new(
        store.clone(),
        ledger.clone(),
        bus.clone(),
        topics.clone(),
        metrics.clone(),
    ));

    let email_worker = ChannelWorker::new(
        Channel::Email,
        bus.clone(),
        topics.clone(),
        dispatch.clone(),
        Duration::from_millis(10),
    );
    let whatsapp_worker = ChannelWorker::new(
        Channel::Whatsapp,
        bus.clone(),
        topics.clone(),
        dispatch.clone(),
        Duration::from_millis(10),
    );

    let retry = RetryController::new(
        store.clone(),
        ledger.clone(),
        bus.clone(),
        topics.clone(),
        metrics.clone(),
        RetrySettings {
            max_retries: 3,
            retry_delay: ChronoDuration::milliseconds(RETRY_DELAY_MS),
            batch_size: 50,
            scan_interval: Duration::from_secs(300),
        },
    );

    let scheduler = Scheduler::new(
        store.clone(),
        ledger.clone(),
        bus.clone(),
        topics.clone(),
        SchedulerSettings {
            interval: Duration::from_secs(30),
            batch_size: 100,
        },
    );

    let state = AppState::new(
        courier_api::config::AppConfig::default(),
        metrics.clone(),
        directory,
        ingress.clone(),
    );

    Pipeline {
        store,
        history,
        bus,
        metrics,
        ingress,
        email_provider,
        email_worker,
        whatsapp_worker,
        retry,
        scheduler,
        state,
        site,
    }
}

fn email_request() -> SendRequest {
    serde_json::from_value(serde_json::json!({
        "channel": "EMAIL",
        "recipient": "u@x.com",
        "subject": "Hi",
        "body": "hello",
        "isHtml": false
    }))
    .unwrap()
}

async fn wait_past_retry_delay() {
    tokio::time::sleep(Duration::from_millis(RETRY_DELAY_MS as u64 + 30)).await;
}

fn history_statuses(entries: &[courier_core::model::StatusHistoryEntry]) -> HashSet<MessageStatus> {
    entries.iter().map(|e| e.status).collect()
}

fn assert_row_invariants(p: &Pipeline) {
    for row in p.store.all() {
        assert!(
            row.failure_state_consistent(),
            "FAILED and failure_type must appear together: {row:?}"
        );
        assert!(row.retry_count <= 3, "retry_count exceeded the bound: {row:?}");
        if let Some(error) = &row.error_message {
            assert!(
                !contains_secret_pattern(error),
                "secret-shaped substring stored in error column: {error}"
            );
        }
    }
}

// Scenario: happy-path email over HTTP. Accepted with 202, delivered by
// the worker, two history entries after dedup, delivered counter bumped.
#[actix_web::test]
async fn happy_path_email_delivers() {
    let p = pipeline();
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(p.state.clone()))
            .wrap(RequestId)
            .configure(routes::configure_routes),
    )
    .await;

    let response = test::TestRequest::post()
        .uri("/send")
        .insert_header(("x-api-key", SITE_KEY))
        .set_json(serde_json::json!({
            "channel": "EMAIL",
            "recipient": "u@x.com",
            "subject": "Hi",
            "body": "hello",
            "isHtml": false
        }))
        .to_request();
    let response = test::call_service(&app, response).await;
    assert_eq!(response.status(), 202);

    let body: serde_json::Value = test::read_body_json(response).await;
    let message_id = body["messageId"].as_str().unwrap().to_string();

    p.email_worker.drain().await.unwrap();

    let row = p.store.snapshot(&message_id).unwrap();
    assert_eq!(row.status, MessageStatus::Delivered);
    assert_eq!(row.site_id, Some(p.site.id));
    assert!(row.delivered_at.is_some());

    let entries = p.history.entries(&message_id).await.unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].status, MessageStatus::Pending);
    assert_eq!(entries[1].status, MessageStatus::Delivered);

    assert_eq!(p.metrics.delivered.get(), 1);
    assert_eq!(p.email_provider.call_count(), 1);
    assert_row_invariants(&p);
}

#[actix_web::test]
async fn send_without_site_key_is_unauthorized() {
    let p = pipeline();
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(p.state.clone()))
            .configure(routes::configure_routes),
    )
    .await;

    let request = test::TestRequest::post()
        .uri("/send")
        .set_json(serde_json::json!({
            "channel": "EMAIL",
            "recipient": "u@x.com",
            "body": "hello"
        }))
        .to_request();
    let response = test::call_service(&app, request).await;
    assert_eq!(response.status(), 401);

    let request = test::TestRequest::post()
        .uri("/send")
        .insert_header(("x-api-key", "wrong-key"))
        .set_json(serde_json::json!({
            "channel": "EMAIL",
            "recipient": "u@x.com",
            "body": "hello"
        }))
        .to_request();
    let response = test::call_service(&app, request).await;
    assert_eq!(response.status(), 401);
}

#[actix_web::test]
async fn invalid_request_is_rejected_with_400() {
    let p = pipeline();
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(p.state.clone()))
            .configure(routes::configure_routes),
    )
    .await;

    let request = test::TestRequest::post()
        .uri("/send")
        .insert_header(("x-api-key", SITE_KEY))
        .set_json(serde_json::json!({
            "channel": "EMAIL",
            "recipient": "",
            "body": "hello"
        }))
        .to_request();
    let response = test::call_service(&app, request).await;
    assert_eq!(response.status(), 400);

    let body: serde_json::Value = test::read_body_json(response).await;
    assert_eq!(body["code"], "INVALID_REQUEST");
}

// Scenario: a forged payload claims another tenant. The worker fails the
// message without calling the provider and leaves retry_count alone.
#[actix_web::test]
async fn tenant_violation_fails_without_provider_call() {
    let p = pipeline();

    let message_id = p
        .ingress
        .accept(email_request(), Some(&p.site))
        .await
        .unwrap();

    // Drop the legitimate record and replace it with a forged one.
    let topic = "notifications-email";
    let record = p.bus.receive(topic).await.unwrap().unwrap();
    p.bus.ack(topic, &record.receipt).await.unwrap();
    let mut payload = DispatchPayload::parse(&record.value).unwrap();
    payload.site_id = Some(Uuid::new_v4());
    p.bus.publish(topic, &message_id, &payload).await.unwrap();

    p.email_worker.drain().await.unwrap();

    let row = p.store.snapshot(&message_id).unwrap();
    assert_eq!(row.status, MessageStatus::Failed);
    assert_eq!(row.failure_type, Some(FailureType::Consumer));
    assert!(row
        .error_message
        .as_deref()
        .unwrap()
        .contains("Tenant isolation violation: payload siteId does not match message tenant"));
    assert_eq!(row.retry_count, 0);
    assert_eq!(p.email_provider.call_count(), 0);
    assert_row_invariants(&p);
}

// Scenario: the after-accept publish fails; the committed PENDING row is
// rescued by the retry controller, republished, and delivered.
#[actix_web::test]
async fn publish_failure_is_rescued_and_delivered() {
    let p = pipeline();
    p.bus.inject_publish_failures(1);

    let message_id = p
        .ingress
        .accept(email_request(), Some(&p.site))
        .await
        .unwrap();
    assert!(p.bus.is_empty("notifications-email"));
    assert_eq!(
        p.store.snapshot(&message_id).unwrap().status,
        MessageStatus::Pending
    );

    wait_past_retry_delay().await;
    p.retry.tick().await.unwrap();

    // Republished and visible on the bus again.
    assert_eq!(p.bus.len("notifications-email"), 1);
    let row = p.store.snapshot(&message_id).unwrap();
    assert_eq!(row.status, MessageStatus::Pending);
    assert_eq!(row.retry_count, 1);

    p.email_worker.drain().await.unwrap();

    let row = p.store.snapshot(&message_id).unwrap();
    assert_eq!(row.status, MessageStatus::Delivered);
    assert_eq!(row.retry_count, 1);

    let statuses = history_statuses(&p.history.entries(&message_id).await.unwrap());
    for expected in [
        MessageStatus::Pending,
        MessageStatus::Retrying,
        MessageStatus::Delivered,
    ] {
        assert!(statuses.contains(&expected), "missing {expected} entry");
    }
    assert_row_invariants(&p);
}

// Scenario: the provider keeps failing; after three delivery attempts the
// retry budget is exhausted and the payload lands on the channel DLQ.
#[actix_web::test]
async fn consumer_failures_exhaust_retries_into_dlq() {
    let p = pipeline();
    for _ in 0..3 {
        p.email_provider.push_outcome(SendOutcome::failed(
            FailureCategory::Temporary,
            "sendgrid returned 500 Internal Server Error",
        ));
    }

    let message_id = p
        .ingress
        .accept(email_request(), Some(&p.site))
        .await
        .unwrap();

    // Attempt 1 via the ingress publish.
    p.email_worker.drain().await.unwrap();
    assert_eq!(
        p.store.snapshot(&message_id).unwrap().status,
        MessageStatus::Failed
    );

    // Two retry cycles, each followed by another provider failure.
    for expected_count in 1..=2 {
        wait_past_retry_delay().await;
        p.retry.tick().await.unwrap();
        assert_eq!(
            p.store.snapshot(&message_id).unwrap().retry_count,
            expected_count
        );
        p.email_worker.drain().await.unwrap();
    }

    // Third cycle finds the budget spent and escalates to the DLQ.
    wait_past_retry_delay().await;
    p.retry.tick().await.unwrap();

    let row = p.store.snapshot(&message_id).unwrap();
    assert_eq!(row.status, MessageStatus::Failed);
    assert_eq!(row.retry_count, 3);
    assert!(row
        .error_message
        .as_deref()
        .unwrap()
        .starts_with("Max retries exceeded"));
    assert_eq!(p.email_provider.call_count(), 3);
    assert_eq!(p.bus.len("notifications-email-dlq"), 1);
    assert_eq!(p.metrics.dlq.get(), 1);
    assert_row_invariants(&p);
}

// Scenario: a future scheduledAt parks the row; the scheduler promotes
// and publishes it once due, and the worker delivers.
#[actix_web::test]
async fn scheduled_message_is_promoted_and_delivered() {
    let p = pipeline();
    let mut request = email_request();
    request.scheduled_at = Some(Utc::now() + ChronoDuration::milliseconds(150));

    let message_id = p
        .ingress
        .accept(request, Some(&p.site))
        .await
        .unwrap();

    assert_eq!(
        p.store.snapshot(&message_id).unwrap().status,
        MessageStatus::Scheduled
    );
    assert!(p.bus.is_empty("notifications-email"));

    // Not yet due.
    assert_eq!(p.scheduler.tick().await.unwrap(), 0);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(p.scheduler.tick().await.unwrap(), 1);
    assert_eq!(p.bus.len("notifications-email"), 1);

    let row = p.store.snapshot(&message_id).unwrap();
    assert_eq!(row.status, MessageStatus::Pending);
    assert!(row.scheduled_at.is_none());

    p.email_worker.drain().await.unwrap();

    assert_eq!(
        p.store.snapshot(&message_id).unwrap().status,
        MessageStatus::Delivered
    );
    let statuses = history_statuses(&p.history.entries(&message_id).await.unwrap());
    for expected in [
        MessageStatus::Scheduled,
        MessageStatus::Pending,
        MessageStatus::Delivered,
    ] {
        assert!(statuses.contains(&expected), "missing {expected} entry");
    }
    assert_row_invariants(&p);
}

// Scenario: the bus delivers the same record twice; the second delivery
// is absorbed by the idempotency gate.
#[actix_web::test]
async fn redelivery_is_absorbed_without_second_send() {
    let p = pipeline();

    let message_id = p
        .ingress
        .accept(email_request(), Some(&p.site))
        .await
        .unwrap();

    // Simulate at-least-once delivery by duplicating the record.
    let row = p.store.snapshot(&message_id).unwrap();
    let payload = DispatchPayload::from_message(&row);
    p.bus
        .publish("notifications-email", &message_id, &payload)
        .await
        .unwrap();

    assert_eq!(p.email_worker.drain().await.unwrap(), 2);

    assert_eq!(p.email_provider.call_count(), 1);
    assert_eq!(p.metrics.delivered.get(), 1);
    assert_eq!(
        p.store.snapshot(&message_id).unwrap().status,
        MessageStatus::Delivered
    );
    assert_row_invariants(&p);
}

// WhatsApp session credentials resolve through the tenant directory and
// deliveries flow the same way as email.
#[actix_web::test]
async fn whatsapp_send_resolves_session_credentials() {
    let p = pipeline();
    let request: SendRequest = serde_json::from_value(serde_json::json!({
        "channel": "WHATSAPP",
        "recipient": "5511999990000",
        "body": "hello",
        "whatsappSessionName": "acme-main"
    }))
    .unwrap();

    let message_id = p.ingress.accept(request, Some(&p.site)).await.unwrap();
    p.whatsapp_worker.drain().await.unwrap();

    assert_eq!(
        p.store.snapshot(&message_id).unwrap().status,
        MessageStatus::Delivered
    );
    assert_row_invariants(&p);
}

// No stored error, payload, or history entry may carry a secret-shaped
// substring, even when a provider echoes credentials in its failure.
#[actix_web::test]
async fn secrets_never_reach_rows_or_history() {
    let p = pipeline();
    p.email_provider.push_outcome(SendOutcome::failed(
        FailureCategory::Auth,
        format!("denied for key SG.{}", "a".repeat(40)),
    ));

    let message_id = p
        .ingress
        .accept(email_request(), Some(&p.site))
        .await
        .unwrap();
    p.email_worker.drain().await.unwrap();

    let row = p.store.snapshot(&message_id).unwrap();
    assert!(!contains_secret_pattern(row.error_message.as_deref().unwrap()));

    for entry in p.history.entries(&message_id).await.unwrap() {
        if let Some(error) = entry.error_message {
            assert!(!contains_secret_pattern(&error));
        }
    }
    assert_row_invariants(&p);
}
