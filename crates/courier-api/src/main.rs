use actix_web::{web, App, HttpServer};
use chrono::Duration as ChronoDuration;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use courier_api::config::AppConfig;
use courier_api::middleware::RequestId;
use courier_api::services::{
    CredentialResolver, DispatchService, IngressService, ResolverSettings,
};
use courier_api::state::AppState;
use courier_api::workers::{
    ChannelWorker, RetryController, RetrySettings, Scheduler, SchedulerSettings,
};
use courier_api::{logging, routes};
use courier_core::bus::{MessageBus, RedisBus};
use courier_core::ledger::StatusLedger;
use courier_core::metrics::DispatchMetrics;
use courier_core::model::Channel;
use courier_core::store::{HistoryStore, MessageStore, TenantDirectory};
use courier_db::{
    establish_connection, migration, DatabaseConfig, SeaOrmHistoryStore, SeaOrmMessageStore,
    SeaOrmTenantDirectory, SecretCipher,
};
use courier_providers::{Provider, SendgridProvider, WhatsappProvider};

const WORKER_POLL_INTERVAL: Duration = Duration::from_millis(200);

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let config = match AppConfig::from_env() {
        Ok(config) => {
            if let Err(e) = config.validate() {
                eprintln!("Configuration validation failed: {e}");
                std::process::exit(1);
            }
            config
        }
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = logging::init_logging(&config) {
        eprintln!("Failed to initialize logging: {e}");
        std::process::exit(1);
    }

    info!(
        "Starting Courier v{} on {}",
        env!("CARGO_PKG_VERSION"),
        config.server_address()
    );

    // Database
    let db_config = DatabaseConfig {
        url: config.database.url.clone(),
        max_connections: config.database.max_connections,
        min_connections: config.database.min_connections,
        ..Default::default()
    };
    let db = match establish_connection(&db_config).await {
        Ok(db) => Arc::new(db),
        Err(e) => {
            error!("Failed to connect to the database: {e}");
            std::process::exit(1);
        }
    };
    if let Err(e) = migration::run_migrations(&db).await {
        error!("Failed to run migrations: {e}");
        std::process::exit(1);
    }

    // At-rest credential cipher
    let cipher = if config.encryption.enabled {
        match SecretCipher::from_key(config.encryption.key.as_deref().unwrap_or_default()) {
            Ok(cipher) => cipher,
            Err(e) => {
                error!("Failed to initialize credential encryption: {e}");
                std::process::exit(1);
            }
        }
    } else {
        SecretCipher::disabled()
    };

    // Stores
    let store: Arc<dyn MessageStore> = Arc::new(SeaOrmMessageStore::new(db.clone()));
    let history: Arc<dyn HistoryStore> = Arc::new(SeaOrmHistoryStore::new(db.clone()));
    let directory: Arc<dyn TenantDirectory> =
        Arc::new(SeaOrmTenantDirectory::new(db.clone(), cipher));

    // Bus
    let bus: Arc<dyn MessageBus> = match RedisBus::new(
        &config.redis.url,
        Some(config.redis.key_prefix.clone()),
    )
    .await
    {
        Ok(bus) => Arc::new(bus),
        Err(e) => {
            error!("Failed to connect to Redis: {e}");
            std::process::exit(1);
        }
    };

    // Pipeline services
    let metrics = DispatchMetrics::new();
    let ledger = Arc::new(StatusLedger::new(history, metrics.clone()));
    let topics = config.topic_map();

    let resolver = CredentialResolver::new(
        directory.clone(),
        ResolverSettings {
            env_sendgrid_api_key: config.provider.sendgrid_api_key.clone(),
            default_from_email: config.provider.default_from_email.clone(),
            default_from_name: config.provider.default_from_name.clone(),
        },
    );

    let provider_timeout = Duration::from_secs(config.provider.timeout_secs);
    let email_provider: Arc<dyn Provider> = match SendgridProvider::new(
        config.provider.sendgrid_base_url.clone(),
        provider_timeout,
    ) {
        Ok(provider) => Arc::new(provider),
        Err(e) => {
            error!("Failed to build SendGrid adapter: {e}");
            std::process::exit(1);
        }
    };
    let whatsapp_provider: Arc<dyn Provider> = match WhatsappProvider::new(
        config.provider.whatsapp_base_url.clone(),
        provider_timeout,
    ) {
        Ok(provider) => Arc::new(provider),
        Err(e) => {
            error!("Failed to build WhatsApp adapter: {e}");
            std::process::exit(1);
        }
    };

    let dispatch = Arc::new(DispatchService::new(
        store.clone(),
        ledger.clone(),
        resolver,
        email_provider,
        whatsapp_provider,
    ));
    let ingress = Arc::new(IngressService::new(
        store.clone(),
        ledger.clone(),
        bus.clone(),
        topics.clone(),
        metrics.clone(),
    ));

    let app_state = AppState::new(
        config.clone(),
        metrics.clone(),
        directory.clone(),
        ingress,
    );

    // Background workers
    let email_worker = Arc::new(ChannelWorker::new(
        Channel::Email,
        bus.clone(),
        topics.clone(),
        dispatch.clone(),
        WORKER_POLL_INTERVAL,
    ));
    let whatsapp_worker = Arc::new(ChannelWorker::new(
        Channel::Whatsapp,
        bus.clone(),
        topics.clone(),
        dispatch.clone(),
        WORKER_POLL_INTERVAL,
    ));
    let retry_controller = Arc::new(RetryController::new(
        store.clone(),
        ledger.clone(),
        bus.clone(),
        topics.clone(),
        metrics.clone(),
        RetrySettings {
            max_retries: config.retry.max_retries,
            retry_delay: ChronoDuration::seconds(config.retry.delay_secs as i64),
            batch_size: config.retry.batch_size,
            scan_interval: Duration::from_secs(config.retry.scan_interval_secs),
        },
    ));
    let scheduler = Arc::new(Scheduler::new(
        store.clone(),
        ledger.clone(),
        bus.clone(),
        topics.clone(),
        SchedulerSettings {
            interval: Duration::from_secs(config.scheduler.interval_secs),
            batch_size: config.scheduler.batch_size,
        },
    ));

    info!("Starting background workers");
    for worker in [email_worker.clone(), whatsapp_worker.clone()] {
        tokio::spawn(async move { worker.run().await });
    }
    {
        let retry_controller = retry_controller.clone();
        tokio::spawn(async move { retry_controller.run().await });
    }
    {
        let scheduler = scheduler.clone();
        tokio::spawn(async move { scheduler.run().await });
    }

    // HTTP server
    let server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .wrap(RequestId)
            .configure(routes::configure_routes)
    });

    let server = if let Some(workers) = config.server.workers {
        server.workers(workers)
    } else {
        server
    };

    let server = server.bind(&config.server_address())?;
    let server = server.run();
    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    info!("Courier ready and listening on {}", config.server_address());

    shutdown_signal().await;
    info!("Courier shutting down");

    email_worker.stop();
    whatsapp_worker.stop();
    retry_controller.stop();
    scheduler.stop();

    server_handle.stop(true).await;
    match server_task.await {
        Ok(Ok(())) => info!("Server shut down"),
        Ok(Err(e)) => error!("Server error during shutdown: {e}"),
        Err(e) => error!("Failed to join server task: {e}"),
    }

    Ok(())
}

/// Graceful shutdown handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
