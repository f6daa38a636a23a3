use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Registry,
};

use crate::config::{AppConfig, LogFormat};

/// Initialize the logging system based on configuration
pub fn init_logging(config: &AppConfig) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = Registry::default().with(env_filter);

    match config.logging.format {
        LogFormat::Json => {
            let json_layer = fmt::layer()
                .json()
                .with_current_span(true)
                .with_target(true)
                .with_span_events(FmtSpan::CLOSE);

            subscriber.with(json_layer).init();
        }
        LogFormat::Pretty => {
            let pretty_layer = fmt::layer()
                .pretty()
                .with_target(true)
                .with_span_events(FmtSpan::CLOSE);

            subscriber.with(pretty_layer).init();
        }
        LogFormat::Compact => {
            let compact_layer = fmt::layer().compact().with_target(false);

            subscriber.with(compact_layer).init();
        }
    }

    tracing::info!(
        log_level = %config.logging.level,
        log_format = ?config.logging.format,
        "Logging initialized"
    );

    Ok(())
}
