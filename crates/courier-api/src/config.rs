//! Process configuration
//!
//! Read once from the environment at startup; changing retry/scheduler
//! parameters requires a restart.

use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Environment variable {0} is missing")]
    MissingVariable(String),
    #[error("Failed to parse environment variable {variable}: {source}")]
    ParseError {
        variable: String,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub logging: LoggingConfig,
    pub retry: RetryConfig,
    pub scheduler: SchedulerConfig,
    pub provider: ProviderConfig,
    pub topics: TopicConfig,
    pub encryption: EncryptionConfig,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    pub url: String,
    pub key_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LogFormat {
    Json,
    Pretty,
    Compact,
}

/// Retry controller parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Upper bound on retries per message
    pub max_retries: i32,
    /// Minimum age before a FAILED row is retried, seconds
    pub delay_secs: u64,
    /// Page size of the retry scan
    pub batch_size: u64,
    /// Cadence of the retry scan, seconds
    pub scan_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Cadence of scheduled promotion, seconds
    pub interval_secs: u64,
    pub batch_size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Per-provider-call deadline, seconds
    pub timeout_secs: u64,
    pub sendgrid_base_url: Option<String>,
    pub whatsapp_base_url: String,
    /// Environment fallback for email credential resolution
    pub sendgrid_api_key: Option<String>,
    pub default_from_email: String,
    pub default_from_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicConfig {
    pub email: String,
    pub whatsapp: String,
    pub email_dlq: String,
    pub whatsapp_dlq: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptionConfig {
    pub enabled: bool,
    pub key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// SHA-256 hex of the dashboard key; authenticates the site-less
    /// global email path
    pub dashboard_api_key_hash: Option<String>,
}

fn parse_var<T: std::str::FromStr<Err = std::num::ParseIntError>>(
    variable: &str,
    default: &str,
) -> Result<T, ConfigError> {
    env::var(variable)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .map_err(|e| ConfigError::ParseError {
            variable: variable.to_string(),
            source: e,
        })
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        let _ = dotenv();

        let server = ServerConfig {
            host: env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: parse_var("SERVER_PORT", "8080")?,
            workers: env::var("SERVER_WORKERS")
                .ok()
                .map(|v| {
                    v.parse().map_err(|e| ConfigError::ParseError {
                        variable: "SERVER_WORKERS".to_string(),
                        source: e,
                    })
                })
                .transpose()?,
        };

        let database = DatabaseConfig {
            url: env::var("DATABASE_URL")
                .map_err(|_| ConfigError::MissingVariable("DATABASE_URL".to_string()))?,
            max_connections: parse_var("DATABASE_MAX_CONNECTIONS", "10")?,
            min_connections: parse_var("DATABASE_MIN_CONNECTIONS", "1")?,
        };

        let redis = RedisConfig {
            url: env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
            key_prefix: env::var("REDIS_KEY_PREFIX")
                .unwrap_or_else(|_| "courier:bus:".to_string()),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                "compact" => LogFormat::Compact,
                _ => LogFormat::Pretty,
            },
        };

        let retry = RetryConfig {
            max_retries: parse_var("RETRY_MAX_RETRIES", "3")?,
            delay_secs: parse_var("RETRY_DELAY_SECS", "300")?,
            batch_size: parse_var("RETRY_BATCH_SIZE", "50")?,
            scan_interval_secs: parse_var("RETRY_SCAN_INTERVAL_SECS", "300")?,
        };

        let scheduler = SchedulerConfig {
            interval_secs: parse_var("SCHEDULER_INTERVAL_SECS", "30")?,
            batch_size: parse_var("SCHEDULER_BATCH_SIZE", "100")?,
        };

        let provider = ProviderConfig {
            timeout_secs: parse_var("PROVIDER_TIMEOUT_SECS", "30")?,
            sendgrid_base_url: env::var("SENDGRID_BASE_URL").ok(),
            whatsapp_base_url: env::var("WHATSAPP_BASE_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:3000".to_string()),
            sendgrid_api_key: env::var("SENDGRID_API_KEY").ok().filter(|k| !k.is_empty()),
            default_from_email: env::var("DEFAULT_FROM_EMAIL")
                .unwrap_or_else(|_| "no-reply@courier.local".to_string()),
            default_from_name: env::var("DEFAULT_FROM_NAME")
                .unwrap_or_else(|_| "Courier".to_string()),
        };

        let topics = TopicConfig {
            email: env::var("TOPIC_EMAIL").unwrap_or_else(|_| "notifications-email".to_string()),
            whatsapp: env::var("TOPIC_WHATSAPP")
                .unwrap_or_else(|_| "notifications-whatsapp".to_string()),
            email_dlq: env::var("DLQ_EMAIL")
                .unwrap_or_else(|_| "notifications-email-dlq".to_string()),
            whatsapp_dlq: env::var("DLQ_WHATSAPP")
                .unwrap_or_else(|_| "notifications-whatsapp-dlq".to_string()),
        };

        let encryption = EncryptionConfig {
            enabled: env::var("ENCRYPTION_ENABLED")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            key: env::var("ENCRYPTION_KEY").ok().filter(|k| !k.is_empty()),
        };

        let auth = AuthConfig {
            dashboard_api_key_hash: env::var("DASHBOARD_API_KEY_HASH")
                .ok()
                .filter(|h| !h.is_empty()),
        };

        Ok(AppConfig {
            server,
            database,
            redis,
            logging,
            retry,
            scheduler,
            provider,
            topics,
            encryption,
            auth,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::InvalidConfig(
                "Server port cannot be 0".to_string(),
            ));
        }

        if self.database.url.is_empty() {
            return Err(ConfigError::InvalidConfig(
                "Database URL cannot be empty".to_string(),
            ));
        }

        if self.retry.max_retries < 0 {
            return Err(ConfigError::InvalidConfig(
                "Retry bound cannot be negative".to_string(),
            ));
        }

        if self.encryption.enabled && self.encryption.key.is_none() {
            return Err(ConfigError::InvalidConfig(
                "Encryption enabled without a key".to_string(),
            ));
        }

        Ok(())
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Channel → destination names for the bus
    pub fn topic_map(&self) -> courier_core::bus::TopicMap {
        courier_core::bus::TopicMap {
            email_topic: self.topics.email.clone(),
            whatsapp_topic: self.topics.whatsapp.clone(),
            email_dlq: self.topics.email_dlq.clone(),
            whatsapp_dlq: self.topics.whatsapp_dlq.clone(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                workers: None,
            },
            database: DatabaseConfig {
                url: "sqlite::memory:".to_string(),
                max_connections: 10,
                min_connections: 1,
            },
            redis: RedisConfig {
                url: "redis://127.0.0.1:6379".to_string(),
                key_prefix: "courier:bus:".to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: LogFormat::Pretty,
            },
            retry: RetryConfig {
                max_retries: 3,
                delay_secs: 300,
                batch_size: 50,
                scan_interval_secs: 300,
            },
            scheduler: SchedulerConfig {
                interval_secs: 30,
                batch_size: 100,
            },
            provider: ProviderConfig {
                timeout_secs: 30,
                sendgrid_base_url: None,
                whatsapp_base_url: "http://127.0.0.1:3000".to_string(),
                sendgrid_api_key: None,
                default_from_email: "no-reply@courier.local".to_string(),
                default_from_name: "Courier".to_string(),
            },
            topics: TopicConfig {
                email: "notifications-email".to_string(),
                whatsapp: "notifications-whatsapp".to_string(),
                email_dlq: "notifications-email-dlq".to_string(),
                whatsapp_dlq: "notifications-whatsapp-dlq".to_string(),
            },
            encryption: EncryptionConfig {
                enabled: false,
                key: None,
            },
            auth: AuthConfig {
                dashboard_api_key_hash: None,
            },
        }
    }
}
