//! Database connection management

use crate::config::DatabaseConfig;
use crate::error::Result;
use sea_orm::{ConnectOptions, Database, DatabaseConnection as SeaOrmConnection};
use std::time::Duration;

/// Type alias for database connection
pub type DatabaseConnection = SeaOrmConnection;

/// Establish a database connection with the given configuration
pub async fn establish_connection(config: &DatabaseConfig) -> Result<DatabaseConnection> {
    let mut connect_options = ConnectOptions::new(config.url.as_str());

    connect_options
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(Duration::from_secs(config.connect_timeout))
        .acquire_timeout(Duration::from_secs(config.connect_timeout))
        .idle_timeout(Duration::from_secs(config.idle_timeout))
        .sqlx_logging(config.sqlx_logging);

    let connection = Database::connect(connect_options).await?;

    tracing::info!("Database connection established");
    Ok(connection)
}

/// Test database connection
pub async fn test_connection(connection: &DatabaseConnection) -> Result<()> {
    connection.ping().await?;
    Ok(())
}

/// Close database connection gracefully
pub async fn close_connection(connection: DatabaseConnection) -> Result<()> {
    connection.close().await?;
    tracing::info!("Database connection closed");
    Ok(())
}
