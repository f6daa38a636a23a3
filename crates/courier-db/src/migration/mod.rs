//! Database migration management

pub mod m20250115_000001_create_courier_tables;

use crate::error::{DatabaseError, Result};
use sea_orm::DatabaseConnection;
use sea_orm_migration::prelude::*;

/// Courier database migrator
pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(
            m20250115_000001_create_courier_tables::Migration,
        )]
    }
}

/// Run all pending migrations
pub async fn run_migrations(db: &DatabaseConnection) -> Result<()> {
    Migrator::up(db, None)
        .await
        .map_err(|e| DatabaseError::Migration(format!("Failed to run migrations: {e}")))?;

    tracing::info!("Database migrations completed");
    Ok(())
}

/// Rollback migrations
pub async fn rollback_migrations(db: &DatabaseConnection, steps: Option<u32>) -> Result<()> {
    Migrator::down(db, steps)
        .await
        .map_err(|e| DatabaseError::Migration(format!("Failed to rollback migrations: {e}")))?;

    tracing::info!("Database migrations rolled back");
    Ok(())
}
