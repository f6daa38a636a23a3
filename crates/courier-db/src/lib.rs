//! # courier-db
//!
//! SeaORM persistence layer for Courier: entity models for the message
//! log, status history, and tenant tables; repositories implementing the
//! core store ports with conditional-update transitions; connection
//! management; schema migration; and at-rest encryption for stored
//! provider credentials.

pub mod config;
pub mod connection;
pub mod crypto;
pub mod entities;
pub mod error;
pub mod migration;
pub mod repositories;

pub use config::DatabaseConfig;
pub use connection::{establish_connection, DatabaseConnection};
pub use crypto::SecretCipher;
pub use error::{DatabaseError, Result};
pub use repositories::{SeaOrmHistoryStore, SeaOrmMessageStore, SeaOrmTenantDirectory};
