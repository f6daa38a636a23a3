//! Repository implementations of the core store ports
//!
//! Every lifecycle transition is an `update_many` with a status filter:
//! `rows_affected > 0` means this caller won the transition. That
//! compare-and-set shape is the only cross-replica coordination the
//! pipeline uses.

pub mod history;
pub mod message;
pub mod tenants;

pub use history::SeaOrmHistoryStore;
pub use message::SeaOrmMessageStore;
pub use tenants::SeaOrmTenantDirectory;

use courier_core::CoreError;

pub(crate) fn core_err(err: sea_orm::DbErr) -> CoreError {
    crate::error::DatabaseError::from(err).into()
}
