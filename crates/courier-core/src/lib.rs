//! # courier-core
//!
//! Core domain model and dispatch-pipeline primitives for the Courier
//! notification platform: message and tenant entities, the status
//! transition validator, the bus abstraction with its Redis and in-memory
//! transports, store ports, the status-history ledger, error-message
//! sanitization, and the dispatch metrics registry.

pub mod bus;
pub mod errors;
pub mod ledger;
pub mod metrics;
pub mod model;
pub mod payload;
pub mod sanitize;
pub mod store;
pub mod transitions;

pub use errors::{CoreError, CoreResult};
pub use model::{
    Channel, ChannelSession, FailureCategory, FailureType, GlobalProviderConfig, HistorySource,
    Message, MessageStatus, ProviderCredentials, Site, StatusHistoryEntry,
};
pub use payload::DispatchPayload;
