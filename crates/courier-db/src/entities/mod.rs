//! SeaORM entity models for Courier
//!
//! Each table gets its own module; enum columns are string-valued
//! ActiveEnums converted to and from the domain enums in `courier-core`.

pub mod channel_session;
pub mod global_provider_config;
pub mod message;
pub mod site;
pub mod status_history;
