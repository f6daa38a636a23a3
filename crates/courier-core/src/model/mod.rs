//! Domain entities for the dispatch pipeline

pub mod credentials;
pub mod history;
pub mod message;
pub mod site;

pub use credentials::ProviderCredentials;
pub use history::{HistorySource, StatusHistoryEntry};
pub use message::{Channel, FailureCategory, FailureType, Message, MessageStatus};
pub use site::{ChannelSession, GlobalProviderConfig, Site};
