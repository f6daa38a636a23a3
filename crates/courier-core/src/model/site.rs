//! Tenant records: sites, provider sessions, and the global fallback
//! configuration. All of these are read-only to the dispatch pipeline.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Tenant record identified by a site key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    pub id: Uuid,
    pub site_name: String,
    /// SHA-256 hex digest of the site key; the key itself is never stored
    pub api_key_hash: String,
    pub sendgrid_api_key: Option<String>,
    pub email_from_address: Option<String>,
    pub email_from_name: Option<String>,
    pub whatsapp_session_name: Option<String>,
    pub is_active: bool,
}

/// A provider-side session binding owned by a site (e.g. a WhatsApp phone
/// session). `(site_user_id, session_name)` is unique among active rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelSession {
    pub site_user_id: Uuid,
    pub session_name: String,
    pub session_api_key: Option<String>,
    pub is_active: bool,
}

/// Fallback provider credentials used only when a site has none
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalProviderConfig {
    pub sendgrid_api_key: Option<String>,
    pub email_from_address: Option<String>,
    pub email_from_name: Option<String>,
    pub is_active: bool,
}
