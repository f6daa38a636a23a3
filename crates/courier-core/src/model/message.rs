//! Message entity: one row per accepted send request

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Logical delivery medium
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Channel {
    Email,
    Whatsapp,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Email => write!(f, "EMAIL"),
            Channel::Whatsapp => write!(f, "WHATSAPP"),
        }
    }
}

impl std::str::FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "EMAIL" => Ok(Channel::Email),
            "WHATSAPP" => Ok(Channel::Whatsapp),
            _ => Err(format!("Unknown channel: {s}")),
        }
    }
}

/// Message lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageStatus {
    Pending,
    Retrying,
    Scheduled,
    Sent,
    Delivered,
    Failed,
    Bounced,
    Rejected,
}

impl MessageStatus {
    /// States with no permitted outgoing transition
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            MessageStatus::Delivered | MessageStatus::Bounced | MessageStatus::Rejected
        )
    }
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MessageStatus::Pending => "PENDING",
            MessageStatus::Retrying => "RETRYING",
            MessageStatus::Scheduled => "SCHEDULED",
            MessageStatus::Sent => "SENT",
            MessageStatus::Delivered => "DELIVERED",
            MessageStatus::Failed => "FAILED",
            MessageStatus::Bounced => "BOUNCED",
            MessageStatus::Rejected => "REJECTED",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for MessageStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(MessageStatus::Pending),
            "RETRYING" => Ok(MessageStatus::Retrying),
            "SCHEDULED" => Ok(MessageStatus::Scheduled),
            "SENT" => Ok(MessageStatus::Sent),
            "DELIVERED" => Ok(MessageStatus::Delivered),
            "FAILED" => Ok(MessageStatus::Failed),
            "BOUNCED" => Ok(MessageStatus::Bounced),
            "REJECTED" => Ok(MessageStatus::Rejected),
            _ => Err(format!("Unknown status: {s}")),
        }
    }
}

/// Origin of a failure recorded on the row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FailureType {
    /// Bus publish never happened or failed
    Publish,
    /// Worker/provider processing failed
    Consumer,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Publish => write!(f, "PUBLISH"),
            FailureType::Consumer => write!(f, "CONSUMER"),
        }
    }
}

/// Classification of a provider/processing failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FailureCategory {
    /// Provider rejected the credentials (401/403)
    Auth,
    /// Missing or unusable configuration
    Config,
    /// Provider rejected the message content (other 4xx)
    Permanent,
    /// Network, 5xx, rate limit, timeout
    Temporary,
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureCategory::Auth => write!(f, "AUTH"),
            FailureCategory::Config => write!(f, "CONFIG"),
            FailureCategory::Permanent => write!(f, "PERMANENT"),
            FailureCategory::Temporary => write!(f, "TEMPORARY"),
        }
    }
}

/// Durable record of a send request. No credential field exists on this
/// type; provider secrets are resolved at send time and never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub message_id: String,
    pub site_id: Option<Uuid>,
    pub channel: Channel,
    pub status: MessageStatus,
    pub recipient: String,
    pub subject: Option<String>,
    pub body: Option<String>,
    pub is_html: bool,
    pub image_url: Option<String>,
    pub video_url: Option<String>,
    pub document_url: Option<String>,
    pub file_name: Option<String>,
    pub caption: Option<String>,
    pub from_email: Option<String>,
    pub from_name: Option<String>,
    pub whatsapp_session_name: Option<String>,
    pub metadata: HashMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub retry_count: i32,
    pub failure_type: Option<FailureType>,
    pub error_message: Option<String>,
}

impl Message {
    /// Create a new message in PENDING with a generated id
    pub fn new(channel: Channel, recipient: impl Into<String>, site_id: Option<Uuid>) -> Self {
        let now = Utc::now();
        Self {
            message_id: Uuid::new_v4().to_string(),
            site_id,
            channel,
            status: MessageStatus::Pending,
            recipient: recipient.into(),
            subject: None,
            body: None,
            is_html: false,
            image_url: None,
            video_url: None,
            document_url: None,
            file_name: None,
            caption: None,
            from_email: None,
            from_name: None,
            whatsapp_session_name: None,
            metadata: HashMap::new(),
            created_at: now,
            updated_at: now,
            scheduled_at: None,
            sent_at: None,
            delivered_at: None,
            retry_count: 0,
            failure_type: None,
            error_message: None,
        }
    }

    /// Set subject and body
    pub fn with_body(mut self, subject: Option<String>, body: Option<String>, is_html: bool) -> Self {
        self.subject = subject;
        self.body = body;
        self.is_html = is_html;
        self
    }

    /// Set media references
    pub fn with_media(
        mut self,
        image_url: Option<String>,
        video_url: Option<String>,
        document_url: Option<String>,
        file_name: Option<String>,
        caption: Option<String>,
    ) -> Self {
        self.image_url = image_url;
        self.video_url = video_url;
        self.document_url = document_url;
        self.file_name = file_name;
        self.caption = caption;
        self
    }

    /// Set sender defaults
    pub fn with_sender(mut self, from_email: Option<String>, from_name: Option<String>) -> Self {
        self.from_email = from_email;
        self.from_name = from_name;
        self
    }

    /// Bind to a provider session by name
    pub fn with_session(mut self, session_name: Option<String>) -> Self {
        self.whatsapp_session_name = session_name;
        self
    }

    /// Attach opaque client metadata
    pub fn with_metadata(mut self, metadata: HashMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Defer dispatch until `at`; moves the message to SCHEDULED
    pub fn with_schedule(mut self, at: DateTime<Utc>) -> Self {
        self.status = MessageStatus::Scheduled;
        self.scheduled_at = Some(at);
        self
    }

    /// Whether the channel requires a tenant binding
    pub fn requires_site(&self) -> bool {
        matches!(self.channel, Channel::Whatsapp)
    }

    /// FAILED and failure_type must appear together
    pub fn failure_state_consistent(&self) -> bool {
        (self.status == MessageStatus::Failed) == self.failure_type.is_some()
    }
}
