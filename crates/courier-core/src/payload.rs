//! Bus payload
//!
//! The JSON value published to channel topics and DLQs. Derived from a
//! committed message row; the type deliberately has no credential fields,
//! so secrets cannot round-trip through the bus.

use crate::errors::CoreResult;
use crate::model::{Channel, Message};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Wire payload for one dispatch. Field names follow the external JSON
/// contract (`messageId`, `siteId`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchPayload {
    pub message_id: String,
    pub site_id: Option<Uuid>,
    pub channel: Channel,
    pub recipient: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default)]
    pub is_html: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub whatsapp_session_name: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

impl DispatchPayload {
    /// Serialize the content fields of a stored row. Control fields
    /// (status, retry count, failure data) stay off the bus.
    pub fn from_message(message: &Message) -> Self {
        Self {
            message_id: message.message_id.clone(),
            site_id: message.site_id,
            channel: message.channel,
            recipient: message.recipient.clone(),
            subject: message.subject.clone(),
            body: message.body.clone(),
            is_html: message.is_html,
            image_url: message.image_url.clone(),
            video_url: message.video_url.clone(),
            document_url: message.document_url.clone(),
            file_name: message.file_name.clone(),
            caption: message.caption.clone(),
            from_email: message.from_email.clone(),
            from_name: message.from_name.clone(),
            whatsapp_session_name: message.whatsapp_session_name.clone(),
            metadata: message.metadata.clone(),
        }
    }

    /// Parse a payload received from the bus
    pub fn parse(json: &str) -> CoreResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Encode for publishing
    pub fn to_json(&self) -> CoreResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MessageStatus;

    fn sample_message() -> Message {
        Message::new(Channel::Email, "u@x.com", Some(Uuid::new_v4()))
            .with_body(Some("Hi".to_string()), Some("hello".to_string()), false)
            .with_sender(Some("no-reply@acme.test".to_string()), Some("Acme".to_string()))
            .with_metadata(HashMap::from([("campaign".to_string(), "spring".to_string())]))
    }

    #[test]
    fn test_round_trip_preserves_content_fields() {
        let message = sample_message();
        let payload = DispatchPayload::from_message(&message);

        let parsed = DispatchPayload::parse(&payload.to_json().unwrap()).unwrap();

        assert_eq!(parsed, payload);
        assert_eq!(parsed.message_id, message.message_id);
        assert_eq!(parsed.site_id, message.site_id);
        assert_eq!(parsed.recipient, "u@x.com");
        assert_eq!(parsed.subject.as_deref(), Some("Hi"));
        assert_eq!(parsed.body.as_deref(), Some("hello"));
        assert_eq!(parsed.metadata.get("campaign").map(String::as_str), Some("spring"));
    }

    #[test]
    fn test_wire_field_names() {
        let json = DispatchPayload::from_message(&sample_message()).to_json().unwrap();

        assert!(json.contains("\"messageId\""));
        assert!(json.contains("\"siteId\""));
        assert!(json.contains("\"channel\":\"EMAIL\""));
        assert!(!json.contains("apiKey"));
        assert!(!json.contains("retryCount"));
    }

    #[test]
    fn test_control_fields_stay_off_the_bus() {
        let mut message = sample_message();
        message.status = MessageStatus::Failed;
        message.retry_count = 2;
        message.error_message = Some("boom".to_string());

        let json = DispatchPayload::from_message(&message).to_json().unwrap();
        assert!(!json.contains("boom"));
        assert!(!json.contains("FAILED"));
    }

    #[test]
    fn test_parse_rejects_malformed_json() {
        assert!(DispatchPayload::parse("{not json").is_err());
    }
}
