//! WhatsApp session-API adapter
//!
//! Talks to a session-based WhatsApp HTTP gateway: each tenant owns one or
//! more named sessions, and every call authenticates with that session's
//! API key. Media sends pick the endpoint from the payload's media fields.

use crate::{categorize_status, Provider, ProviderError, ProviderName, SendOutcome};
use async_trait::async_trait;
use courier_core::model::{FailureCategory, ProviderCredentials};
use courier_core::payload::DispatchPayload;
use reqwest::Client as HttpClient;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

/// WhatsApp gateway client
#[derive(Debug, Clone)]
pub struct WhatsappProvider {
    http_client: HttpClient,
    base_url: String,
    timeout: Duration,
}

impl WhatsappProvider {
    /// Create a new adapter against a gateway base URL
    pub fn new(base_url: String, timeout: Duration) -> Result<Self, ProviderError> {
        let http_client = HttpClient::builder()
            .user_agent("courier-providers/0.1.0")
            .build()
            .map_err(|e| ProviderError::HttpClient(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url,
            timeout,
        })
    }

    /// Endpoint and body for a payload: text by default, media endpoints
    /// when a media reference is present.
    fn request_parts(payload: &DispatchPayload, session_name: &str) -> (&'static str, Value) {
        let chat_id = payload.recipient.clone();

        if let Some(image_url) = &payload.image_url {
            return (
                "/api/sendImage",
                json!({
                    "session": session_name,
                    "chatId": chat_id,
                    "file": { "url": image_url },
                    "caption": payload.caption.clone().unwrap_or_default(),
                }),
            );
        }
        if let Some(video_url) = &payload.video_url {
            return (
                "/api/sendVideo",
                json!({
                    "session": session_name,
                    "chatId": chat_id,
                    "file": { "url": video_url },
                    "caption": payload.caption.clone().unwrap_or_default(),
                }),
            );
        }
        if let Some(document_url) = &payload.document_url {
            return (
                "/api/sendFile",
                json!({
                    "session": session_name,
                    "chatId": chat_id,
                    "file": {
                        "url": document_url,
                        "filename": payload.file_name.clone().unwrap_or_default(),
                    },
                    "caption": payload.caption.clone().unwrap_or_default(),
                }),
            );
        }

        (
            "/api/sendText",
            json!({
                "session": session_name,
                "chatId": chat_id,
                "text": payload.body.clone().unwrap_or_default(),
            }),
        )
    }
}

#[async_trait]
impl Provider for WhatsappProvider {
    fn name(&self) -> ProviderName {
        ProviderName::Whatsapp
    }

    async fn send(
        &self,
        payload: &DispatchPayload,
        credentials: &ProviderCredentials,
    ) -> SendOutcome {
        let ProviderCredentials::WhatsappSession {
            session_name,
            api_key,
        } = credentials
        else {
            return SendOutcome::failed(
                FailureCategory::Config,
                "whatsapp adapter received non-session credentials",
            );
        };

        let (path, body) = Self::request_parts(payload, session_name);
        let url = format!("{}{}", self.base_url, path);

        debug!(
            message_id = %payload.message_id,
            session = %session_name,
            endpoint = %path,
            "Sending WhatsApp message"
        );

        let response = self
            .http_client
            .post(&url)
            .header("X-Api-Key", api_key)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await;

        match response {
            Ok(response) if response.status().is_success() => SendOutcome::Delivered,
            Ok(response) => {
                let status = response.status();
                warn!(message_id = %payload.message_id, status = %status, "WhatsApp gateway rejected send");
                SendOutcome::failed(
                    categorize_status(status),
                    format!("whatsapp gateway returned {status}"),
                )
            }
            Err(err) if err.is_timeout() => SendOutcome::failed(
                FailureCategory::Temporary,
                "whatsapp call timed out".to_string(),
            ),
            Err(err) => {
                warn!(message_id = %payload.message_id, "WhatsApp call failed: {err}");
                SendOutcome::failed(
                    FailureCategory::Temporary,
                    "whatsapp call failed with a transport error".to_string(),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::model::{Channel, Message};
    use uuid::Uuid;

    fn whatsapp_message() -> Message {
        Message::new(
            Channel::Whatsapp,
            "5511999990000",
            Some(Uuid::new_v4()),
        )
    }

    #[test]
    fn test_text_endpoint() {
        let message = whatsapp_message().with_body(None, Some("hello".to_string()), false);
        let payload = DispatchPayload::from_message(&message);

        let (path, body) = WhatsappProvider::request_parts(&payload, "acme-main");
        assert_eq!(path, "/api/sendText");
        assert_eq!(body["session"], "acme-main");
        assert_eq!(body["chatId"], "5511999990000");
        assert_eq!(body["text"], "hello");
    }

    #[test]
    fn test_image_endpoint_takes_precedence() {
        let message = whatsapp_message()
            .with_body(None, Some("ignored".to_string()), false)
            .with_media(
                Some("https://cdn.acme.test/a.png".to_string()),
                None,
                None,
                None,
                Some("look".to_string()),
            );
        let payload = DispatchPayload::from_message(&message);

        let (path, body) = WhatsappProvider::request_parts(&payload, "acme-main");
        assert_eq!(path, "/api/sendImage");
        assert_eq!(body["file"]["url"], "https://cdn.acme.test/a.png");
        assert_eq!(body["caption"], "look");
    }

    #[test]
    fn test_document_endpoint_carries_filename() {
        let message = whatsapp_message().with_media(
            None,
            None,
            Some("https://cdn.acme.test/d.pdf".to_string()),
            Some("invoice.pdf".to_string()),
            None,
        );
        let payload = DispatchPayload::from_message(&message);

        let (path, body) = WhatsappProvider::request_parts(&payload, "acme-main");
        assert_eq!(path, "/api/sendFile");
        assert_eq!(body["file"]["filename"], "invoice.pdf");
    }

    #[tokio::test]
    async fn test_credential_kind_mismatch_is_config_failure() {
        let provider =
            WhatsappProvider::new("http://localhost:3000".to_string(), Duration::from_secs(30))
                .unwrap();
        let credentials = ProviderCredentials::Sendgrid {
            api_key: "k".to_string(),
            from_email: "a@b.c".to_string(),
            from_name: "A".to_string(),
        };
        let payload = DispatchPayload::from_message(&whatsapp_message());

        match provider.send(&payload, &credentials).await {
            SendOutcome::Failed { category, .. } => assert_eq!(category, FailureCategory::Config),
            _ => panic!("Expected CONFIG failure"),
        }
    }
}
