//! SendGrid email adapter (v3 mail/send)

use crate::{categorize_status, Provider, ProviderError, ProviderName, SendOutcome};
use async_trait::async_trait;
use courier_core::model::{FailureCategory, ProviderCredentials};
use courier_core::payload::DispatchPayload;
use reqwest::Client as HttpClient;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

const DEFAULT_BASE_URL: &str = "https://api.sendgrid.com";

/// SendGrid v3 client
#[derive(Debug, Clone)]
pub struct SendgridProvider {
    http_client: HttpClient,
    base_url: String,
    timeout: Duration,
}

impl SendgridProvider {
    /// Create a new adapter. `base_url` override exists for tests and
    /// regional endpoints; `timeout` bounds each mail/send call.
    pub fn new(base_url: Option<String>, timeout: Duration) -> Result<Self, ProviderError> {
        let http_client = HttpClient::builder()
            .user_agent("courier-providers/0.1.0")
            .build()
            .map_err(|e| ProviderError::HttpClient(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            timeout,
        })
    }

    fn mail_body(payload: &DispatchPayload, from_email: &str, from_name: &str) -> serde_json::Value {
        let content_type = if payload.is_html {
            "text/html"
        } else {
            "text/plain"
        };

        json!({
            "personalizations": [{
                "to": [{ "email": payload.recipient }]
            }],
            "from": {
                "email": from_email,
                "name": from_name,
            },
            "subject": payload.subject.clone().unwrap_or_default(),
            "content": [{
                "type": content_type,
                "value": payload.body.clone().unwrap_or_default(),
            }],
        })
    }
}

#[async_trait]
impl Provider for SendgridProvider {
    fn name(&self) -> ProviderName {
        ProviderName::Sendgrid
    }

    async fn send(
        &self,
        payload: &DispatchPayload,
        credentials: &ProviderCredentials,
    ) -> SendOutcome {
        let ProviderCredentials::Sendgrid {
            api_key,
            from_email,
            from_name,
        } = credentials
        else {
            return SendOutcome::failed(
                FailureCategory::Config,
                "sendgrid adapter received non-sendgrid credentials",
            );
        };

        let url = format!("{}/v3/mail/send", self.base_url);
        let body = Self::mail_body(payload, from_email, from_name);

        debug!(message_id = %payload.message_id, recipient = %payload.recipient, "Sending email");

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(api_key)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await;

        match response {
            Ok(response) if response.status().is_success() => SendOutcome::Delivered,
            Ok(response) => {
                let status = response.status();
                warn!(message_id = %payload.message_id, status = %status, "SendGrid rejected send");
                // Status line only; the response body is never propagated.
                SendOutcome::failed(
                    categorize_status(status),
                    format!("sendgrid returned {status}"),
                )
            }
            Err(err) if err.is_timeout() => SendOutcome::failed(
                FailureCategory::Temporary,
                "sendgrid call timed out".to_string(),
            ),
            Err(err) => {
                warn!(message_id = %payload.message_id, "SendGrid call failed: {err}");
                SendOutcome::failed(
                    FailureCategory::Temporary,
                    "sendgrid call failed with a transport error".to_string(),
                )
            }
        }
    }
}
