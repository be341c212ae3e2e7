//! HTTP e-mail API transport
//!
//! Posts a JSON send request in the shape used by Brevo-style transactional
//! APIs and authenticates with an `api-key` header.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use courier_core::{Message, Transport, TransportError, TransportReceipt};
use courier_shared::utils::email::mask_email;
use courier_shared::EmailConfig;

use super::Sender;
use crate::InfrastructureError;

/// Upper bound for a single HTTP round trip; the coordinator applies its own
/// per-attempt timeout on top
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmailAddress {
    email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendEmailBody {
    sender: EmailAddress,
    to: Vec<EmailAddress>,
    subject: String,
    text_content: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendEmailResponse {
    #[serde(default)]
    message_id: Option<String>,
}

/// Transport for JSON e-mail sending APIs
pub struct HttpApiTransport {
    client: Client,
    url: String,
    api_key: String,
    sender: Sender,
}

impl HttpApiTransport {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>, sender: Sender) -> Result<Self, InfrastructureError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("courier/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            url: url.into(),
            api_key: api_key.into(),
            sender,
        })
    }

    /// Create a transport from the `EMAIL_API_*` settings
    pub fn from_config(config: &EmailConfig) -> Result<Self, InfrastructureError> {
        let settings = config
            .http_api
            .as_ref()
            .ok_or_else(|| InfrastructureError::Config("EMAIL_API_URL is required".to_string()))?;

        Self::new(&settings.url, &settings.api_key, Sender::from_config(config))
    }

    fn body_for(&self, message: &Message) -> SendEmailBody {
        SendEmailBody {
            sender: EmailAddress {
                email: self.sender.address.clone(),
                name: self.sender.name.clone(),
            },
            to: vec![EmailAddress {
                email: message.to().to_string(),
                name: None,
            }],
            subject: message.subject().to_string(),
            text_content: message.body().to_string(),
        }
    }
}

#[async_trait]
impl Transport for HttpApiTransport {
    async fn send(&self, message: &Message) -> Result<TransportReceipt, TransportError> {
        let response = self
            .client
            .post(&self.url)
            .header("api-key", &self.api_key)
            .header("Accept", "application/json")
            .json(&self.body_for(message))
            .send()
            .await
            .map_err(|e| TransportError::Transient(format!("request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            let parsed: SendEmailResponse = response.json().await.unwrap_or_default();
            debug!(
                recipient = %mask_email(message.to()),
                status = status.as_u16(),
                "E-mail API accepted message"
            );
            return Ok(TransportReceipt::new("http", parsed.message_id));
        }

        let body = response.text().await.unwrap_or_default();
        Err(classify_status(status, &body))
    }

    fn provider_name(&self) -> &str {
        "http"
    }
}

/// Throttling, timeouts and server errors can be retried; other 4xx cannot
fn classify_status(status: StatusCode, body: &str) -> TransportError {
    let detail = format!("e-mail API returned {}: {}", status.as_u16(), truncate(body, 200));
    if status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
    {
        TransportError::Transient(detail)
    } else {
        TransportError::Permanent(detail)
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
