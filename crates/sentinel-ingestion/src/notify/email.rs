//! Email channel over an HTTP email API (Resend-compatible).
//!
//! Sends `{from, to, subject, html, text}` as JSON with a bearer key. The
//! HTML body lists the matched document links.
//!
//! There is no SMTP transport. A custom `endpoint` must accept the same JSON
//! request and answer with `{"id": ...}`; an SMTP relay needs an HTTP bridge
//! in front of it.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use sentinel_common::{Result, SandboxClient, SentinelError};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use super::{NotificationRequest, Notifier};

pub const RESEND_API_URL: &str = "https://api.resend.com/emails";

pub struct EmailNotifier {
    client: SandboxClient,
    api_key: SecretString,
    from: String,
    to: Vec<String>,
    endpoint: String,
}

#[derive(Debug, Serialize)]
struct EmailPayload<'a> {
    from: &'a str,
    to: &'a [String],
    subject: &'a str,
    html: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmailSuccessResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct EmailErrorResponse {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl EmailNotifier {
    pub fn new(client: SandboxClient, api_key: SecretString, from: impl Into<String>, to: Vec<String>) -> Self {
        Self {
            client,
            api_key,
            from: from.into(),
            to,
            endpoint: RESEND_API_URL.to_string(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    fn channel(&self) -> &str {
        "email"
    }

    #[instrument(skip(self, request), fields(to = ?self.to))]
    async fn send(&self, request: &NotificationRequest) -> Result<()> {
        if self.to.is_empty() {
            return Err(SentinelError::notification("email", "no recipients configured"));
        }

        let payload = EmailPayload {
            from: &self.from,
            to: &self.to,
            subject: &request.title,
            html: &request.html,
            text: &request.message,
        };

        let resp = self
            .client
            .post(&self.endpoint)?
            .bearer_auth(self.api_key.expose_secret())
            .json(&payload)
            .send()
            .await
            .map_err(|e| SentinelError::notification("email", e))?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();

        if status.is_success() {
            match serde_json::from_str::<EmailSuccessResponse>(&body) {
                Ok(ok) => info!(id = %ok.id, "✅ Email notification sent"),
                Err(e) => warn!(error = %e, "Email API response parse error, message likely sent"),
            }
            return Ok(());
        }

        let reason = serde_json::from_str::<EmailErrorResponse>(&body)
            .ok()
            .and_then(|err| err.message.or(err.name))
            .unwrap_or(body);
        Err(SentinelError::notification("email", format!("HTTP {status}: {reason}")))
    }
}
