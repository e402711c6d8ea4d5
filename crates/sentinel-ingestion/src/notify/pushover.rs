//! Pushover push-notification channel.
//! Endpoint: https://api.pushover.net/1/messages.json (form POST).

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use sentinel_common::{Result, SandboxClient, SentinelError};
use serde::Deserialize;
use tracing::{info, instrument};

use super::{truncate_chars, NotificationRequest, Notifier};

pub const PUSHOVER_API_URL: &str = "https://api.pushover.net/1/messages.json";

const MAX_TITLE_CHARS: usize = 250;
const MAX_MESSAGE_CHARS: usize = 1024;

pub struct PushoverNotifier {
    client: SandboxClient,
    token: SecretString,
    user: SecretString,
    priority: Option<i8>,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct PushoverResponse {
    status: i64,
    #[serde(default)]
    errors: Vec<String>,
}

impl PushoverNotifier {
    pub fn new(client: SandboxClient, token: SecretString, user: SecretString) -> Self {
        Self {
            client,
            token,
            user,
            priority: None,
            endpoint: PUSHOVER_API_URL.to_string(),
        }
    }

    pub fn with_priority(mut self, priority: Option<i8>) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn form(&self, request: &NotificationRequest) -> Vec<(&'static str, String)> {
        let mut form = vec![
            ("token", self.token.expose_secret().to_string()),
            ("user", self.user.expose_secret().to_string()),
            ("title", truncate_chars(&request.title, MAX_TITLE_CHARS)),
            ("message", truncate_chars(&request.message, MAX_MESSAGE_CHARS)),
        ];
        if let Some(priority) = self.priority {
            form.push(("priority", priority.to_string()));
        }
        form
    }
}

#[async_trait]
impl Notifier for PushoverNotifier {
    fn channel(&self) -> &str {
        "pushover"
    }

    #[instrument(skip(self, request), fields(title = %request.title))]
    async fn send(&self, request: &NotificationRequest) -> Result<()> {
        let resp = self
            .client
            .post(&self.endpoint)?
            .form(&self.form(request))
            .send()
            .await
            .map_err(|e| SentinelError::notification("pushover", e))?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(SentinelError::notification("pushover", format!("HTTP {status}: {body}")));
        }

        match serde_json::from_str::<PushoverResponse>(&body) {
            Ok(parsed) if parsed.status == 1 => {
                info!("✅ Pushover notification sent");
                Ok(())
            }
            Ok(parsed) => Err(SentinelError::notification(
                "pushover",
                format!("rejected: {}", parsed.errors.join("; ")),
            )),
            // A 2xx with an unexpected body most likely still delivered.
            Err(_) => {
                info!("Pushover accepted the request (unrecognised response body)");
                Ok(())
            }
        }
    }
}
