//! OneSignal email API transport.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::Mailer;
use crate::error::MailError;

const ONESIGNAL_NOTIFICATIONS_URL: &str = "https://onesignal.com/api/v1/notifications";

pub struct OneSignalMailer {
    app_id: String,
    api_key: SecretString,
    endpoint: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct NotificationRequest<'a> {
    app_id: &'a str,
    include_email_tokens: [&'a str; 1],
    email_subject: &'a str,
    email_body: &'a str,
}

#[derive(Debug, Deserialize)]
struct NotificationResponse {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    errors: Option<serde_json::Value>,
}

impl OneSignalMailer {
    pub fn new(app_id: String, api_key: SecretString) -> Self {
        Self {
            app_id,
            api_key,
            endpoint: ONESIGNAL_NOTIFICATIONS_URL.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Point at a different notifications endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl Mailer for OneSignalMailer {
    fn name(&self) -> &str {
        "onesignal"
    }

    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), MailError> {
        let body = NotificationRequest {
            app_id: &self.app_id,
            include_email_tokens: [to],
            email_subject: subject,
            email_body: html_body,
        };

        let resp = self
            .client
            .post(&self.endpoint)
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Basic {}", self.api_key.expose_secret()),
            )
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| MailError::Transport {
                transport: "onesignal".into(),
                reason: e.to_string(),
            })?;

        let status = resp.status();
        let parsed: NotificationResponse = resp.json().await.map_err(|e| MailError::Transport {
            transport: "onesignal".into(),
            reason: format!("unreadable response (status {status}): {e}"),
        })?;

        // OneSignal reports some rejections with a 200 and an `errors` field.
        if let Some(errors) = parsed.errors.filter(|e| !e.is_null()) {
            return Err(MailError::Rejected(errors.to_string()));
        }
        if !status.is_success() {
            return Err(MailError::Transport {
                transport: "onesignal".into(),
                reason: format!("status {status}"),
            });
        }

        tracing::info!(to, notification_id = ?parsed.id, "Email sent via OneSignal");
        Ok(())
    }
}
