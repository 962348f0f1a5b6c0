//! SMTP transport via lettre.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use secrecy::ExposeSecret;

use super::Mailer;
use crate::config::SmtpConfig;
use crate::error::MailError;

pub struct SmtpMailer {
    config: SmtpConfig,
}

impl SmtpMailer {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }

    fn build_message(&self, to: &str, subject: &str, html_body: &str) -> Result<Message, MailError> {
        Message::builder()
            .from(self.config.from_address.parse().map_err(|e| {
                MailError::InvalidAddress {
                    address: self.config.from_address.clone(),
                    reason: format!("{e}"),
                }
            })?)
            .to(to.parse().map_err(|e| MailError::InvalidAddress {
                address: to.to_string(),
                reason: format!("{e}"),
            })?)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html_body.to_string())
            .map_err(|e| MailError::Build(e.to_string()))
    }
}

/// Blocking SMTP round trip; run on the blocking pool.
fn send_blocking(config: &SmtpConfig, email: &Message) -> Result<(), MailError> {
    let transport_err = |reason: String| MailError::Transport {
        transport: "smtp".into(),
        reason,
    };

    let creds = Credentials::new(
        config.username.clone(),
        config.password.expose_secret().to_string(),
    );

    let transport = SmtpTransport::relay(&config.host)
        .map_err(|e| transport_err(format!("SMTP relay error: {e}")))?
        .port(config.port)
        .credentials(creds)
        .build();

    transport
        .send(email)
        .map_err(|e| transport_err(format!("SMTP send failed: {e}")))?;
    Ok(())
}

#[async_trait]
impl Mailer for SmtpMailer {
    fn name(&self) -> &str {
        "smtp"
    }

    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), MailError> {
        let email = self.build_message(to, subject, html_body)?;
        let config = self.config.clone();

        tokio::task::spawn_blocking(move || send_blocking(&config, &email))
            .await
            .map_err(|e| MailError::Transport {
                transport: "smtp".into(),
                reason: format!("send task failed: {e}"),
            })??;

        tracing::info!(to, "Email sent via SMTP");
        Ok(())
    }
}
