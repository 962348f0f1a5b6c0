//! Outbound email — a single `send(to, subject, html)` capability.
//!
//! Callers in the lead pipeline treat every failure as non-fatal; the
//! transports only report what went wrong.

mod log;
mod onesignal;
mod smtp;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::MailConfig;
use crate::error::MailError;

pub use log::LogMailer;
pub use onesignal::OneSignalMailer;
pub use smtp::SmtpMailer;

/// Something that can deliver an HTML email.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Transport name for logs.
    fn name(&self) -> &str;

    /// Deliver one message.
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), MailError>;
}

/// Build the configured transport.
pub fn build_mailer(config: &MailConfig) -> Arc<dyn Mailer> {
    match config {
        MailConfig::OneSignal { app_id, api_key } => {
            Arc::new(OneSignalMailer::new(app_id.clone(), api_key.clone()))
        }
        MailConfig::Smtp(smtp) => Arc::new(SmtpMailer::new(smtp.clone())),
        MailConfig::Log => {
            tracing::warn!("No mail transport configured; outgoing email will only be logged");
            Arc::new(LogMailer)
        }
    }
}
