use async_trait::async_trait;

use super::Mailer;
use crate::error::MailError;

/// Development transport: records the send in the log and nothing else.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    fn name(&self) -> &str {
        "log"
    }

    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), MailError> {
        tracing::info!(to, subject, bytes = html_body.len(), "Email (log transport, not delivered)");
        Ok(())
    }
}
