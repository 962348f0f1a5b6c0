//! 24h follow-up sweep.
//!
//! Each sweep selects leads that downloaded the guide, never booked and
//! were never reminded, sends the reminder, and marks each lead on its own
//! once its send succeeds. The mark is conditional on the flag still being
//! unset, so an overlapping sweep cannot claim the same lead twice.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::ReminderConfig;
use crate::error::{ConfigError, Error};
use crate::leads::model::Lead;
use crate::leads::templates::{self, TemplateLinks};
use crate::mail::Mailer;
use crate::store::Database;

/// Counts from one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub candidates: usize,
    pub sent: usize,
    /// Sends that failed; these leads stay eligible.
    pub failed: usize,
    /// Sent, but another sweep had already marked the lead.
    pub already_marked: usize,
    /// Sent, but the mark write failed; the lead will be reminded again.
    pub mark_failed: usize,
}

enum Outcome {
    Sent,
    SendFailed,
    AlreadyMarked,
    MarkFailed,
}

pub struct ReminderWorker {
    store: Arc<dyn Database>,
    mailer: Arc<dyn Mailer>,
    links: TemplateLinks,
    config: ReminderConfig,
}

impl ReminderWorker {
    pub fn new(
        store: Arc<dyn Database>,
        mailer: Arc<dyn Mailer>,
        links: TemplateLinks,
        config: ReminderConfig,
    ) -> Self {
        Self {
            store,
            mailer,
            links,
            config,
        }
    }

    /// Run one scan-send-mark cycle as of `now`.
    ///
    /// Fails without sending anything when the store is unreachable or the
    /// configured delay reaches outside the representable time range.
    pub async fn run_sweep(&self, now: DateTime<Utc>) -> Result<SweepReport, Error> {
        let cutoff = now
            .checked_sub_signed(self.config.delay)
            .ok_or_else(|| ConfigError::InvalidValue {
                key: "REMINDER_DELAY_HOURS".to_string(),
                message: format!("delay {} reaches outside the time range", self.config.delay),
            })?;
        let mut candidates = self.store.reminder_candidates(cutoff).await?;
        candidates.retain(|lead| lead.is_reminder_eligible(cutoff));

        let mut report = SweepReport {
            candidates: candidates.len(),
            ..Default::default()
        };
        if candidates.is_empty() {
            return Ok(report);
        }
        info!(count = candidates.len(), %cutoff, "Reminder sweep found candidates");

        let outcomes: Vec<Outcome> = stream::iter(candidates)
            .map(|lead| self.remind(lead))
            .buffer_unordered(self.config.max_concurrent.max(1))
            .collect()
            .await;

        for outcome in outcomes {
            match outcome {
                Outcome::Sent => report.sent += 1,
                Outcome::SendFailed => report.failed += 1,
                Outcome::AlreadyMarked => report.already_marked += 1,
                Outcome::MarkFailed => report.mark_failed += 1,
            }
        }

        info!(
            sent = report.sent,
            failed = report.failed,
            mark_failed = report.mark_failed,
            "Reminder sweep finished"
        );
        Ok(report)
    }

    async fn remind(&self, lead: Lead) -> Outcome {
        let body = templates::reminder_html(&lead, &self.links);
        if let Err(e) = self
            .mailer
            .send(&lead.email, templates::REMINDER_SUBJECT, &body)
            .await
        {
            warn!(
                lead_id = %lead.id,
                email = %lead.email,
                error = %e,
                "Reminder send failed; will retry next sweep"
            );
            return Outcome::SendFailed;
        }

        match self.store.mark_reminder_sent(lead.id, Utc::now()).await {
            Ok(true) => {
                info!(lead_id = %lead.id, email = %lead.email, "Reminder sent");
                Outcome::Sent
            }
            Ok(false) => {
                warn!(lead_id = %lead.id, "Reminder sent but lead was already marked");
                Outcome::AlreadyMarked
            }
            Err(e) => {
                error!(
                    lead_id = %lead.id,
                    email = %lead.email,
                    error = %e,
                    "Reminder sent but marking failed; lead will be reminded again"
                );
                Outcome::MarkFailed
            }
        }
    }
}

/// Next fire time of a cron expression after `after`.
fn next_fire(schedule: &cron::Schedule, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
    schedule.after(&after).next()
}

/// Spawn the sweep loop on `schedule` (cron with a seconds field).
///
/// Sweeps run one at a time; a sweep that overruns its slot delays the
/// next fire rather than overlapping it.
pub fn spawn_reminder_worker(
    worker: Arc<ReminderWorker>,
    schedule: &str,
) -> Result<JoinHandle<()>, ConfigError> {
    let schedule = cron::Schedule::from_str(schedule).map_err(|e| ConfigError::InvalidValue {
        key: "REMINDER_SCHEDULE".to_string(),
        message: format!("invalid cron: {e}"),
    })?;

    Ok(tokio::spawn(async move {
        loop {
            let now = Utc::now();
            let Some(next) = next_fire(&schedule, now) else {
                warn!("Reminder schedule has no future fire times; stopping");
                return;
            };
            let wait = (next - now).to_std().unwrap_or_default();
            tokio::time::sleep(wait).await;

            if let Err(e) = worker.run_sweep(Utc::now()).await {
                error!(error = %e, "Reminder sweep failed");
            }
        }
    }))
}
