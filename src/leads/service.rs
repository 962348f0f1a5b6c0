//! Lead lifecycle: creation, booking transitions and their side effects.
//!
//! Store failures propagate as [`LeadError`]. Mail and scheduler failures
//! are logged and swallowed here; they never undo a transition.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::model::{BookingWindow, Lead, LeadAction, LeadFilter, LeadStats, NewLead};
use super::templates::{self, TemplateLinks};
use crate::booking::webhook::TimingShape;
use crate::booking::{EventLookup, InviteeBooking};
use crate::error::LeadError;
use crate::mail::Mailer;
use crate::store::Database;

pub struct LeadService {
    store: Arc<dyn Database>,
    mailer: Arc<dyn Mailer>,
    events: Option<Arc<dyn EventLookup>>,
    links: TemplateLinks,
}

impl LeadService {
    pub fn new(store: Arc<dyn Database>, mailer: Arc<dyn Mailer>, links: TemplateLinks) -> Self {
        Self {
            store,
            mailer,
            events: None,
            links,
        }
    }

    /// Enable event-reference resolution for `mark_booked`.
    pub fn with_event_lookup(mut self, events: Arc<dyn EventLookup>) -> Self {
        self.events = Some(events);
        self
    }

    /// Persist a landing-page submission and run its side effects.
    pub async fn create_lead(&self, input: NewLead) -> Result<Lead, LeadError> {
        let action = input.action;
        let lead = Lead::from_submission(input, Utc::now());
        self.store.insert_lead(&lead).await?;
        info!(lead_id = %lead.id, tag = %lead.tag, source = %lead.source, "Lead created");

        if action == Some(LeadAction::Download) {
            self.send_guide(&lead).await;
        }

        Ok(lead)
    }

    async fn send_guide(&self, lead: &Lead) {
        let body = templates::guide_delivery_html(lead, &self.links);
        match self
            .mailer
            .send(&lead.email, templates::GUIDE_SUBJECT, &body)
            .await
        {
            Ok(()) => info!(lead_id = %lead.id, email = %lead.email, "Guide email sent"),
            Err(e) => warn!(
                lead_id = %lead.id,
                email = %lead.email,
                transport = self.mailer.name(),
                error = %e,
                "Guide email failed; lead kept"
            ),
        }
    }

    /// Move a lead to Booked Demo, resolving the slot from `event_ref` when possible.
    ///
    /// Safe to repeat. Without a resolved slot any recorded times are kept.
    pub async fn mark_booked(&self, id: Uuid, event_ref: Option<&str>) -> Result<Lead, LeadError> {
        let window = match event_ref.map(str::trim).filter(|r| !r.is_empty()) {
            Some(event_ref) => self.resolve_window(id, event_ref).await,
            None => None,
        };

        if !self.store.mark_lead_booked(id, window, Utc::now()).await? {
            return Err(LeadError::NotFound { id });
        }
        info!(lead_id = %id, with_times = window.is_some(), "Lead marked booked");

        self.get_lead(id).await
    }

    async fn resolve_window(&self, id: Uuid, event_ref: &str) -> Option<BookingWindow> {
        let Some(events) = &self.events else {
            debug!(lead_id = %id, "No event lookup configured; booking without times");
            return None;
        };
        match events.fetch_booking_window(event_ref).await {
            Ok(window) => Some(window),
            Err(e) => {
                warn!(lead_id = %id, event_ref, error = %e, "Event lookup failed; booking without times");
                None
            }
        }
    }

    /// Apply a webhook confirmation to the most recent lead with that email.
    ///
    /// Returns `None` when no lead matches; nothing is written then. A
    /// delivery without timing only fills the placeholder slot on a lead
    /// that has no recorded times yet.
    pub async fn confirm_booking(&self, booking: &InviteeBooking) -> Result<Option<Lead>, LeadError> {
        let Some(lead) = self.store.find_lead_by_email(&booking.email).await? else {
            info!(email = %booking.email, name = ?booking.name, "Booking confirmation matched no lead");
            return Ok(None);
        };

        let window = match booking.shape {
            TimingShape::Defaulted if lead.booking_window().is_some() => None,
            _ => Some(booking.window),
        };
        if !self
            .store
            .mark_lead_booked(lead.id, window, Utc::now())
            .await?
        {
            return Ok(None);
        }
        info!(
            lead_id = %lead.id,
            email = %booking.email,
            name = ?booking.name,
            shape = ?booking.shape,
            start = ?window.map(|w| w.start),
            end = ?window.map(|w| w.end),
            "Booking confirmed via webhook"
        );

        Ok(self.store.get_lead(lead.id).await?)
    }

    pub async fn get_lead(&self, id: Uuid) -> Result<Lead, LeadError> {
        self.store
            .get_lead(id)
            .await?
            .ok_or(LeadError::NotFound { id })
    }

    pub async fn list_leads(&self, filter: &LeadFilter) -> Result<Vec<Lead>, LeadError> {
        Ok(self.store.list_leads(filter).await?)
    }

    pub async fn stats(&self) -> Result<LeadStats, LeadError> {
        Ok(self.store.lead_stats().await?)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone};

    use super::*;
    use crate::error::{MailError, SchedulerError};
    use crate::leads::model::LeadTag;
    use crate::store::LibSqlBackend;

    /// Records every send; fails for addresses in `fail_for`.
    #[derive(Default)]
    pub(crate) struct RecordingMailer {
        pub sent: Mutex<Vec<(String, String)>>,
        pub fail_for: Vec<String>,
    }

    impl RecordingMailer {
        pub fn failing_for(addresses: &[&str]) -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                fail_for: addresses.iter().map(|a| a.to_string()).collect(),
            }
        }

        pub fn sent_to(&self) -> Vec<String> {
            self.sent.lock().unwrap().iter().map(|(to, _)| to.clone()).collect()
        }
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        fn name(&self) -> &str {
            "recording"
        }

        async fn send(&self, to: &str, subject: &str, _html_body: &str) -> Result<(), MailError> {
            if self.fail_for.iter().any(|a| a == to) {
                return Err(MailError::Transport {
                    transport: "recording".into(),
                    reason: "forced failure".into(),
                });
            }
            self.sent.lock().unwrap().push((to.to_string(), subject.to_string()));
            Ok(())
        }
    }

    struct FixedLookup(Result<BookingWindow, ()>);

    #[async_trait]
    impl EventLookup for FixedLookup {
        async fn fetch_booking_window(&self, event_ref: &str) -> Result<BookingWindow, SchedulerError> {
            self.0
                .map_err(|_| SchedulerError::Request(format!("unreachable: {event_ref}")))
        }
    }

    fn t(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, h, 0, 0).unwrap()
    }

    async fn service(mailer: Arc<RecordingMailer>) -> LeadService {
        let store: Arc<dyn Database> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        LeadService::new(store, mailer, TemplateLinks::default())
    }

    #[tokio::test]
    async fn download_creates_guide_lead_and_sends_once() {
        let mailer = Arc::new(RecordingMailer::default());
        let svc = service(mailer.clone()).await;

        let lead = svc
            .create_lead(NewLead::new("A", "a@x.com", "555").with_action(LeadAction::Download))
            .await
            .unwrap();
        assert_eq!(lead.tag, LeadTag::DownloadedGuide);
        assert!(!lead.booked);
        assert_eq!(mailer.sent_to(), vec!["a@x.com".to_string()]);
        assert_eq!(mailer.sent.lock().unwrap()[0].1, templates::GUIDE_SUBJECT);

        let stored = svc.get_lead(lead.id).await.unwrap();
        assert_eq!(stored, lead);
    }

    #[tokio::test]
    async fn guide_failure_does_not_block_creation() {
        let mailer = Arc::new(RecordingMailer::failing_for(&["a@x.com"]));
        let svc = service(mailer.clone()).await;

        let lead = svc
            .create_lead(NewLead::new("A", "a@x.com", "555").with_action(LeadAction::Download))
            .await
            .unwrap();
        assert_eq!(lead.tag, LeadTag::DownloadedGuide);
        assert!(mailer.sent_to().is_empty());
        assert!(svc.get_lead(lead.id).await.is_ok());
    }

    #[tokio::test]
    async fn book_and_plain_submissions_send_nothing() {
        let mailer = Arc::new(RecordingMailer::default());
        let svc = service(mailer.clone()).await;

        let booked = svc
            .create_lead(NewLead::new("B", "b@x.com", "555").with_action(LeadAction::Book))
            .await
            .unwrap();
        assert_eq!(booked.tag, LeadTag::BookedDemo);
        assert!(booked.booked);

        let plain = svc.create_lead(NewLead::new("C", "c@x.com", "555")).await.unwrap();
        assert_eq!(plain.tag, LeadTag::NewLead);
        assert!(!plain.booked);

        assert!(mailer.sent_to().is_empty());
    }

    #[tokio::test]
    async fn mark_booked_without_reference_is_idempotent() {
        let svc = service(Arc::new(RecordingMailer::default())).await;
        let lead = svc
            .create_lead(NewLead::new("A", "a@x.com", "555").with_action(LeadAction::Download))
            .await
            .unwrap();

        for _ in 0..2 {
            let updated = svc.mark_booked(lead.id, None).await.unwrap();
            assert_eq!(updated.tag, LeadTag::BookedDemo);
            assert!(updated.booked);
            assert!(updated.booking_start_time.is_none());
            assert!(updated.updated_at >= lead.updated_at);
        }
    }

    #[tokio::test]
    async fn mark_booked_unknown_lead() {
        let svc = service(Arc::new(RecordingMailer::default())).await;
        let id = Uuid::new_v4();
        let err = svc.mark_booked(id, None).await.unwrap_err();
        assert!(matches!(err, LeadError::NotFound { id: missing } if missing == id));
    }

    #[tokio::test]
    async fn mark_booked_uses_resolved_window() {
        let window = BookingWindow::new(t(10), t(11)).unwrap();
        let svc = service(Arc::new(RecordingMailer::default()))
            .await
            .with_event_lookup(Arc::new(FixedLookup(Ok(window))));
        let lead = svc.create_lead(NewLead::new("A", "a@x.com", "555")).await.unwrap();

        let updated = svc.mark_booked(lead.id, Some("evt-ref")).await.unwrap();
        assert_eq!(updated.booking_window(), Some(window));
        assert_eq!(updated.tag, LeadTag::BookedDemo);
    }

    #[tokio::test]
    async fn lookup_failure_still_books_and_keeps_times() {
        let window = BookingWindow::new(t(10), t(11)).unwrap();
        let store: Arc<dyn Database> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let mailer: Arc<dyn Mailer> = Arc::new(RecordingMailer::default());

        let ok = LeadService::new(store.clone(), mailer.clone(), TemplateLinks::default())
            .with_event_lookup(Arc::new(FixedLookup(Ok(window))));
        let lead = ok.create_lead(NewLead::new("A", "a@x.com", "555")).await.unwrap();
        ok.mark_booked(lead.id, Some("first")).await.unwrap();

        let failing = LeadService::new(store, mailer, TemplateLinks::default())
            .with_event_lookup(Arc::new(FixedLookup(Err(()))));
        let updated = failing.mark_booked(lead.id, Some("second")).await.unwrap();
        assert!(updated.booked);
        assert_eq!(updated.booking_window(), Some(window));
    }

    #[tokio::test]
    async fn webhook_confirmation_sets_times() {
        let svc = service(Arc::new(RecordingMailer::default())).await;
        let lead = svc
            .create_lead(NewLead::new("A", "a@x.com", "555").with_action(LeadAction::Download))
            .await
            .unwrap();

        let booking = InviteeBooking {
            email: "A@X.com".into(),
            name: Some("A".into()),
            window: BookingWindow::new(t(9), t(10)).unwrap(),
            shape: TimingShape::Flat,
        };
        let updated = svc.confirm_booking(&booking).await.unwrap().unwrap();
        assert_eq!(updated.id, lead.id);
        assert!(updated.booked);
        assert_eq!(updated.tag, LeadTag::BookedDemo);
        assert_eq!(updated.booking_start_time, Some(t(9)));
        assert_eq!(updated.booking_end_time, Some(t(10)));

        // Redelivery is harmless.
        let again = svc.confirm_booking(&booking).await.unwrap().unwrap();
        assert_eq!(again.booking_window(), updated.booking_window());
    }

    #[tokio::test]
    async fn untimed_redelivery_keeps_confirmed_times() {
        let window = BookingWindow::new(t(10), t(11)).unwrap();
        let svc = service(Arc::new(RecordingMailer::default()))
            .await
            .with_event_lookup(Arc::new(FixedLookup(Ok(window))));
        let lead = svc.create_lead(NewLead::new("A", "a@x.com", "555")).await.unwrap();
        svc.mark_booked(lead.id, Some("evt-ref")).await.unwrap();

        let untimed = InviteeBooking {
            email: "a@x.com".into(),
            name: None,
            window: BookingWindow::default_from(t(20)),
            shape: TimingShape::Defaulted,
        };
        let updated = svc.confirm_booking(&untimed).await.unwrap().unwrap();
        assert!(updated.booked);
        assert_eq!(updated.booking_window(), Some(window));
    }

    #[tokio::test]
    async fn untimed_confirmation_fills_placeholder_when_no_times() {
        let svc = service(Arc::new(RecordingMailer::default())).await;
        svc.create_lead(NewLead::new("A", "a@x.com", "555")).await.unwrap();

        let untimed = InviteeBooking {
            email: "a@x.com".into(),
            name: Some("A".into()),
            window: BookingWindow::default_from(t(20)),
            shape: TimingShape::Defaulted,
        };
        let updated = svc.confirm_booking(&untimed).await.unwrap().unwrap();
        assert_eq!(updated.booking_window(), Some(BookingWindow::default_from(t(20))));
    }

    #[tokio::test]
    async fn webhook_without_match_changes_nothing() {
        let svc = service(Arc::new(RecordingMailer::default())).await;
        let lead = svc.create_lead(NewLead::new("A", "a@x.com", "555")).await.unwrap();

        let booking = InviteeBooking {
            email: "nobody@x.com".into(),
            name: None,
            window: BookingWindow::default_from(t(9)),
            shape: TimingShape::Defaulted,
        };
        assert!(svc.confirm_booking(&booking).await.unwrap().is_none());

        let unchanged = svc.get_lead(lead.id).await.unwrap();
        assert_eq!(unchanged, lead);
    }

    #[tokio::test]
    async fn stats_and_filtered_list() {
        let svc = service(Arc::new(RecordingMailer::default())).await;
        svc.create_lead(NewLead::new("A", "a@x.com", "1").with_action(LeadAction::Download))
            .await
            .unwrap();
        svc.create_lead(NewLead::new("B", "b@x.com", "2").with_action(LeadAction::Book))
            .await
            .unwrap();
        svc.create_lead(NewLead::new("C", "c@x.com", "3")).await.unwrap();

        let stats = svc.stats().await.unwrap();
        assert_eq!(stats.total_leads, 3);
        assert_eq!(stats.downloaded_guide, 1);
        assert_eq!(stats.booked_demo, 1);

        let filter = LeadFilter {
            tag: Some(LeadTag::BookedDemo),
            ..Default::default()
        };
        let booked = svc.list_leads(&filter).await.unwrap();
        assert_eq!(booked.len(), 1);
        assert_eq!(booked[0].email, "b@x.com");
        assert_eq!(svc.list_leads(&LeadFilter::default()).await.unwrap().len(), 3);
    }
}
