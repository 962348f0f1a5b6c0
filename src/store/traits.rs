//! `Database` trait — single async interface for all persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::leads::model::{BookingWindow, Lead, LeadFilter, LeadStats};

/// Backend-agnostic database trait covering leads and admin sessions.
///
/// Every mutation is a single-row keyed write; nothing here needs a
/// multi-row transaction.
#[async_trait]
pub trait Database: Send + Sync {
    /// Run all pending schema migrations.
    async fn init_schema(&self) -> Result<(), DatabaseError>;

    // ── Leads ───────────────────────────────────────────────────────

    /// Insert a new lead.
    async fn insert_lead(&self, lead: &Lead) -> Result<(), DatabaseError>;

    /// Get a lead by ID.
    async fn get_lead(&self, id: Uuid) -> Result<Option<Lead>, DatabaseError>;

    /// Most recently created lead with this email (case-insensitive).
    async fn find_lead_by_email(&self, email: &str) -> Result<Option<Lead>, DatabaseError>;

    /// Leads matching the filter, newest first.
    async fn list_leads(&self, filter: &LeadFilter) -> Result<Vec<Lead>, DatabaseError>;

    /// Totals per pipeline stage.
    async fn lead_stats(&self) -> Result<LeadStats, DatabaseError>;

    /// Move a lead to Booked Demo.
    ///
    /// When `window` is `None` any previously recorded times are kept.
    /// Returns `false` if no lead has this ID.
    async fn mark_lead_booked(
        &self,
        id: Uuid,
        window: Option<BookingWindow>,
        now: DateTime<Utc>,
    ) -> Result<bool, DatabaseError>;

    /// Leads owed a follow-up: Downloaded Guide, not booked, not reminded,
    /// created strictly before `cutoff`.
    async fn reminder_candidates(&self, cutoff: DateTime<Utc>) -> Result<Vec<Lead>, DatabaseError>;

    /// Set `reminder_sent` if it is still unset.
    ///
    /// Returns `false` when the flag was already set (or the lead is gone).
    async fn mark_reminder_sent(&self, id: Uuid, now: DateTime<Utc>) -> Result<bool, DatabaseError>;

    // ── Admin sessions ──────────────────────────────────────────────

    /// Persist a newly issued session token.
    async fn insert_session(
        &self,
        token: &str,
        subject: &str,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<(), DatabaseError>;

    /// Subject of an unexpired session, if any.
    async fn session_subject(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<String>, DatabaseError>;

    /// Revoke a session. Unknown tokens are ignored.
    async fn delete_session(&self, token: &str) -> Result<(), DatabaseError>;

    /// Delete sessions past their expiry. Returns how many were removed.
    async fn purge_expired_sessions(&self, now: DateTime<Utc>) -> Result<usize, DatabaseError>;
}
