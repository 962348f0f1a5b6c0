//! libSQL backend — async `Database` trait implementation.
//!
//! Supports local file and in-memory databases. Timestamps are stored as
//! fixed-width RFC 3339 UTC text so that string comparison in SQL matches
//! chronological order.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::leads::model::{Attribution, BookingWindow, Lead, LeadFilter, LeadStats, LeadTag};
use crate::store::migrations;
use crate::store::traits::Database;

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.init_schema().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.init_schema().await?;
        Ok(backend)
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }

    async fn query_leads(
        &self,
        op: &str,
        sql: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<Vec<Lead>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(sql, params)
            .await
            .map_err(|e| DatabaseError::Query(format!("{op}: {e}")))?;

        let mut leads = Vec::new();
        loop {
            match rows.next().await {
                Ok(Some(row)) => match row_to_lead(&row) {
                    Ok(lead) => leads.push(lead),
                    Err(e) => warn!("Skipping lead row in {op}: {e}"),
                },
                Ok(None) => break,
                Err(e) => return Err(DatabaseError::Query(format!("{op}: {e}"))),
            }
        }
        Ok(leads)
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Canonical write format: RFC 3339, nanoseconds, `Z` suffix.
fn fmt_ts(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn parse_optional_datetime(s: &Option<String>) -> Option<DateTime<Utc>> {
    s.as_ref().map(|s| parse_datetime(s))
}

/// Convert `Option<&str>` to libsql Value.
fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

fn opt_bool(b: Option<bool>) -> libsql::Value {
    match b {
        Some(b) => libsql::Value::Integer(i64::from(b)),
        None => libsql::Value::Null,
    }
}

fn opt_ts(dt: Option<DateTime<Utc>>) -> libsql::Value {
    match dt {
        Some(dt) => libsql::Value::Text(fmt_ts(&dt)),
        None => libsql::Value::Null,
    }
}

const LEAD_COLUMNS: &str = "id, name, email, phone, business_type, monthly_budget, ready_to_automate, source, tag, booked, reminder_sent, booking_start_time, booking_end_time, utm_source, utm_medium, utm_campaign, utm_content, utm_term, fbclid, referrer, created_at, updated_at";

/// Map a libsql Row to a Lead. Column order matches `LEAD_COLUMNS`.
///
/// Unknown enum labels in optional columns read back as `None` rather
/// than failing the whole row.
fn row_to_lead(row: &libsql::Row) -> Result<Lead, libsql::Error> {
    let id_str: String = row.get(0)?;
    let tag_str: String = row.get(8)?;
    let created_str: String = row.get(20)?;
    let updated_str: String = row.get(21)?;

    let tag: LeadTag = tag_str.parse().unwrap_or_else(|e| {
        warn!(lead_id = %id_str, "{e}; treating as New Lead");
        LeadTag::NewLead
    });

    Ok(Lead {
        id: Uuid::parse_str(&id_str).unwrap_or_else(|_| Uuid::nil()),
        name: row.get(1)?,
        email: row.get(2)?,
        phone: row.get(3)?,
        business_type: row
            .get::<String>(4)
            .ok()
            .and_then(|s| s.parse().ok()),
        monthly_budget: row
            .get::<String>(5)
            .ok()
            .and_then(|s| s.parse().ok()),
        ready_to_automate: row.get::<i64>(6).ok().map(|v| v != 0),
        source: row.get(7)?,
        tag,
        booked: row.get::<i64>(9)? != 0,
        reminder_sent: row.get::<i64>(10)? != 0,
        booking_start_time: parse_optional_datetime(&row.get::<String>(11).ok()),
        booking_end_time: parse_optional_datetime(&row.get::<String>(12).ok()),
        attribution: Attribution {
            utm_source: row.get(13).ok(),
            utm_medium: row.get(14).ok(),
            utm_campaign: row.get(15).ok(),
            utm_content: row.get(16).ok(),
            utm_term: row.get(17).ok(),
            fbclid: row.get(18).ok(),
            referrer: row.get(19).ok(),
        },
        created_at: parse_datetime(&created_str),
        updated_at: parse_datetime(&updated_str),
    })
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl Database for LibSqlBackend {
    async fn init_schema(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    // ── Leads ───────────────────────────────────────────────────────

    async fn insert_lead(&self, lead: &Lead) -> Result<(), DatabaseError> {
        let a = &lead.attribution;
        self.conn()
            .execute(
                &format!(
                    "INSERT INTO leads ({LEAD_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22)"
                ),
                params![
                    lead.id.to_string(),
                    lead.name.clone(),
                    lead.email.clone(),
                    lead.phone.clone(),
                    opt_text(lead.business_type.as_ref().map(|b| b.as_str())),
                    opt_text(lead.monthly_budget.as_ref().map(|b| b.as_str())),
                    opt_bool(lead.ready_to_automate),
                    lead.source.clone(),
                    lead.tag.as_str(),
                    i64::from(lead.booked),
                    i64::from(lead.reminder_sent),
                    opt_ts(lead.booking_start_time),
                    opt_ts(lead.booking_end_time),
                    opt_text(a.utm_source.as_deref()),
                    opt_text(a.utm_medium.as_deref()),
                    opt_text(a.utm_campaign.as_deref()),
                    opt_text(a.utm_content.as_deref()),
                    opt_text(a.utm_term.as_deref()),
                    opt_text(a.fbclid.as_deref()),
                    opt_text(a.referrer.as_deref()),
                    fmt_ts(&lead.created_at),
                    fmt_ts(&lead.updated_at),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("insert_lead: {e}")))?;

        debug!(lead_id = %lead.id, tag = %lead.tag, "Lead inserted into DB");
        Ok(())
    }

    async fn get_lead(&self, id: Uuid) -> Result<Option<Lead>, DatabaseError> {
        let leads = self
            .query_leads(
                "get_lead",
                &format!("SELECT {LEAD_COLUMNS} FROM leads WHERE id = ?1"),
                params![id.to_string()],
            )
            .await?;
        Ok(leads.into_iter().next())
    }

    async fn find_lead_by_email(&self, email: &str) -> Result<Option<Lead>, DatabaseError> {
        let leads = self
            .query_leads(
                "find_lead_by_email",
                &format!(
                    "SELECT {LEAD_COLUMNS} FROM leads WHERE email = ?1 COLLATE NOCASE ORDER BY created_at DESC LIMIT 1"
                ),
                params![email.trim()],
            )
            .await?;
        Ok(leads.into_iter().next())
    }

    async fn list_leads(&self, filter: &LeadFilter) -> Result<Vec<Lead>, DatabaseError> {
        self.query_leads(
            "list_leads",
            &format!(
                "SELECT {LEAD_COLUMNS} FROM leads
                 WHERE (?1 IS NULL OR tag = ?1)
                   AND (?2 IS NULL OR monthly_budget = ?2)
                   AND (?3 IS NULL OR business_type = ?3)
                 ORDER BY created_at DESC"
            ),
            params![
                opt_text(filter.tag.as_ref().map(|t| t.as_str())),
                opt_text(filter.monthly_budget.as_ref().map(|b| b.as_str())),
                opt_text(filter.business_type.as_ref().map(|b| b.as_str())),
            ],
        )
        .await
    }

    async fn lead_stats(&self) -> Result<LeadStats, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT COUNT(*),
                        COALESCE(SUM(CASE WHEN tag = 'Downloaded Guide' THEN 1 ELSE 0 END), 0),
                        COALESCE(SUM(CASE WHEN tag = 'Booked Demo' THEN 1 ELSE 0 END), 0)
                 FROM leads",
                (),
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("lead_stats: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let total: i64 = row.get(0).unwrap_or(0);
                let downloaded: i64 = row.get(1).unwrap_or(0);
                let booked: i64 = row.get(2).unwrap_or(0);
                Ok(LeadStats::new(
                    total.max(0) as u64,
                    downloaded.max(0) as u64,
                    booked.max(0) as u64,
                ))
            }
            Ok(None) => Ok(LeadStats::new(0, 0, 0)),
            Err(e) => Err(DatabaseError::Query(format!("lead_stats: {e}"))),
        }
    }

    async fn mark_lead_booked(
        &self,
        id: Uuid,
        window: Option<BookingWindow>,
        now: DateTime<Utc>,
    ) -> Result<bool, DatabaseError> {
        let count = self
            .conn()
            .execute(
                "UPDATE leads
                 SET tag = 'Booked Demo',
                     booked = 1,
                     booking_start_time = COALESCE(?2, booking_start_time),
                     booking_end_time = COALESCE(?3, booking_end_time),
                     updated_at = ?4
                 WHERE id = ?1",
                params![
                    id.to_string(),
                    opt_ts(window.map(|w| w.start)),
                    opt_ts(window.map(|w| w.end)),
                    fmt_ts(&now),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("mark_lead_booked: {e}")))?;

        debug!(lead_id = %id, updated = count, has_times = window.is_some(), "Lead booking written");
        Ok(count > 0)
    }

    async fn reminder_candidates(&self, cutoff: DateTime<Utc>) -> Result<Vec<Lead>, DatabaseError> {
        self.query_leads(
            "reminder_candidates",
            &format!(
                "SELECT {LEAD_COLUMNS} FROM leads
                 WHERE tag = 'Downloaded Guide'
                   AND booked = 0
                   AND reminder_sent = 0
                   AND created_at < ?1
                 ORDER BY created_at ASC"
            ),
            params![fmt_ts(&cutoff)],
        )
        .await
    }

    async fn mark_reminder_sent(&self, id: Uuid, now: DateTime<Utc>) -> Result<bool, DatabaseError> {
        let count = self
            .conn()
            .execute(
                "UPDATE leads SET reminder_sent = 1, updated_at = ?2 WHERE id = ?1 AND reminder_sent = 0",
                params![id.to_string(), fmt_ts(&now)],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("mark_reminder_sent: {e}")))?;
        Ok(count > 0)
    }

    // ── Admin sessions ──────────────────────────────────────────────

    async fn insert_session(
        &self,
        token: &str,
        subject: &str,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "INSERT INTO admin_sessions (token, subject, created_at, expires_at) VALUES (?1, ?2, ?3, ?4)",
                params![token, subject, fmt_ts(&created_at), fmt_ts(&expires_at)],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("insert_session: {e}")))?;
        Ok(())
    }

    async fn session_subject(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<String>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT subject FROM admin_sessions WHERE token = ?1 AND expires_at > ?2",
                params![token, fmt_ts(&now)],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("session_subject: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(row.get::<String>(0).ok()),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("session_subject: {e}"))),
        }
    }

    async fn delete_session(&self, token: &str) -> Result<(), DatabaseError> {
        self.conn()
            .execute("DELETE FROM admin_sessions WHERE token = ?1", params![token])
            .await
            .map_err(|e| DatabaseError::Query(format!("delete_session: {e}")))?;
        Ok(())
    }

    async fn purge_expired_sessions(&self, now: DateTime<Utc>) -> Result<usize, DatabaseError> {
        let count = self
            .conn()
            .execute(
                "DELETE FROM admin_sessions WHERE expires_at <= ?1",
                params![fmt_ts(&now)],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("purge_expired_sessions: {e}")))?;

        if count > 0 {
            info!(count, "Purged expired admin sessions");
        }
        Ok(count as usize)
    }
}
