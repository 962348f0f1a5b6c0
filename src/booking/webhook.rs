//! Calendly webhook payloads, normalized into an [`InviteeBooking`].
//!
//! Payloads arrive in more than one shape depending on the subscription
//! version. Timing is read from, in order:
//!
//! 1. `payload.tracking.{start_time,end_time}`
//! 2. `payload.scheduled_event.{start_time,end_time}`
//! 3. `payload.{start_time,end_time}`
//!
//! and defaults to now / now + 30 minutes when none carries a start.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::leads::model::BookingWindow;

pub const INVITEE_CREATED: &str = "invitee.created";

/// Outer webhook body.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEnvelope {
    pub event: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct TimingFields {
    #[serde(default)]
    start_time: Option<String>,
    #[serde(default)]
    end_time: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct InviteePayload {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    tracking: Option<TimingFields>,
    #[serde(default)]
    scheduled_event: Option<TimingFields>,
    #[serde(flatten)]
    flat: TimingFields,
}

/// Where the booking times were found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimingShape {
    Tracking,
    ScheduledEvent,
    Flat,
    /// Nothing usable; the placeholder window was applied.
    Defaulted,
}

/// A normalized invitee confirmation.
#[derive(Debug, Clone, PartialEq)]
pub struct InviteeBooking {
    pub email: String,
    pub name: Option<String>,
    pub window: BookingWindow,
    pub shape: TimingShape,
}

/// Why a webhook delivery was acknowledged without changing anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ignored {
    UnsupportedEvent(String),
    MalformedPayload(String),
    MissingEmail,
}

impl fmt::Display for Ignored {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ignored::UnsupportedEvent(event) => write!(f, "unsupported event {event}"),
            Ignored::MalformedPayload(reason) => write!(f, "malformed payload: {reason}"),
            Ignored::MissingEmail => f.write_str("payload has no invitee email"),
        }
    }
}

impl WebhookEnvelope {
    /// Normalize an `invitee.created` delivery.
    pub fn into_invitee_booking(self, now: DateTime<Utc>) -> Result<InviteeBooking, Ignored> {
        if self.event != INVITEE_CREATED {
            return Err(Ignored::UnsupportedEvent(self.event));
        }

        let payload: InviteePayload = serde_json::from_value(self.payload)
            .map_err(|e| Ignored::MalformedPayload(e.to_string()))?;

        let email = payload
            .email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .ok_or(Ignored::MissingEmail)?
            .to_string();

        let (window, shape) = payload.resolve_window(now);
        Ok(InviteeBooking {
            email,
            name: payload.name,
            window,
            shape,
        })
    }
}

impl InviteePayload {
    fn resolve_window(&self, now: DateTime<Utc>) -> (BookingWindow, TimingShape) {
        let candidates = [
            (self.tracking.as_ref(), TimingShape::Tracking),
            (self.scheduled_event.as_ref(), TimingShape::ScheduledEvent),
            (Some(&self.flat), TimingShape::Flat),
        ];

        for (fields, shape) in candidates {
            let Some(fields) = fields else { continue };
            let Some(start) = parse_time(fields.start_time.as_deref()) else {
                continue;
            };
            let end = parse_time(fields.end_time.as_deref())
                .or_else(|| parse_time(self.flat.end_time.as_deref()));
            let window = end
                .and_then(|end| BookingWindow::new(start, end))
                .unwrap_or_else(|| BookingWindow::default_from(start));
            return (window, shape);
        }

        (BookingWindow::default_from(now), TimingShape::Defaulted)
    }
}

fn parse_time(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    match DateTime::parse_from_rfc3339(raw) {
        Ok(t) => Some(t.with_timezone(&Utc)),
        Err(e) => {
            tracing::warn!(value = raw, error = %e, "Ignoring unparseable webhook timestamp");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    fn envelope(payload: serde_json::Value) -> WebhookEnvelope {
        WebhookEnvelope {
            event: INVITEE_CREATED.into(),
            payload,
        }
    }

    fn t(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, h, m, 0).unwrap()
    }

    #[test]
    fn flat_timing() {
        let booking = envelope(json!({
            "email": "a@x.com",
            "name": "A",
            "start_time": "2025-03-01T10:00:00Z",
            "end_time": "2025-03-01T10:45:00Z"
        }))
        .into_invitee_booking(t(0, 0))
        .unwrap();
        assert_eq!(booking.email, "a@x.com");
        assert_eq!(booking.name.as_deref(), Some("A"));
        assert_eq!(booking.window.start, t(10, 0));
        assert_eq!(booking.window.end, t(10, 45));
        assert_eq!(booking.shape, TimingShape::Flat);
    }

    #[test]
    fn tracking_wins_over_flat() {
        let booking = envelope(json!({
            "email": "a@x.com",
            "tracking": {"start_time": "2025-03-01T09:00:00Z"},
            "start_time": "2025-03-01T10:00:00Z",
            "end_time": "2025-03-01T09:30:00Z"
        }))
        .into_invitee_booking(t(0, 0))
        .unwrap();
        assert_eq!(booking.shape, TimingShape::Tracking);
        assert_eq!(booking.window.start, t(9, 0));
        assert_eq!(booking.window.end, t(9, 30));
    }

    #[test]
    fn scheduled_event_shape() {
        let booking = envelope(json!({
            "email": "a@x.com",
            "scheduled_event": {
                "start_time": "2025-03-01T12:00:00.000000Z",
                "end_time": "2025-03-01T12:30:00.000000Z"
            }
        }))
        .into_invitee_booking(t(0, 0))
        .unwrap();
        assert_eq!(booking.shape, TimingShape::ScheduledEvent);
        assert_eq!(booking.window.start, t(12, 0));
        assert_eq!(booking.window.end, t(12, 30));
    }

    #[test]
    fn missing_timing_defaults_to_now() {
        let now = t(8, 0);
        let booking = envelope(json!({"email": "a@x.com"}))
            .into_invitee_booking(now)
            .unwrap();
        assert_eq!(booking.shape, TimingShape::Defaulted);
        assert_eq!(booking.window.start, now);
        assert_eq!(booking.window.end, now + chrono::Duration::minutes(30));
    }

    #[test]
    fn garbage_timestamp_is_treated_as_absent() {
        let now = t(8, 0);
        let booking = envelope(json!({"email": "a@x.com", "start_time": "tomorrow-ish"}))
            .into_invitee_booking(now)
            .unwrap();
        assert_eq!(booking.shape, TimingShape::Defaulted);
        assert_eq!(booking.window.start, now);
    }

    #[test]
    fn start_without_end_gets_default_slot() {
        let booking = envelope(json!({"email": "a@x.com", "start_time": "2025-03-01T10:00:00+02:00"}))
            .into_invitee_booking(t(0, 0))
            .unwrap();
        assert_eq!(booking.window.start, t(8, 0));
        assert_eq!(booking.window.end, t(8, 30));
    }

    #[test]
    fn other_events_are_ignored() {
        let env = WebhookEnvelope {
            event: "invitee.canceled".into(),
            payload: json!({"email": "a@x.com"}),
        };
        assert_eq!(
            env.into_invitee_booking(t(0, 0)),
            Err(Ignored::UnsupportedEvent("invitee.canceled".into()))
        );
    }

    #[test]
    fn missing_email_is_ignored() {
        assert_eq!(
            envelope(json!({"name": "A"})).into_invitee_booking(t(0, 0)),
            Err(Ignored::MissingEmail)
        );
        assert!(matches!(
            envelope(json!("not an object")).into_invitee_booking(t(0, 0)),
            Err(Ignored::MalformedPayload(_))
        ));
    }

    #[test]
    fn envelope_deserializes() {
        let env: WebhookEnvelope = serde_json::from_str(
            r#"{"event":"invitee.created","payload":{"email":" a@x.com "}}"#,
        )
        .unwrap();
        assert_eq!(env.into_invitee_booking(t(0, 0)).unwrap().email, "a@x.com");
    }
}
