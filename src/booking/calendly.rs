//! Calendly scheduled-event lookups.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use url::Url;
use uuid::Uuid;

use crate::config::SchedulerConfig;
use crate::error::SchedulerError;
use crate::leads::model::BookingWindow;

/// Resolves an external event reference to its confirmed time slot.
#[async_trait]
pub trait EventLookup: Send + Sync {
    async fn fetch_booking_window(&self, event_ref: &str) -> Result<BookingWindow, SchedulerError>;
}

/// Calendly API v2 client.
pub struct CalendlyClient {
    api_base: Url,
    token: SecretString,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct EventEnvelope {
    resource: EventResource,
}

#[derive(Debug, Deserialize)]
struct EventResource {
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
}

impl CalendlyClient {
    pub fn new(config: &SchedulerConfig) -> Self {
        Self {
            api_base: config.api_base.clone(),
            token: config.token.clone(),
            client: reqwest::Client::new(),
        }
    }

    /// Turn an event reference into the URL to fetch.
    ///
    /// Accepts a scheduled-event URI under the configured API base or a
    /// bare event UUID. Anything else is refused without a request, so the
    /// bearer token only ever goes to the API base.
    pub fn resolve_reference(&self, event_ref: &str) -> Result<Url, SchedulerError> {
        let event_ref = event_ref.trim();
        let refused = || SchedulerError::UnsupportedReference(event_ref.to_string());

        if let Ok(uuid) = Uuid::parse_str(event_ref) {
            let mut url = self.api_base.clone();
            url.path_segments_mut()
                .map_err(|_| refused())?
                .pop_if_empty()
                .push("scheduled_events")
                .push(&uuid.to_string());
            return Ok(url);
        }

        let url = Url::parse(event_ref).map_err(|_| refused())?;
        // Dot segments and their encoded forms are resolved by the parser;
        // a reference that changes on parsing is refused outright.
        if url.as_str() != event_ref || !self.is_under_base(&url) {
            return Err(refused());
        }
        Ok(url)
    }

    fn is_under_base(&self, url: &Url) -> bool {
        let base = &self.api_base;
        let base_path = base.path().trim_end_matches('/');
        url.scheme() == base.scheme()
            && url.host() == base.host()
            && url.port_or_known_default() == base.port_or_known_default()
            && url.username().is_empty()
            && url.password().is_none()
            && url.query().is_none()
            && url.fragment().is_none()
            && url
                .path()
                .strip_prefix(base_path)
                .and_then(|rest| rest.strip_prefix('/'))
                .is_some_and(|rest| !rest.is_empty())
    }
}

#[async_trait]
impl EventLookup for CalendlyClient {
    async fn fetch_booking_window(&self, event_ref: &str) -> Result<BookingWindow, SchedulerError> {
        let url = self.resolve_reference(event_ref)?;

        let resp = self
            .client
            .get(url.clone())
            .bearer_auth(self.token.expose_secret())
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| SchedulerError::Request(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SchedulerError::Status {
                status: status.as_u16(),
            });
        }

        let envelope: EventEnvelope = resp
            .json()
            .await
            .map_err(|e| SchedulerError::InvalidResponse(e.to_string()))?;

        let EventResource {
            start_time,
            end_time,
        } = envelope.resource;
        tracing::debug!(%url, %start_time, %end_time, "Fetched scheduled event");

        BookingWindow::new(start_time, end_time).ok_or_else(|| {
            SchedulerError::InvalidResponse(format!(
                "event ends ({end_time}) before it starts ({start_time})"
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client_at(base: &str) -> CalendlyClient {
        CalendlyClient::new(&SchedulerConfig {
            api_base: Url::parse(base).unwrap(),
            token: SecretString::from("tok"),
        })
    }

    fn client() -> CalendlyClient {
        client_at("https://api.calendly.com/")
    }

    #[test]
    fn resolves_full_uri_under_base() {
        let uri = "https://api.calendly.com/scheduled_events/ABC123";
        assert_eq!(client().resolve_reference(uri).unwrap().as_str(), uri);
    }

    #[test]
    fn expands_bare_uuid() {
        let id = "0f8fad5b-d9cb-469f-a165-70867728950e";
        assert_eq!(
            client().resolve_reference(id).unwrap().as_str(),
            format!("https://api.calendly.com/scheduled_events/{id}")
        );
        assert_eq!(
            client_at("https://api.calendly.com/v2").resolve_reference(id).unwrap().as_str(),
            format!("https://api.calendly.com/v2/scheduled_events/{id}")
        );
    }

    #[test]
    fn refuses_foreign_or_odd_references() {
        let c = client();
        for bad in [
            "https://evil.example.com/scheduled_events/1",
            "https://api.calendly.com.evil.example.com/x",
            "http://api.calendly.com/scheduled_events/1",
            "https://api.calendly.com:8443/scheduled_events/1",
            "https://user@api.calendly.com/scheduled_events/1",
            "https://api.calendly.com/",
            "https://api.calendly.com/../admin",
            "https://api.calendly.com/x?redirect=1",
            "https://api.calendly.com/x#frag",
            "not-a-reference",
            "",
        ] {
            assert!(
                matches!(
                    c.resolve_reference(bad),
                    Err(SchedulerError::UnsupportedReference(_))
                ),
                "accepted {bad:?}"
            );
        }
    }

    #[test]
    fn references_cannot_leave_a_base_path() {
        let c = client_at("https://api.calendly.com/v2");
        assert!(c.resolve_reference("https://api.calendly.com/v2/scheduled_events/1").is_ok());
        for bad in [
            "https://api.calendly.com/v2/%2e%2e/users/me",
            "https://api.calendly.com/v2/%2E%2E/users/me",
            "https://api.calendly.com/v2/../users/me",
            "https://api.calendly.com/v2other/scheduled_events/1",
            "https://api.calendly.com/users/me",
            "https://api.calendly.com/v2",
        ] {
            assert!(
                matches!(
                    c.resolve_reference(bad),
                    Err(SchedulerError::UnsupportedReference(_))
                ),
                "accepted {bad:?}"
            );
        }
    }

    #[tokio::test]
    async fn refused_reference_makes_no_request() {
        let err = client()
            .fetch_booking_window("http://127.0.0.1:1/scheduled_events/1")
            .await
            .unwrap_err();
        assert!(matches!(err, SchedulerError::UnsupportedReference(_)));
    }

    #[test]
    fn parses_event_resource() {
        let body = r#"{"resource":{"start_time":"2025-03-01T10:00:00.000000Z","end_time":"2025-03-01T10:30:00.000000Z","name":"Demo"}}"#;
        let envelope: EventEnvelope = serde_json::from_str(body).unwrap();
        assert_eq!(
            envelope.resource.end_time - envelope.resource.start_time,
            chrono::Duration::minutes(30)
        );
    }
}
