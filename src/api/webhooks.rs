//! Inbound scheduler webhooks.

use axum::{body::Bytes, extract::State, http::StatusCode, response::IntoResponse};
use chrono::Utc;
use tracing::{error, info, warn};

use super::AppState;
use crate::booking::WebhookEnvelope;

/// POST /api/webhooks/calendly
///
/// Deliveries this service cannot use are acknowledged with 200 so the
/// sender stops retrying them. Only store failures answer 500.
pub(super) async fn calendly(State(state): State<AppState>, body: Bytes) -> impl IntoResponse {
    let envelope: WebhookEnvelope = match serde_json::from_slice(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(error = %e, "Ignoring unparseable webhook body");
            return (StatusCode::OK, "Webhook received");
        }
    };

    let event = envelope.event.clone();
    let booking = match envelope.into_invitee_booking(Utc::now()) {
        Ok(booking) => booking,
        Err(reason) => {
            info!(event = %event, %reason, "Webhook ignored");
            return (StatusCode::OK, "Webhook received");
        }
    };

    match state.leads.confirm_booking(&booking).await {
        Ok(_) => (StatusCode::OK, "Webhook received"),
        Err(e) => {
            error!(email = %booking.email, error = %e, "Webhook processing failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Error processing webhook")
        }
    }
}
