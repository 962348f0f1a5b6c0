//! Lead endpoints.

use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

use super::{ApiError, AppState};
use crate::leads::model::{LeadFilter, NewLead};

fn parse_lead_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest("Invalid lead ID".to_string()))
}

fn validate(input: &NewLead) -> Result<(), ApiError> {
    let missing: Vec<&str> = [
        ("name", input.name.trim()),
        ("email", input.email.trim()),
        ("phone", input.phone.trim()),
    ]
    .into_iter()
    .filter(|(_, value)| value.is_empty())
    .map(|(field, _)| field)
    .collect();

    if !missing.is_empty() {
        return Err(ApiError::BadRequest(format!(
            "Missing required fields: {}",
            missing.join(", ")
        )));
    }
    if !input.email.contains('@') {
        return Err(ApiError::BadRequest("Invalid email address".to_string()));
    }
    Ok(())
}

/// POST /api/leads
pub(super) async fn create_lead(
    State(state): State<AppState>,
    payload: Result<Json<NewLead>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(mut input) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    input.name = input.name.trim().to_string();
    input.email = input.email.trim().to_string();
    input.phone = input.phone.trim().to_string();
    validate(&input)?;

    let lead = state.leads.create_lead(input).await?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({"success": true, "data": lead})),
    ))
}

/// GET /api/leads (admin)
pub(super) async fn list_leads(
    State(state): State<AppState>,
    filter: Result<Query<LeadFilter>, axum::extract::rejection::QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(filter) = filter.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let leads = state.leads.list_leads(&filter).await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "count": leads.len(),
        "data": leads,
    })))
}

/// GET /api/leads/stats (admin)
pub(super) async fn stats(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let stats = state.leads.stats().await?;
    Ok(Json(serde_json::json!({"success": true, "data": stats})))
}

/// GET /api/leads/wakeup/cron
pub(super) async fn wakeup() -> impl IntoResponse {
    Json(serde_json::json!({"message": "Server is awake!"}))
}

/// GET /api/leads/{id}
pub(super) async fn get_lead(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let lead = state.leads.get_lead(parse_lead_id(&id)?).await?;
    Ok(Json(serde_json::json!({"success": true, "data": lead})))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BookRequest {
    #[serde(default)]
    event_uri: Option<String>,
}

/// PUT /api/leads/{id}/book
///
/// The body is optional; `{ "eventUri": ... }` lets the scheduler slot be looked up.
pub(super) async fn mark_booked(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_lead_id(&id)?;
    let req: BookRequest = if body.iter().all(u8::is_ascii_whitespace) {
        BookRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::BadRequest(format!("Invalid request body: {e}")))?
    };

    let lead = state.leads.mark_booked(id, req.event_uri.as_deref()).await?;
    Ok(Json(serde_json::json!({"success": true, "data": lead})))
}
