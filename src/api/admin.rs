//! Admin login/logout and the session guard for protected routes.

use axum::{
    Extension, Json,
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::debug;

use super::{ApiError, AppState};
use crate::error::AuthError;

/// Cookie carrying the admin session token.
pub const SESSION_COOKIE: &str = "session";

/// Authenticated admin, stored in request extensions by [`require_admin`].
#[derive(Debug, Clone)]
pub struct AdminSubject(pub String);

/// Session tokens presented on a request, `Authorization: Bearer` first,
/// then the `session` cookie.
fn session_tokens(headers: &HeaderMap) -> Vec<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string());

    let cookie = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim().to_string());

    let mut tokens: Vec<String> = bearer
        .into_iter()
        .chain(cookie)
        .filter(|t| !t.is_empty())
        .collect();
    tokens.dedup();
    tokens
}

fn session_cookie(token: &str, max_age_secs: i64) -> String {
    format!("{SESSION_COOKIE}={token}; HttpOnly; Path=/; SameSite=Lax; Max-Age={max_age_secs}")
}

/// Reject requests without a live admin session.
pub(super) async fn require_admin(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let tokens = session_tokens(request.headers());
    if tokens.is_empty() {
        debug!(path = %request.uri().path(), "Missing admin session");
        return Err(ApiError::Unauthorized("Not authorized, no token".to_string()));
    }

    // Any one live token is enough; a stale cookie must not shadow a bearer.
    let mut rejection = None;
    for token in &tokens {
        match state.auth.verify(token).await {
            Ok(subject) => {
                request.extensions_mut().insert(AdminSubject(subject));
                return Ok(next.run(request).await);
            }
            Err(AuthError::Unauthorized(reason)) => rejection = Some(reason),
            Err(e) => return Err(e.into()),
        }
    }
    Err(AuthError::Unauthorized(rejection.unwrap_or_default()).into())
}

#[derive(Deserialize)]
pub(super) struct LoginRequest {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

/// POST /api/admin/login
pub(super) async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Response, ApiError> {
    let session = state.auth.login(&req.email, &req.password).await?;

    let mut resp = Json(serde_json::json!({
        "success": true,
        "message": "Logged in successfully",
        "token": session.token,
        "email": session.subject,
    }))
    .into_response();
    let cookie = HeaderValue::from_str(&session_cookie(&session.token, session.max_age_secs))
        .map_err(|_| ApiError::Internal)?;
    resp.headers_mut().insert(header::SET_COOKIE, cookie);
    Ok(resp)
}

/// POST /api/admin/logout
pub(super) async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    for token in session_tokens(&headers) {
        state.auth.logout(&token).await?;
    }

    let mut resp = Json(serde_json::json!({
        "success": true,
        "message": "Logged out successfully",
    }))
    .into_response();
    let cleared = HeaderValue::from_str(&session_cookie("", 0)).map_err(|_| ApiError::Internal)?;
    resp.headers_mut().insert(header::SET_COOKIE, cleared);
    Ok(resp)
}

/// GET /api/admin/check
pub(super) async fn check(Extension(AdminSubject(subject)): Extension<AdminSubject>) -> impl IntoResponse {
    Json(serde_json::json!({
        "success": true,
        "message": "Authenticated",
        "email": subject,
    }))
}
