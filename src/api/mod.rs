//! HTTP surface: lead, admin and webhook routes.

mod admin;
mod leads;
mod webhooks;

use std::sync::Arc;

use axum::{
    Json, Router,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::auth::AdminAuth;
use crate::error::{AuthError, LeadError};
use crate::leads::LeadService;

pub use admin::SESSION_COOKIE;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub leads: Arc<LeadService>,
    pub auth: Arc<AdminAuth>,
}

/// Build the full router.
pub fn build_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/api/leads", get(leads::list_leads))
        .route("/api/leads/stats", get(leads::stats))
        .route("/api/admin/check", get(admin::check))
        .route_layer(middleware::from_fn_with_state(state.clone(), admin::require_admin));

    let public = Router::new()
        .route("/health", get(health))
        .route("/api/leads", post(leads::create_lead))
        .route("/api/leads/wakeup/cron", get(leads::wakeup))
        .route("/api/leads/{id}", get(leads::get_lead))
        .route("/api/leads/{id}/book", put(leads::mark_booked))
        .route("/api/admin/login", post(admin::login))
        .route("/api/admin/logout", post(admin::logout))
        .route("/api/webhooks/calendly", post(webhooks::calendly));

    public
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "lead-crm"
    }))
}

/// Handler error, rendered as `{ "success": false, "message": ... }`.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    NotFound(String),
    Internal,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, m),
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m),
            ApiError::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "Server Error".to_string()),
        };
        (
            status,
            Json(serde_json::json!({"success": false, "message": message})),
        )
            .into_response()
    }
}

impl From<LeadError> for ApiError {
    fn from(e: LeadError) -> Self {
        match e {
            LeadError::NotFound { .. } => ApiError::NotFound("Lead not found".to_string()),
            LeadError::Storage(e) => {
                error!(error = %e, "Lead storage failure");
                ApiError::Internal
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::InvalidCredentials => {
                ApiError::Unauthorized("Invalid email or password".to_string())
            }
            AuthError::Unauthorized(reason) => {
                ApiError::Unauthorized(format!("Not authorized, {reason}"))
            }
            AuthError::Storage(e) => {
                error!(error = %e, "Session storage failure");
                ApiError::Internal
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use axum::body::Body;
    use axum::http::{Request, header};
    use chrono::Duration;
    use secrecy::SecretString;
    use tower::ServiceExt;

    use super::*;
    use crate::config::AdminConfig;
    use crate::leads::service::tests::RecordingMailer;
    use crate::leads::templates::TemplateLinks;
    use crate::store::{Database, LibSqlBackend};

    pub(crate) async fn test_app() -> (Router, Arc<RecordingMailer>) {
        let store: Arc<dyn Database> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let mailer = Arc::new(RecordingMailer::default());
        let leads = LeadService::new(store.clone(), mailer.clone(), TemplateLinks::default());
        let auth = AdminAuth::new(
            store,
            AdminConfig {
                email: "admin@crm.com".into(),
                password: SecretString::from("admin123"),
                session_ttl: Duration::hours(1),
            },
        );
        let app = build_router(AppState {
            leads: Arc::new(leads),
            auth: Arc::new(auth),
        });
        (app, mailer)
    }

    pub(crate) async fn body_json(resp: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    pub(crate) fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    pub(crate) async fn login_token(app: &Router) -> String {
        let resp = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/admin/login",
                serde_json::json!({"email": "admin@crm.com", "password": "admin123"}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        body_json(resp).await["token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn health_is_public() {
        let (app, _) = test_app().await;
        let resp = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["status"], "ok");
    }

    #[test]
    fn error_mapping() {
        let resp = ApiError::from(LeadError::NotFound {
            id: uuid::Uuid::new_v4(),
        })
        .into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = ApiError::from(AuthError::InvalidCredentials).into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let resp = ApiError::from(LeadError::Storage(crate::error::DatabaseError::Query(
            "boom".into(),
        )))
        .into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
