//! Admin sessions: credential check and opaque session tokens.

use std::sync::Arc;

use chrono::Utc;
use rand::{Rng, distributions::Alphanumeric};
use secrecy::ExposeSecret;
use subtle::ConstantTimeEq;
use tracing::{info, warn};

use crate::config::AdminConfig;
use crate::error::AuthError;
use crate::store::Database;

const TOKEN_LEN: usize = 48;

/// An issued admin session.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub subject: String,
    pub max_age_secs: i64,
}

pub struct AdminAuth {
    store: Arc<dyn Database>,
    config: AdminConfig,
}

impl AdminAuth {
    pub fn new(store: Arc<dyn Database>, config: AdminConfig) -> Self {
        Self { store, config }
    }

    /// Check credentials and issue a session token.
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let email_ok = email.trim().eq_ignore_ascii_case(&self.config.email);
        let password_ok: bool = password
            .as_bytes()
            .ct_eq(self.config.password.expose_secret().as_bytes())
            .into();
        if !(email_ok && password_ok) {
            warn!(email = %email.trim(), "Admin login rejected");
            return Err(AuthError::InvalidCredentials);
        }

        let now = Utc::now();
        self.store.purge_expired_sessions(now).await?;

        let token = generate_token();
        let expires_at = now + self.config.session_ttl;
        self.store
            .insert_session(&token, &self.config.email, now, expires_at)
            .await?;
        info!(subject = %self.config.email, %expires_at, "Admin session issued");

        Ok(Session {
            token,
            subject: self.config.email.clone(),
            max_age_secs: self.config.session_ttl.num_seconds(),
        })
    }

    /// Subject of a live session.
    pub async fn verify(&self, token: &str) -> Result<String, AuthError> {
        if token.is_empty() {
            return Err(AuthError::Unauthorized("missing session token".into()));
        }
        self.store
            .session_subject(token, Utc::now())
            .await?
            .ok_or_else(|| AuthError::Unauthorized("invalid or expired session".into()))
    }

    /// Revoke a session. Unknown tokens are fine.
    pub async fn logout(&self, token: &str) -> Result<(), AuthError> {
        self.store.delete_session(token).await?;
        info!("Admin session revoked");
        Ok(())
    }
}

fn generate_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LEN)
        .map(char::from)
        .collect()
}
