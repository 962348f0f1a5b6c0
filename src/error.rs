//! Error types for the lead CRM.

use uuid::Uuid;

/// Errors from background work that touches both config and storage.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),
}

/// Lifecycle errors surfaced to callers of the lead service.
///
/// External-service failures never appear here: they are logged and
/// swallowed at the adapter boundary.
#[derive(Debug, thiserror::Error)]
pub enum LeadError {
    #[error("Lead {id} not found")]
    NotFound { id: Uuid },

    #[error("Storage error: {0}")]
    Storage(#[from] DatabaseError),
}

/// Outbound mail errors.
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("Invalid address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Failed to build message: {0}")]
    Build(String),

    #[error("Transport {transport} failed: {reason}")]
    Transport { transport: String, reason: String },

    #[error("Provider rejected message: {0}")]
    Rejected(String),
}

/// External scheduling API errors.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("Event reference not accepted: {0}")]
    UnsupportedReference(String),

    #[error("Scheduling API request failed: {0}")]
    Request(String),

    #[error("Scheduling API returned status {status}")]
    Status { status: u16 },

    #[error("Invalid response from scheduling API: {0}")]
    InvalidResponse(String),
}

/// Admin session errors.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Not authorized: {0}")]
    Unauthorized(String),

    #[error("Storage error: {0}")]
    Storage(#[from] DatabaseError),
}
