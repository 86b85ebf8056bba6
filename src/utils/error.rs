//! Error types and handling
//!
//! `AppError` is the HTTP-facing error, converted to a consistent JSON response
//! format. `MigrationError` is returned by the migration tracker and names the
//! step that failed.

use std::path::PathBuf;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Application error types
#[derive(Debug, Error)]
pub enum AppError {
    /// Resource not found (404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Database error (500)
    #[error("Database error: {0}")]
    Database(String),
}

/// Error response body
#[derive(Serialize, Debug)]
pub struct ErrorResponse {
    /// Error type identifier
    pub error: String,
    /// Human-readable error message
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, should_log) = match &self {
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found", false),
            AppError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "database_error", true),
        };

        if should_log {
            error!(error = %self, error_type = error_type, "Request error");
        }

        let body = ErrorResponse::new(error_type, self.to_string());

        (status, Json(body)).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::NotFound("Record not found".to_string()),
            _ => AppError::Database(err.to_string()),
        }
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;

/// Migration tracker errors
///
/// Every variant is terminal for the current invocation. Variants raised inside
/// a transaction imply that the transaction was rolled back.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Failed to create migrations table: {0}")]
    TrackingTable(#[source] sqlx::Error),

    #[error("Failed to check migration status: {0}")]
    Query(#[source] sqlx::Error),

    #[error("Failed to start transaction for {version}: {source}")]
    Begin {
        version: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Failed to execute migration {version}: {source}")]
    Execute {
        version: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Failed to update migration record for {version}: {source}")]
    Record {
        version: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Failed to commit migration {version}: {source}")]
    Commit {
        version: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Failed to read migration file {path:?}: {source}")]
    Source {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid migration source: {0}")]
    InvalidSource(String),
}

impl MigrationError {
    /// Version of the migration unit the error belongs to, if any
    pub fn version(&self) -> Option<&str> {
        match self {
            MigrationError::Begin { version, .. }
            | MigrationError::Execute { version, .. }
            | MigrationError::Record { version, .. }
            | MigrationError::Commit { version, .. } => Some(version),
            _ => None,
        }
    }
}
