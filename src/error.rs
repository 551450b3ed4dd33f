//! Session store error types with Axum response mapping.
//!
//! Every failure carries an [`ErrorKind`] so the pipeline layer can decide
//! between failing the request and degrading to an anonymous session.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Coarse classification of a [`SessionError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    InvalidFormat,
    CorruptRecord,
    IncompatibleSchema,
    StorageUnavailable,
    Conflict,
    Serialization,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("hash key has invalid format: {0}")]
    InvalidFormat(String),

    #[error("corrupt session record: {0}")]
    CorruptRecord(String),

    #[error("table {table} can't be used to store session data: {reason}")]
    IncompatibleSchema { table: String, reason: String },

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("session {0} already exists")]
    SessionExists(String),

    #[error("failed to serialize session: {0}")]
    Serialization(String),
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            SessionError::InvalidFormat(_) => ErrorKind::InvalidFormat,
            SessionError::CorruptRecord(_) => ErrorKind::CorruptRecord,
            SessionError::IncompatibleSchema { .. } => ErrorKind::IncompatibleSchema,
            SessionError::StorageUnavailable(_) => ErrorKind::StorageUnavailable,
            SessionError::SessionExists(_) => ErrorKind::Conflict,
            SessionError::Serialization(_) => ErrorKind::Serialization,
        }
    }

    fn status(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::StorageUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for SessionError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self.kind() {
            ErrorKind::StorageUnavailable => json!({"error": "Session storage unavailable"}),
            _ => json!({"error": "Session error"}),
        };
        (status, axum::Json(body)).into_response()
    }
}
