//! Shared request/response DTOs for the demo routes.

use serde::Serialize;
use std::collections::BTreeMap;

/// GET /session response.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    /// `None` until the session has been stored.
    pub session_id: Option<String>,
    pub data: BTreeMap<String, serde_json::Value>,
}

/// GET /health response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub application: String,
    pub table: String,
}

/// Generic success response.
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}
