//! /session and /abandon: read, mutate, and drop the current session bag.

use axum::Json;
use axum::extract::Path;
use axum::http::StatusCode;

use crate::session::middleware::SessionHandle;
use crate::types::{SessionResponse, SuccessResponse};

/// GET /session
pub async fn get_session(session: SessionHandle) -> Json<SessionResponse> {
    let data = session.data.lock().await;
    Json(SessionResponse {
        session_id: session.id.clone(),
        data: data.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
    })
}

/// PUT /session/{key} with any JSON value as body.
pub async fn put_value(
    session: SessionHandle,
    Path(key): Path<String>,
    Json(value): Json<serde_json::Value>,
) -> Json<SuccessResponse> {
    session.data.lock().await.set(&key, value);
    Json(SuccessResponse { success: true })
}

/// DELETE /session/{key}
pub async fn delete_value(
    session: SessionHandle,
    Path(key): Path<String>,
) -> Result<Json<SuccessResponse>, StatusCode> {
    match session.data.lock().await.remove(&key) {
        Some(_) => Ok(Json(SuccessResponse { success: true })),
        None => Err(StatusCode::NOT_FOUND),
    }
}

/// POST /abandon
pub async fn abandon(session: SessionHandle) -> Json<SuccessResponse> {
    session.abandon().await;
    Json(SuccessResponse { success: true })
}
