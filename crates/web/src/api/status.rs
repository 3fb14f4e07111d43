//! Liveness endpoint and the shared API error type.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use gref_core::errors::BackendError;
use gref_core::models::Status;

use crate::AppState;

#[derive(Serialize)]
struct PingResponse {
    backend: String,
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/ping", get(ping))
}

async fn ping(State(state): State<Arc<AppState>>) -> Result<Json<PingResponse>, AppError> {
    let backend = state.backend.ping().await?;
    Ok(Json(PingResponse { backend }))
}

/// Translate a contract status into its HTTP code.
pub fn http_status(status: Status) -> StatusCode {
    StatusCode::from_u16(status.code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

// ---------------------------------------------------------------------------
// Shared error type for API handlers
// ---------------------------------------------------------------------------

/// API error type that converts to an Axum response.
#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    /// A backend failure, rendered with the backend's own status.
    Backend(BackendError),
}

impl From<BackendError> for AppError {
    fn from(err: BackendError) -> Self {
        AppError::Backend(err)
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Backend(err) => (http_status(err.status()), err.to_string()),
        };

        let body = serde_json::json!({ "error": message });
        (status, Json(body)).into_response()
    }
}
