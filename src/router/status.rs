//! Liveness and metrics exposition.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};

use crate::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct Status {
    status: String,
    message: String,
}

/// Handle status route.
pub async fn health() -> Json<Status> {
    Json(Status {
        status: "healthy".into(),
        message: "Backend is running".into(),
    })
}

/// Prometheus text exposition, when the recorder is installed.
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    match state.metrics {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (StatusCode::NOT_FOUND, String::new()),
    }
}
