//! Liveness and readiness checks.

use axum::{extract::State, http::StatusCode};

use crate::state::AppState;

/// `GET /health`
pub async fn health() -> &'static str {
    "ok"
}

/// `GET /health/ready`: 503 while the database does not answer.
pub async fn ready(State(state): State<AppState>) -> StatusCode {
    if state.is_ready().await {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
