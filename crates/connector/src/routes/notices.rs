use axum::{Json, extract::State};

use crate::notices::Notice;
use crate::state::AppState;

/// `GET /notices`: return and clear the pending notices.
pub async fn drain(State(state): State<AppState>) -> Json<Vec<Notice>> {
    Json(state.notices().drain())
}
