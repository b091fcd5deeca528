//! Session Snapshot Route

use axum::{extract::State, Json};
use session::SessionSnapshot;
use std::sync::Arc;

use crate::AppState;

/// Get the latest published session snapshot
pub async fn get_snapshot(State(state): State<Arc<AppState>>) -> Json<SessionSnapshot> {
    Json(state.session.snapshot())
}
