//! Control Routes
//!
//! The only two inputs the presentation layer may send.

use axum::{extract::State, http::StatusCode, Json};
use dms::DriverMetricsSample;
use serde::Deserialize;
use session::{SessionError, SessionSnapshot};
use std::sync::Arc;
use takeover::AutonomyMode;
use tracing::info;

use crate::{ApiError, AppState};

/// Body for mode requests
#[derive(Debug, Deserialize)]
pub struct ModeRequest {
    pub mode: AutonomyMode,
}

/// Submit a metrics sample; out-of-range values are clamped
pub async fn submit_sample(
    State(state): State<Arc<AppState>>,
    Json(sample): Json<DriverMetricsSample>,
) -> StatusCode {
    state.session.submit_metrics_sample(sample).await;
    StatusCode::ACCEPTED
}

/// Request an explicit mode change
pub async fn request_mode(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ModeRequest>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    info!("Mode request: {}", request.mode);
    state
        .session
        .request_mode(request.mode)
        .await
        .map(Json)
        .map_err(|e| match e {
            SessionError::Arbitration(e) => ApiError::Conflict(e.to_string()),
            other => ApiError::BadRequest(other.to_string()),
        })
}
