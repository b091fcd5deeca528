//! Decision Log Route

use axum::{
    extract::{Query, State},
    Json,
};
use log_stream::{LogEntry, LogSeverity};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{ApiError, AppState};

/// Query parameters for logs endpoint
#[derive(Debug, Deserialize)]
pub struct LogQuery {
    /// Filter by severity
    pub severity: Option<String>,
    /// Maximum number of records
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    20
}

/// Response for logs endpoint
#[derive(Debug, Serialize)]
pub struct LogResponse {
    pub data: Vec<LogEntry>,
    pub count: usize,
}

/// Get decision log entries, newest first
pub async fn get_logs(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LogQuery>,
) -> Result<Json<LogResponse>, ApiError> {
    let severity = params
        .severity
        .as_deref()
        .map(str::parse::<LogSeverity>)
        .transpose()
        .map_err(ApiError::BadRequest)?;

    let data = state.session.logs(params.limit, severity);
    Ok(Json(LogResponse {
        count: data.len(),
        data,
    }))
}
