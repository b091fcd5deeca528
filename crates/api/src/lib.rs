//! Takeover Dashboard API Server
//!
//! Read-only session snapshots for the presentation layer, plus the two
//! inputs it may send: metrics samples and explicit mode requests.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use alerting::TracingSink;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde::{Deserialize, Serialize};
use session::{load_config, Session, SessionClock, SessionConfig, SessionError, SessionHandle, SessionRunner};
use takeover::AutonomyMode;
use thiserror::Error;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

mod routes;

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ServerSection {
    server: ServerConfig,
}

/// Full application configuration. Session options sit at the top level
/// (`decision_tick_ms`, `fusion.*`, ...), server options under `[server]`.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub session: SessionConfig,
    pub server: ServerConfig,
}

impl AppConfig {
    pub fn load(path: Option<&Path>) -> Result<Self, SessionError> {
        let session: SessionConfig = load_config(path)?;
        let ServerSection { server } = load_config(path)?;

        session.validate()?;
        server
            .bind_addr
            .parse::<SocketAddr>()
            .map_err(|e| SessionError::Config(format!("server.bind_addr: {}", e)))?;
        Ok(Self { session, server })
    }
}

/// Application state shared across handlers
pub struct AppState {
    /// Running takeover session
    pub session: SessionHandle,
    /// Prometheus renderer, when a recorder is installed
    pub prometheus: Option<PrometheusHandle>,
    /// Version string
    pub version: String,
    /// Start time
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(session: SessionHandle, prometheus: Option<PrometheusHandle>) -> Self {
        Self {
            session,
            prometheus,
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: std::time::Instant::now(),
        }
    }
}

/// API errors
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Not found")]
    NotFound,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::NotFound => StatusCode::NOT_FOUND,
        };
        (status, Json(ErrorBody { error: self.to_string() })).into_response()
    }
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: u64,
    pub version: String,
    pub uptime_seconds: u64,
    pub mode: AutonomyMode,
    pub driver_state: dms::DriverState,
}

/// Create the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/health", get(health_handler))
        .route("/api/v1/session", get(routes::session::get_snapshot))
        .route("/api/v1/logs", get(routes::logs::get_logs))
        .route("/api/v1/metrics", post(routes::control::submit_sample))
        .route("/api/v1/mode", post(routes::control::request_mode))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check handler
async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let snapshot = state.session.snapshot();

    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp,
        version: state.version.clone(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        mode: snapshot.mode,
        driver_state: snapshot.driver_state,
    })
}

/// Prometheus scrape handler
async fn metrics_handler(State(state): State<Arc<AppState>>) -> Result<String, ApiError> {
    state
        .prometheus
        .as_ref()
        .map(|handle| handle.render())
        .ok_or(ApiError::NotFound)
}

/// Initialize logging
pub fn init_logging() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(true)
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        warn!("Tracing subscriber already installed");
    }
}

/// Run the session loops and serve the API until Ctrl-C
pub async fn run_server(config: AppConfig) -> anyhow::Result<()> {
    let prometheus = match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!("Prometheus recorder unavailable: {}", e);
            None
        }
    };

    let session_config = config.session;
    info!(
        "Decision tick {}ms, speed tick {}ms, distraction warning {:?}",
        session_config.decision_tick_ms,
        session_config.speed_tick_ms,
        session_config.arbitration.distraction_warning
    );

    let clock = SessionClock::start();
    let source = session_config.simulation.source();

    let session = Session::new(session_config, Box::new(TracingSink), clock.now_ms());
    let running = SessionRunner::spawn(session, Some(Box::new(source)), clock);

    let state = Arc::new(AppState::new(running.handle(), prometheus));
    let app = create_router(state);

    info!("Starting API server on {}", config.server.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await?;

    running.stop().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use alerting::RecordingSink;
    use axum::body::Body;
    use axum::http::Request;
    use session::RunningSession;
    use tower::ServiceExt;

    pub(crate) fn test_app() -> (Router, RunningSession) {
        let clock = SessionClock::start();
        let session = Session::new(
            SessionConfig::default(),
            Box::new(RecordingSink::new()),
            clock.now_ms(),
        );
        let running = SessionRunner::spawn(session, None, clock);
        let state = Arc::new(AppState::new(running.handle(), None));
        (create_router(state), running)
    }

    pub(crate) async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (app, running) = test_app();
        let response = app
            .oneshot(Request::builder().uri("/api/v1/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["mode"], "MANUAL");
        assert_eq!(json["driver_state"], "ALERT");

        running.stop().await;
    }

    #[tokio::test]
    async fn test_metrics_without_recorder_is_not_found() {
        let (app, running) = test_app();
        let response = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        running.stop().await;
    }

    #[test]
    fn test_app_config_reads_top_level_session_keys() {
        use std::io::Write;

        let path = std::env::temp_dir().join(format!(
            "intellidrive-app-{}.toml",
            std::process::id()
        ));
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "decision_tick_ms = 200").unwrap();
        writeln!(file, "[fusion]\nface_loss_secs = 4.0").unwrap();
        writeln!(file, "[server]\nbind_addr = \"127.0.0.1:9090\"").unwrap();
        drop(file);

        std::env::set_var("INTELLIDRIVE__SPEED_TICK_MS", "40");
        let loaded = AppConfig::load(Some(&path));
        std::env::remove_var("INTELLIDRIVE__SPEED_TICK_MS");
        std::fs::remove_file(&path).ok();

        let config = loaded.unwrap();
        assert_eq!(config.session.decision_tick_ms, 200);
        assert_eq!(config.session.speed_tick_ms, 40);
        assert_eq!(config.session.fusion.face_loss_secs, 4.0);
        assert_eq!(config.session.sample_period_ms, 500);
        assert_eq!(config.server.bind_addr, "127.0.0.1:9090");
    }

    #[test]
    fn test_app_config_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.bind_addr, "0.0.0.0:8080");
        assert_eq!(config.session.decision_tick_ms, 300);
    }
}
