//! Session configuration
//!
//! Defaults, then an optional file (format by extension), then environment
//! variables prefixed `INTELLIDRIVE__` with `__` between nested keys.

use std::path::Path;

use config::{Config, Environment, File};
use dms::{DriverMetricsSample, FallbackSource, FusionConfig, ScriptedSource};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use takeover::{ArbitrationConfig, GovernorConfig};
use tracing::info;

use crate::SessionError;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "INTELLIDRIVE";

/// One replayed stretch of identical samples
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptSegment {
    pub duration_ms: i64,
    pub sample: DriverMetricsSample,
}

/// Metrics source settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Fixed RNG seed for reproducible runs
    pub seed: Option<u64>,
    /// Samples to replay before anything else; empty means no scripted source
    pub script: Vec<ScriptSegment>,
}

impl SimulationConfig {
    /// Scripted replay when configured, falling back to simulation once it
    /// reports the sensor unavailable
    pub fn source(&self) -> FallbackSource<ScriptedSource> {
        let segments = self
            .script
            .iter()
            .map(|segment| (segment.duration_ms, segment.sample))
            .collect();
        FallbackSource::new(ScriptedSource::new(segments), self.seed)
    }
}

/// Session configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Decision loop period (ms)
    pub decision_tick_ms: u64,
    /// Speed governor period (ms)
    pub speed_tick_ms: u64,
    /// Metrics source sampling period (ms)
    pub sample_period_ms: u64,
    /// Speed and target at session start (km/h)
    pub initial_speed_kmh: f64,
    /// Decision log capacity
    pub log_capacity: usize,

    pub fusion: FusionConfig,
    pub arbitration: ArbitrationConfig,
    pub governor: GovernorConfig,
    pub simulation: SimulationConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            decision_tick_ms: 300,
            speed_tick_ms: 50,
            sample_period_ms: 500,
            initial_speed_kmh: 80.0,
            log_capacity: log_stream::DEFAULT_CAPACITY,
            fusion: FusionConfig::default(),
            arbitration: ArbitrationConfig::default(),
            governor: GovernorConfig::default(),
            simulation: SimulationConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Load from an optional file plus environment overrides, then validate
    pub fn load(path: Option<&Path>) -> Result<Self, SessionError> {
        let config: Self = load_config(path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SessionError> {
        let periods = [
            ("decision_tick_ms", self.decision_tick_ms),
            ("speed_tick_ms", self.speed_tick_ms),
            ("sample_period_ms", self.sample_period_ms),
        ];
        for (name, value) in periods {
            if value == 0 {
                return Err(SessionError::Config(format!("{} must be > 0", name)));
            }
        }
        if self.log_capacity == 0 {
            return Err(SessionError::Config("log_capacity must be > 0".to_string()));
        }
        if !self.initial_speed_kmh.is_finite() || self.initial_speed_kmh < 0.0 {
            return Err(SessionError::Config(format!(
                "initial_speed_kmh must be a finite speed >= 0, got {}",
                self.initial_speed_kmh
            )));
        }

        self.fusion.validate().map_err(SessionError::Config)?;
        self.arbitration.validate().map_err(SessionError::Config)?;
        self.governor.validate().map_err(SessionError::Config)?;
        Ok(())
    }
}

/// Deserialize any config type from an optional file plus `INTELLIDRIVE__*`
/// environment variables. Missing fields fall back to the type's serde defaults.
pub fn load_config<T: DeserializeOwned>(path: Option<&Path>) -> Result<T, SessionError> {
    let mut builder = Config::builder();

    if let Some(path) = path {
        info!("Loading configuration from {}", path.display());
        builder = builder.add_source(File::from(path).required(true));
    }

    builder
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .and_then(|c| c.try_deserialize())
        .map_err(|e| SessionError::Config(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_reference_timing() {
        let config = SessionConfig::default();
        assert_eq!(config.decision_tick_ms, 300);
        assert_eq!(config.speed_tick_ms, 50);
        assert_eq!(config.log_capacity, 20);
        assert_eq!(config.governor.epsilon_kmh, 0.2);
        assert_eq!(config.fusion.face_loss_secs, 3.0);
        assert_eq!(config.arbitration.distraction_warning_secs, 5.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_period() {
        let config = SessionConfig {
            speed_tick_ms: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(SessionError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_bad_governor() {
        let mut config = SessionConfig::default();
        config.governor.brake_step_kmh = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let path = std::env::temp_dir().join(format!(
            "intellidrive-config-{}.json",
            std::process::id()
        ));
        let mut file = std::fs::File::create(&path).unwrap();
        write!(
            file,
            r#"{{"decision_tick_ms": 200, "arbitration": {{"distraction_warning": "once"}}}}"#
        )
        .unwrap();

        let config = SessionConfig::load(Some(&path)).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.decision_tick_ms, 200);
        assert_eq!(config.speed_tick_ms, 50);
        assert_eq!(
            config.arbitration.distraction_warning,
            takeover::DistractionWarningPolicy::Once
        );
        assert_eq!(config.arbitration.emergency.contact_name, "Family Emergency Line");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let path = Path::new("/nonexistent/intellidrive.toml");
        assert!(SessionConfig::load(Some(path)).is_err());
    }

    #[test]
    fn test_source_replays_script_before_simulation() {
        use dms::{DriverState, MetricsSource};

        let config = SimulationConfig {
            seed: Some(7),
            script: vec![ScriptSegment {
                duration_ms: 1_000,
                sample: DriverMetricsSample::face_lost(),
            }],
        };
        let mut source = config.source();
        let sample = source.next_sample(0, DriverState::Alert).unwrap();
        assert!(!sample.face_detected);
        assert!(!source.is_degraded());

        let mut empty = SimulationConfig::default().source();
        empty.next_sample(0, DriverState::Alert).unwrap();
        assert!(empty.is_degraded());
    }
}
