//! Driver Monitoring System (DMS)
//!
//! Turns driver attentiveness samples into a discrete driver state:
//! - Sample sanitizing (out-of-range readiness, blink duration)
//! - Time-in-state tracking with hysteresis
//! - State fusion (face loss, eye closure, head pose)
//! - Metrics sources (simulated, scripted, fallback wrapper)

pub mod config;
pub mod fusion;
pub mod sample;
pub mod source;
pub mod state;

pub use config::FusionConfig;
pub use fusion::{fuse, FailingCondition, StateFusion};
pub use sample::{DriverMetricsSample, HeadPose};
pub use source::{FallbackSource, MetricsSource, ScriptedSource, SimulatedSource};
pub use state::{DriverState, DriverStateTracker, FusionStep};

use thiserror::Error;

/// DMS error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DmsError {
    #[error("Sensor unavailable: {0}")]
    SensorUnavailable(String),

    #[error("Invalid sample: {field} = {value}")]
    InvalidSample { field: &'static str, value: f64 },

    #[error("Clock went backwards: {now_ms}ms is before last step at {last_ms}ms")]
    ClockSkew { now_ms: i64, last_ms: i64 },
}
