//! Driver attentiveness samples

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::DmsError;

/// Coarse head pose category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeadPose {
    #[default]
    Forward,
    Left,
    Right,
    Down,
}

impl HeadPose {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Forward => "forward",
            Self::Left => "left",
            Self::Right => "right",
            Self::Down => "down",
        }
    }
}

/// One sample from a metrics source. Only the latest one is kept by the session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverMetricsSample {
    pub eyes_open: bool,
    pub face_detected: bool,
    pub head_pose: HeadPose,
    #[serde(default)]
    pub blink_duration_seconds: f64,
    #[serde(default = "default_readiness")]
    pub readiness_score: f64,
}

fn default_readiness() -> f64 {
    100.0
}

impl Default for DriverMetricsSample {
    fn default() -> Self {
        Self::attentive()
    }
}

impl DriverMetricsSample {
    /// Eyes open, face visible, looking ahead
    pub fn attentive() -> Self {
        Self {
            eyes_open: true,
            face_detected: true,
            head_pose: HeadPose::Forward,
            blink_duration_seconds: 0.0,
            readiness_score: 100.0,
        }
    }

    /// Face out of frame
    pub fn face_lost() -> Self {
        Self {
            face_detected: false,
            readiness_score: 5.0,
            ..Self::attentive()
        }
    }

    /// Face visible, eyes closed
    pub fn eyes_closed() -> Self {
        Self {
            eyes_open: false,
            readiness_score: 15.0,
            ..Self::attentive()
        }
    }

    /// Face visible, eyes open, head turned
    pub fn looking(pose: HeadPose) -> Self {
        Self {
            head_pose: pose,
            readiness_score: 45.0,
            ..Self::attentive()
        }
    }

    /// Check numeric fields are in range
    pub fn validate(&self) -> Result<(), DmsError> {
        if !(0.0..=100.0).contains(&self.readiness_score) {
            return Err(DmsError::InvalidSample {
                field: "readinessScore",
                value: self.readiness_score,
            });
        }
        if !self.blink_duration_seconds.is_finite() || self.blink_duration_seconds < 0.0 {
            return Err(DmsError::InvalidSample {
                field: "blinkDurationSeconds",
                value: self.blink_duration_seconds,
            });
        }
        Ok(())
    }

    /// Clamp numeric fields into range instead of rejecting the sample
    pub fn sanitized(mut self) -> Self {
        if let Err(e) = self.validate() {
            debug!("Clamping sample: {}", e);
        }

        self.readiness_score = if self.readiness_score.is_nan() {
            0.0
        } else {
            self.readiness_score.clamp(0.0, 100.0)
        };

        if !self.blink_duration_seconds.is_finite() || self.blink_duration_seconds < 0.0 {
            self.blink_duration_seconds = 0.0;
        }

        self
    }
}
