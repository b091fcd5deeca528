//! State fusion configuration

use serde::{Deserialize, Serialize};

/// Thresholds used by [`crate::StateFusion`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    /// Face must stay lost longer than this before UNRESPONSIVE (seconds)
    pub face_loss_secs: f64,

    /// Eyes must stay closed longer than this before DROWSY (seconds)
    pub eyes_closed_secs: f64,

    /// Restart the time-in-state clock when the failing condition changes
    /// even if the confirmed state does not
    pub reset_on_condition_change: bool,

    /// Keep UNRESPONSIVE/DROWSY while the condition that produced them
    /// persists, instead of dropping back once the new state's clock restarts
    pub hold_escalated_state: bool,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            face_loss_secs: 3.0,
            eyes_closed_secs: 2.5,
            reset_on_condition_change: true,
            hold_escalated_state: true,
        }
    }
}

impl FusionConfig {
    /// Create strict config (lower thresholds)
    pub fn strict() -> Self {
        Self {
            face_loss_secs: 2.0,
            eyes_closed_secs: 1.5,
            ..Default::default()
        }
    }

    /// Create lenient config (higher thresholds)
    pub fn lenient() -> Self {
        Self {
            face_loss_secs: 5.0,
            eyes_closed_secs: 4.0,
            ..Default::default()
        }
    }

    /// Check the thresholds are usable
    pub fn validate(&self) -> Result<(), String> {
        if self.face_loss_secs.is_nan() || self.face_loss_secs < 0.0 {
            return Err(format!("face_loss_secs must be >= 0, got {}", self.face_loss_secs));
        }
        if self.eyes_closed_secs.is_nan() || self.eyes_closed_secs < 0.0 {
            return Err(format!("eyes_closed_secs must be >= 0, got {}", self.eyes_closed_secs));
        }
        Ok(())
    }
}
