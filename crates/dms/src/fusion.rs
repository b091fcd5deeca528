//! Driver state fusion
//!
//! Maps the latest sample plus the time spent in the current state to a
//! [`DriverState`]. First matching rule wins:
//!
//! 1. face lost: UNRESPONSIVE after `face_loss_secs`, DISTRACTED before
//! 2. eyes closed: DROWSY after `eyes_closed_secs`, ALERT before
//! 3. head not forward: DISTRACTED
//! 4. otherwise ALERT
//!
//! Thresholds compare with strict greater-than. With `hold_escalated_state`
//! an UNRESPONSIVE or DROWSY previous state is kept for as long as its own
//! condition keeps failing.

use serde::{Deserialize, Serialize};

use crate::config::FusionConfig;
use crate::sample::{DriverMetricsSample, HeadPose};
use crate::state::DriverState;

/// Which fusion rule a sample falls under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FailingCondition {
    #[default]
    Nominal,
    FaceLost,
    EyesClosed,
    LookingAway,
}

impl FailingCondition {
    pub fn of(sample: &DriverMetricsSample) -> Self {
        if !sample.face_detected {
            Self::FaceLost
        } else if !sample.eyes_open {
            Self::EyesClosed
        } else if sample.head_pose != HeadPose::Forward {
            Self::LookingAway
        } else {
            Self::Nominal
        }
    }
}

/// State fusion with configurable thresholds
#[derive(Debug, Clone, Default)]
pub struct StateFusion {
    config: FusionConfig,
}

impl StateFusion {
    pub fn new(config: FusionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FusionConfig {
        &self.config
    }

    /// Classify a sample. `time_in_state_secs` is measured against the
    /// previous confirmed state's entry time, not the candidate's.
    pub fn fuse(
        &self,
        sample: &DriverMetricsSample,
        previous: DriverState,
        time_in_state_secs: f64,
    ) -> DriverState {
        let hold = self.config.hold_escalated_state;
        match FailingCondition::of(sample) {
            FailingCondition::FaceLost => {
                if time_in_state_secs > self.config.face_loss_secs
                    || (hold && previous == DriverState::Unresponsive)
                {
                    DriverState::Unresponsive
                } else {
                    DriverState::Distracted
                }
            }
            FailingCondition::EyesClosed => {
                if time_in_state_secs > self.config.eyes_closed_secs
                    || (hold && previous == DriverState::Drowsy)
                {
                    DriverState::Drowsy
                } else {
                    DriverState::Alert
                }
            }
            FailingCondition::LookingAway => DriverState::Distracted,
            FailingCondition::Nominal => DriverState::Alert,
        }
    }
}

/// Fuse with default thresholds (3s face loss, 2.5s eye closure)
pub fn fuse(
    sample: &DriverMetricsSample,
    previous: DriverState,
    time_in_state_secs: f64,
) -> DriverState {
    StateFusion::default().fuse(sample, previous, time_in_state_secs)
}
