//! Driver state tracking

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::fusion::{FailingCondition, StateFusion};
use crate::sample::DriverMetricsSample;
use crate::DmsError;

/// Fused driver attentiveness classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DriverState {
    #[default]
    Alert,
    Distracted,
    Drowsy,
    Unresponsive,
}

impl DriverState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Alert => "ALERT",
            Self::Distracted => "DISTRACTED",
            Self::Drowsy => "DROWSY",
            Self::Unresponsive => "UNRESPONSIVE",
        }
    }

    /// States that hand control to the emergency controller
    pub fn is_incapacitated(&self) -> bool {
        matches!(self, Self::Drowsy | Self::Unresponsive)
    }
}

impl std::fmt::Display for DriverState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one fusion step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionStep {
    pub previous: DriverState,
    pub next: DriverState,
    /// Time in the previous state, measured before any reset this step
    pub time_in_state_secs: f64,
}

impl FusionStep {
    pub fn changed(&self) -> bool {
        self.previous != self.next
    }
}

/// Confirmed driver state plus the clock it is measured against
#[derive(Debug, Clone)]
pub struct DriverStateTracker {
    state: DriverState,
    entered_ms: i64,
    condition: FailingCondition,
    condition_since_ms: i64,
    last_step_ms: i64,
}

impl DriverStateTracker {
    /// Start in ALERT at `now_ms`
    pub fn new(now_ms: i64) -> Self {
        Self {
            state: DriverState::Alert,
            entered_ms: now_ms,
            condition: FailingCondition::Nominal,
            condition_since_ms: now_ms,
            last_step_ms: now_ms,
        }
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn entered_at_ms(&self) -> i64 {
        self.entered_ms
    }

    /// Seconds since the confirmed state was entered
    pub fn time_in_state_secs(&self, now_ms: i64) -> f64 {
        (now_ms - self.entered_ms).max(0) as f64 / 1000.0
    }

    /// Fuse `sample` at `now_ms` and commit the resulting state.
    /// The entry time only moves when the state value changes.
    pub fn step(
        &mut self,
        fusion: &StateFusion,
        sample: &DriverMetricsSample,
        now_ms: i64,
    ) -> Result<FusionStep, DmsError> {
        if now_ms < self.last_step_ms {
            return Err(DmsError::ClockSkew {
                now_ms,
                last_ms: self.last_step_ms,
            });
        }
        self.last_step_ms = now_ms;

        let reset_on_condition = fusion.config().reset_on_condition_change;
        let condition = FailingCondition::of(sample);
        if condition != self.condition {
            self.condition = condition;
            self.condition_since_ms = now_ms;
        }

        let anchor_ms = if reset_on_condition {
            self.entered_ms.max(self.condition_since_ms)
        } else {
            self.entered_ms
        };
        let time_in_state_secs = (now_ms - anchor_ms) as f64 / 1000.0;

        let previous = self.state;
        let next = fusion.fuse(sample, previous, time_in_state_secs);

        if next != previous {
            debug!(
                "Driver state {} -> {} after {:.2}s",
                previous, next, time_in_state_secs
            );
            self.state = next;
            self.entered_ms = now_ms;
        }

        Ok(FusionStep {
            previous,
            next,
            time_in_state_secs,
        })
    }
}
