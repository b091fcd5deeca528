//! Speed Governor
//!
//! Moves actual speed toward the target on its own tick. Acceleration and
//! braking use different step sizes; a step never carries speed past the
//! target, and a gap below epsilon snaps straight onto it.

use serde::{Deserialize, Serialize};

use crate::ArbitrationError;

/// Governor step sizes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernorConfig {
    /// Speed gained per tick when below target (km/h)
    pub accel_step_kmh: f64,
    /// Speed shed per tick when above target (km/h)
    pub brake_step_kmh: f64,
    /// Gap below which current snaps to target (km/h)
    pub epsilon_kmh: f64,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            accel_step_kmh: 0.3,
            brake_step_kmh: 0.7,
            epsilon_kmh: 0.2,
        }
    }
}

impl GovernorConfig {
    pub fn validate(&self) -> Result<(), String> {
        let checks = [
            ("accel_step_kmh", self.accel_step_kmh),
            ("brake_step_kmh", self.brake_step_kmh),
            ("epsilon_kmh", self.epsilon_kmh),
        ];
        for (name, value) in checks {
            if value.is_nan() || value <= 0.0 {
                return Err(format!("{} must be > 0, got {}", name, value));
            }
        }
        Ok(())
    }
}

/// Current and target speed
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeedState {
    pub current_kmh: f64,
    pub target_kmh: f64,
}

impl SpeedState {
    /// Cruising at `speed_kmh`
    pub fn cruising(speed_kmh: f64) -> Self {
        Self {
            current_kmh: speed_kmh,
            target_kmh: speed_kmh,
        }
    }

    /// Above target
    pub fn is_braking(&self) -> bool {
        self.current_kmh > self.target_kmh
    }

    pub fn at_target(&self) -> bool {
        self.current_kmh == self.target_kmh
    }
}

/// Speed smoothing
#[derive(Debug, Clone, Default)]
pub struct SpeedGovernor {
    config: GovernorConfig,
}

impl SpeedGovernor {
    pub fn new(config: GovernorConfig) -> Self {
        Self { config }
    }

    /// Next speed after one tick
    pub fn step(&self, current_kmh: f64, target_kmh: f64) -> Result<f64, ArbitrationError> {
        if !current_kmh.is_finite() {
            return Err(ArbitrationError::InvalidSpeed(current_kmh));
        }
        if !target_kmh.is_finite() {
            return Err(ArbitrationError::InvalidSpeed(target_kmh));
        }

        if (current_kmh - target_kmh).abs() < self.config.epsilon_kmh {
            return Ok(target_kmh);
        }

        Ok(if target_kmh > current_kmh {
            (current_kmh + self.config.accel_step_kmh).min(target_kmh)
        } else {
            (current_kmh - self.config.brake_step_kmh).max(target_kmh)
        })
    }

    /// Advance `speed` by one tick in place
    pub fn tick(&self, speed: &mut SpeedState) -> Result<(), ArbitrationError> {
        speed.current_kmh = self.step(speed.current_kmh, speed.target_kmh)?;
        Ok(())
    }
}
