//! Arbitration configuration

use serde::{Deserialize, Serialize};

/// Whether the sustained-distraction warning repeats every decision tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistractionWarningPolicy {
    /// Warn on every tick past the threshold
    #[default]
    Repeat,
    /// Warn once per continuous DISTRACTED episode
    Once,
}

/// Emergency destination and contact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmergencyContactConfig {
    pub hospital_name: String,
    pub distance_label: String,
    pub contact_name: String,
}

impl Default for EmergencyContactConfig {
    fn default() -> Self {
        Self {
            hospital_name: "Saint Mary's Medical Center".to_string(),
            distance_label: "1.2km".to_string(),
            contact_name: "Family Emergency Line".to_string(),
        }
    }
}

/// Mode arbitration configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArbitrationConfig {
    /// Continuous distraction before the spoken warning (seconds)
    pub distraction_warning_secs: f64,

    /// Above this speed a distracted driver gets MEDIUM urgency (km/h)
    pub distraction_speed_kmh: f64,

    /// Target reduction per decision tick under emergency control (km/h)
    pub emergency_decel_kmh: f64,

    /// Below this speed emergency control forces a full stop (km/h)
    pub parked_speed_kmh: f64,

    pub distraction_warning: DistractionWarningPolicy,

    pub emergency: EmergencyContactConfig,
}

impl Default for ArbitrationConfig {
    fn default() -> Self {
        Self {
            distraction_warning_secs: 5.0,
            distraction_speed_kmh: 40.0,
            emergency_decel_kmh: 10.0,
            parked_speed_kmh: 1.0,
            distraction_warning: DistractionWarningPolicy::Repeat,
            emergency: EmergencyContactConfig::default(),
        }
    }
}

impl ArbitrationConfig {
    pub fn validate(&self) -> Result<(), String> {
        let checks = [
            ("distraction_warning_secs", self.distraction_warning_secs),
            ("distraction_speed_kmh", self.distraction_speed_kmh),
            ("parked_speed_kmh", self.parked_speed_kmh),
        ];
        for (name, value) in checks {
            if value.is_nan() || value < 0.0 {
                return Err(format!("{} must be >= 0, got {}", name, value));
            }
        }
        if self.emergency_decel_kmh.is_nan() || self.emergency_decel_kmh <= 0.0 {
            return Err(format!(
                "emergency_decel_kmh must be > 0, got {}",
                self.emergency_decel_kmh
            ));
        }
        Ok(())
    }
}
