//! Autonomy modes, urgency, and the mode transition table

use alerting::VibrationPattern;
use dms::DriverState;
use serde::{Deserialize, Serialize};

/// Which agent currently directs the vehicle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AutonomyMode {
    #[default]
    Manual,
    Autonomous,
    EmergencyControl,
}

impl AutonomyMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "MANUAL",
            Self::Autonomous => "AUTONOMOUS",
            Self::EmergencyControl => "EMERGENCY_CONTROL",
        }
    }

    /// Look up the arc for `trigger` leaving this mode
    pub fn transition(self, trigger: ModeTrigger) -> Option<AutonomyMode> {
        TRANSITIONS
            .iter()
            .find(|(from, t, _)| *from == self && *t == trigger)
            .map(|(_, _, to)| *to)
    }
}

impl std::fmt::Display for AutonomyMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events that move the mode machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModeTrigger {
    /// Driver fused as DROWSY or UNRESPONSIVE (decision loop)
    DriverIncapacitated,
    /// Driver asks the autopilot to drive (external)
    EngageAutopilot,
    /// Driver takes the wheel back from the autopilot (external)
    DisengageAutopilot,
    /// Recovered driver takes back emergency control (external)
    DriverOverride,
}

/// Every permitted mode change. The decision loop only ever fires
/// `DriverIncapacitated`; nothing in the loop leaves EMERGENCY_CONTROL.
pub const TRANSITIONS: &[(AutonomyMode, ModeTrigger, AutonomyMode)] = &[
    (
        AutonomyMode::Manual,
        ModeTrigger::DriverIncapacitated,
        AutonomyMode::EmergencyControl,
    ),
    (
        AutonomyMode::Autonomous,
        ModeTrigger::DriverIncapacitated,
        AutonomyMode::EmergencyControl,
    ),
    (
        AutonomyMode::Manual,
        ModeTrigger::EngageAutopilot,
        AutonomyMode::Autonomous,
    ),
    (
        AutonomyMode::Autonomous,
        ModeTrigger::DisengageAutopilot,
        AutonomyMode::Manual,
    ),
    (
        AutonomyMode::EmergencyControl,
        ModeTrigger::DriverOverride,
        AutonomyMode::Manual,
    ),
];

/// How urgently human attention is requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TakeoverUrgency {
    #[default]
    None,
    Low,
    Medium,
    High,
}

impl TakeoverUrgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        }
    }

    /// Urgency for a driver state at a given speed
    pub fn assess(driver: DriverState, speed_kmh: f64, distraction_speed_kmh: f64) -> Self {
        match driver {
            DriverState::Unresponsive | DriverState::Drowsy => Self::High,
            DriverState::Distracted if speed_kmh > distraction_speed_kmh => Self::Medium,
            DriverState::Distracted => Self::Low,
            DriverState::Alert => Self::None,
        }
    }

    /// Haptic pattern played when this urgency is entered
    pub fn vibration(&self) -> Option<VibrationPattern> {
        match self {
            Self::High => Some(VibrationPattern::strong()),
            Self::Medium => Some(VibrationPattern::pulse()),
            Self::Low | Self::None => None,
        }
    }
}

impl std::fmt::Display for TakeoverUrgency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emergency_is_only_left_by_override() {
        for trigger in [
            ModeTrigger::DriverIncapacitated,
            ModeTrigger::EngageAutopilot,
            ModeTrigger::DisengageAutopilot,
        ] {
            assert_eq!(AutonomyMode::EmergencyControl.transition(trigger), None);
        }
        assert_eq!(
            AutonomyMode::EmergencyControl.transition(ModeTrigger::DriverOverride),
            Some(AutonomyMode::Manual)
        );
    }

    #[test]
    fn test_incapacitation_arcs() {
        assert_eq!(
            AutonomyMode::Manual.transition(ModeTrigger::DriverIncapacitated),
            Some(AutonomyMode::EmergencyControl)
        );
        assert_eq!(
            AutonomyMode::Autonomous.transition(ModeTrigger::DriverIncapacitated),
            Some(AutonomyMode::EmergencyControl)
        );
        assert_eq!(AutonomyMode::Manual.transition(ModeTrigger::DisengageAutopilot), None);
    }

    #[test]
    fn test_urgency_assessment() {
        assert_eq!(TakeoverUrgency::assess(DriverState::Drowsy, 0.0, 40.0), TakeoverUrgency::High);
        assert_eq!(TakeoverUrgency::assess(DriverState::Distracted, 80.0, 40.0), TakeoverUrgency::Medium);
        assert_eq!(TakeoverUrgency::assess(DriverState::Distracted, 40.0, 40.0), TakeoverUrgency::Low);
        assert_eq!(TakeoverUrgency::assess(DriverState::Alert, 120.0, 40.0), TakeoverUrgency::None);
    }

    #[test]
    fn test_vibration_patterns() {
        assert_eq!(TakeoverUrgency::High.vibration(), Some(VibrationPattern(vec![200, 100, 200])));
        assert_eq!(TakeoverUrgency::Medium.vibration(), Some(VibrationPattern(vec![100])));
        assert_eq!(TakeoverUrgency::Low.vibration(), None);
        assert_eq!(TakeoverUrgency::None.vibration(), None);
    }
}
