//! Mode Arbitration Engine
//!
//! One call per decision tick. Takes the fused driver state, the current speed
//! and the previous [`ArbitrationState`], and returns the next state plus the
//! side effects to run. Effects hang off transition arcs (entering
//! EMERGENCY_CONTROL, entering an urgency level, parking) so they fire on the
//! tick the arc is taken and not on the ticks after it.

use alerting::{NotificationCategory, VibrationPattern};
use dms::{DriverState, FusionStep};
use log_stream::LogSeverity;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{ArbitrationConfig, DistractionWarningPolicy};
use crate::mode::{AutonomyMode, ModeTrigger, TakeoverUrgency};
use crate::ArbitrationError;

/// Mode-side state carried between decision ticks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArbitrationState {
    pub mode: AutonomyMode,
    pub urgency: TakeoverUrgency,
    pub target_speed_kmh: f64,
    pub hazards_active: bool,
    pub emergency_calling: bool,
    /// "Safely parked" already logged in this emergency episode
    pub parked_announced: bool,
    /// Distraction warning already issued in this DISTRACTED episode
    pub distraction_warned: bool,
}

impl ArbitrationState {
    pub fn new(target_speed_kmh: f64) -> Self {
        Self {
            mode: AutonomyMode::Manual,
            urgency: TakeoverUrgency::None,
            target_speed_kmh,
            hazards_active: false,
            emergency_calling: false,
            parked_announced: false,
            distraction_warned: false,
        }
    }
}

/// A side effect produced by one decision
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Log {
        severity: LogSeverity,
        message: String,
    },
    Speak {
        category: NotificationCategory,
        text: String,
    },
    Vibrate(VibrationPattern),
}

/// Output of one arbitration step
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub next: ArbitrationState,
    pub effects: Vec<Effect>,
}

impl Decision {
    /// Whether the mode changed in this step
    pub fn mode_changed(&self, previous: &ArbitrationState) -> bool {
        self.next.mode != previous.mode
    }
}

/// Mode arbitration engine
#[derive(Debug, Clone, Default)]
pub struct ArbitrationEngine {
    config: ArbitrationConfig,
}

impl ArbitrationEngine {
    pub fn new(config: ArbitrationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ArbitrationConfig {
        &self.config
    }

    /// Run one decision tick
    pub fn decide(
        &self,
        current: &ArbitrationState,
        fusion: &FusionStep,
        speed_kmh: f64,
    ) -> Result<Decision, ArbitrationError> {
        check_speed(speed_kmh)?;

        let driver = fusion.next;
        let mut next = current.clone();
        let mut effects = Vec::new();

        next.urgency = TakeoverUrgency::assess(driver, speed_kmh, self.config.distraction_speed_kmh);

        if driver != DriverState::Distracted {
            next.distraction_warned = false;
        }

        if driver.is_incapacitated() {
            if current.mode != AutonomyMode::EmergencyControl {
                let to = current
                    .mode
                    .transition(ModeTrigger::DriverIncapacitated)
                    .ok_or_else(|| ArbitrationError::TransitionDenied {
                        from: current.mode,
                        to: AutonomyMode::EmergencyControl,
                        reason: "no incapacitation arc".to_string(),
                    })?;
                self.enter_emergency(&mut next, to, driver, &mut effects);
            }
            next.target_speed_kmh = (speed_kmh - self.config.emergency_decel_kmh).max(0.0);
        } else if driver == DriverState::Distracted {
            if fusion.changed() {
                next.distraction_warned = false;
            }
            if fusion.time_in_state_secs > self.config.distraction_warning_secs
                && current.mode == AutonomyMode::Manual
            {
                let due = match self.config.distraction_warning {
                    DistractionWarningPolicy::Repeat => true,
                    DistractionWarningPolicy::Once => !next.distraction_warned,
                };
                if due {
                    self.warn_distraction(&mut effects);
                }
                next.distraction_warned = true;
            }
        } else if current.mode != AutonomyMode::EmergencyControl {
            next.hazards_active = false;
            next.emergency_calling = false;
        }

        if next.mode == AutonomyMode::EmergencyControl && speed_kmh < self.config.parked_speed_kmh {
            next.target_speed_kmh = 0.0;
            if speed_kmh == 0.0 && !next.parked_announced {
                info!("Vehicle stopped under emergency control");
                next.parked_announced = true;
                effects.push(Effect::Log {
                    severity: LogSeverity::Info,
                    message: "Vehicle Safely Parked. Emergency responders notified.".to_string(),
                });
            }
        }

        if next.urgency != current.urgency {
            debug!("Takeover urgency {} -> {}", current.urgency, next.urgency);
            if let Some(pattern) = next.urgency.vibration() {
                effects.push(Effect::Vibrate(pattern));
            }
        }

        Ok(Decision { next, effects })
    }

    /// Apply an explicit external mode request. The decision loop never calls this.
    pub fn request_mode(
        &self,
        current: &ArbitrationState,
        driver: DriverState,
        speed_kmh: f64,
        requested: AutonomyMode,
    ) -> Result<Decision, ArbitrationError> {
        check_speed(speed_kmh)?;

        if requested == current.mode {
            return Ok(Decision {
                next: current.clone(),
                effects: Vec::new(),
            });
        }

        let denied = |reason: &str| ArbitrationError::TransitionDenied {
            from: current.mode,
            to: requested,
            reason: reason.to_string(),
        };

        let trigger = match (current.mode, requested) {
            (AutonomyMode::Manual, AutonomyMode::Autonomous) => ModeTrigger::EngageAutopilot,
            (AutonomyMode::Autonomous, AutonomyMode::Manual) => ModeTrigger::DisengageAutopilot,
            (AutonomyMode::EmergencyControl, AutonomyMode::Manual) => ModeTrigger::DriverOverride,
            _ => return Err(denied("no such transition")),
        };

        if trigger == ModeTrigger::EngageAutopilot && driver.is_incapacitated() {
            return Err(denied("driver is incapacitated"));
        }
        // The driver takes the wheel at whatever speed the vehicle is doing
        if trigger == ModeTrigger::DriverOverride && driver != DriverState::Alert {
            return Err(denied("driver must be ALERT"));
        }

        let to = current
            .mode
            .transition(trigger)
            .ok_or_else(|| denied("no such transition"))?;

        let mut next = current.clone();
        let mut effects = Vec::new();
        next.mode = to;

        let message = match trigger {
            ModeTrigger::EngageAutopilot => "Autopilot engaged.".to_string(),
            ModeTrigger::DisengageAutopilot => "Autopilot disengaged. Manual control.".to_string(),
            ModeTrigger::DriverOverride => {
                next.hazards_active = false;
                next.emergency_calling = false;
                next.parked_announced = false;
                next.urgency = TakeoverUrgency::None;
                "Driver override: emergency control released, manual control restored.".to_string()
            }
            ModeTrigger::DriverIncapacitated => return Err(denied("loop-only trigger")),
        };

        info!("Mode {} -> {} ({:?})", current.mode, to, trigger);
        effects.push(Effect::Log {
            severity: LogSeverity::Info,
            message: message.clone(),
        });
        effects.push(Effect::Speak {
            category: NotificationCategory::Status,
            text: message,
        });

        Ok(Decision { next, effects })
    }

    fn enter_emergency(
        &self,
        next: &mut ArbitrationState,
        to: AutonomyMode,
        driver: DriverState,
        effects: &mut Vec<Effect>,
    ) {
        warn!("Driver {} detected, entering {}", driver, to);
        let contact = &self.config.emergency;

        next.mode = to;
        next.hazards_active = true;
        next.emergency_calling = true;
        next.parked_announced = false;

        effects.push(Effect::Log {
            severity: LogSeverity::Critical,
            message: format!("CRITICAL: Driver {} detected. Taking control.", driver),
        });
        effects.push(Effect::Speak {
            category: NotificationCategory::EmergencyTakeover,
            text: format!(
                "Critical emergency. Driver unresponsive. Initiating safe stop and alerting {}. Contacting {} now.",
                contact.hospital_name, contact.contact_name
            ),
        });
    }

    fn warn_distraction(&self, effects: &mut Vec<Effect>) {
        effects.push(Effect::Speak {
            category: NotificationCategory::DistractionWarning,
            text: "Warning: Driver distraction detected. Please focus on the road.".to_string(),
        });
        effects.push(Effect::Log {
            severity: LogSeverity::Warning,
            message: format!(
                "Driver gaze shifted for > {}s.",
                self.config.distraction_warning_secs
            ),
        });
    }
}

fn check_speed(speed_kmh: f64) -> Result<(), ArbitrationError> {
    if !speed_kmh.is_finite() || speed_kmh < 0.0 {
        return Err(ArbitrationError::InvalidSpeed(speed_kmh));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(previous: DriverState, next: DriverState, secs: f64) -> FusionStep {
        FusionStep {
            previous,
            next,
            time_in_state_secs: secs,
        }
    }

    fn count_logs(effects: &[Effect], severity: LogSeverity) -> usize {
        effects
            .iter()
            .filter(|e| matches!(e, Effect::Log { severity: s, .. } if *s == severity))
            .count()
    }

    fn count_speak(effects: &[Effect]) -> usize {
        effects.iter().filter(|e| matches!(e, Effect::Speak { .. })).count()
    }

    #[test]
    fn test_incapacitation_enters_emergency_once() {
        let engine = ArbitrationEngine::default();
        let mut state = ArbitrationState::new(80.0);
        let mut criticals = 0;
        let mut speaks = 0;

        let first = engine
            .decide(&state, &step(DriverState::Distracted, DriverState::Unresponsive, 3.3), 80.0)
            .unwrap();
        assert_eq!(first.next.mode, AutonomyMode::EmergencyControl);
        assert_eq!(first.next.urgency, TakeoverUrgency::High);
        assert!(first.next.hazards_active);
        assert!(first.next.emergency_calling);
        assert_eq!(first.next.target_speed_kmh, 70.0);
        assert!(first.effects.contains(&Effect::Vibrate(VibrationPattern::strong())));
        criticals += count_logs(&first.effects, LogSeverity::Critical);
        speaks += count_speak(&first.effects);
        state = first.next;

        for _ in 0..49 {
            let decision = engine
                .decide(&state, &step(DriverState::Unresponsive, DriverState::Unresponsive, 1.0), 75.0)
                .unwrap();
            criticals += count_logs(&decision.effects, LogSeverity::Critical);
            speaks += count_speak(&decision.effects);
            assert!(!decision.effects.iter().any(|e| matches!(e, Effect::Vibrate(_))));
            state = decision.next;
        }

        assert_eq!(criticals, 1);
        assert_eq!(speaks, 1);
        assert_eq!(state.urgency, TakeoverUrgency::High);
        assert_eq!(state.target_speed_kmh, 65.0);
    }

    #[test]
    fn test_emergency_speech_names_hospital_and_contact() {
        let engine = ArbitrationEngine::default();
        let decision = engine
            .decide(&ArbitrationState::new(80.0), &step(DriverState::Alert, DriverState::Drowsy, 2.6), 50.0)
            .unwrap();
        let text = decision
            .effects
            .iter()
            .find_map(|e| match e {
                Effect::Speak { text, .. } => Some(text.clone()),
                _ => None,
            })
            .unwrap();
        assert!(text.contains("Saint Mary's Medical Center"));
        assert!(text.contains("Family Emergency Line"));
    }

    #[test]
    fn test_emergency_is_sticky_when_driver_recovers() {
        let engine = ArbitrationEngine::default();
        let mut state = ArbitrationState::new(80.0);
        state.mode = AutonomyMode::EmergencyControl;
        state.hazards_active = true;
        state.emergency_calling = true;
        state.target_speed_kmh = 30.0;

        let decision = engine
            .decide(&state, &step(DriverState::Unresponsive, DriverState::Alert, 4.0), 40.0)
            .unwrap();
        assert_eq!(decision.next.mode, AutonomyMode::EmergencyControl);
        assert!(decision.next.hazards_active);
        assert!(decision.next.emergency_calling);
        assert_eq!(decision.next.urgency, TakeoverUrgency::None);
        assert_eq!(decision.next.target_speed_kmh, 30.0);
    }

    #[test]
    fn test_decel_never_requests_negative_target() {
        let engine = ArbitrationEngine::default();
        let mut state = ArbitrationState::new(5.0);
        state.mode = AutonomyMode::EmergencyControl;

        let decision = engine
            .decide(&state, &step(DriverState::Unresponsive, DriverState::Unresponsive, 1.0), 4.0)
            .unwrap();
        assert_eq!(decision.next.target_speed_kmh, 0.0);
    }

    #[test]
    fn test_parked_is_logged_once() {
        let engine = ArbitrationEngine::default();
        let mut state = ArbitrationState::new(0.5);
        state.mode = AutonomyMode::EmergencyControl;

        let slow = engine
            .decide(&state, &step(DriverState::Unresponsive, DriverState::Unresponsive, 1.0), 0.5)
            .unwrap();
        assert_eq!(slow.next.target_speed_kmh, 0.0);
        assert_eq!(count_logs(&slow.effects, LogSeverity::Info), 0);

        let stopped = engine
            .decide(&slow.next, &step(DriverState::Unresponsive, DriverState::Unresponsive, 1.3), 0.0)
            .unwrap();
        assert_eq!(count_logs(&stopped.effects, LogSeverity::Info), 1);

        let still = engine
            .decide(&stopped.next, &step(DriverState::Unresponsive, DriverState::Unresponsive, 1.6), 0.0)
            .unwrap();
        assert_eq!(count_logs(&still.effects, LogSeverity::Info), 0);
    }

    #[test]
    fn test_distraction_urgency_by_speed() {
        let engine = ArbitrationEngine::default();
        let state = ArbitrationState::new(80.0);

        let fast = engine
            .decide(&state, &step(DriverState::Alert, DriverState::Distracted, 0.0), 80.0)
            .unwrap();
        assert_eq!(fast.next.urgency, TakeoverUrgency::Medium);
        assert_eq!(fast.effects, vec![Effect::Vibrate(VibrationPattern::pulse())]);

        let slow = engine
            .decide(&state, &step(DriverState::Alert, DriverState::Distracted, 0.0), 30.0)
            .unwrap();
        assert_eq!(slow.next.urgency, TakeoverUrgency::Low);
        assert!(slow.effects.is_empty());
    }

    #[test]
    fn test_distraction_warning_repeats_by_default() {
        let engine = ArbitrationEngine::default();
        let mut state = ArbitrationState::new(80.0);
        let mut warnings = 0;
        for i in 0..5 {
            let secs = 5.3 + i as f64 * 0.3;
            let decision = engine
                .decide(&state, &step(DriverState::Distracted, DriverState::Distracted, secs), 80.0)
                .unwrap();
            warnings += count_logs(&decision.effects, LogSeverity::Warning);
            state = decision.next;
        }
        assert_eq!(warnings, 5);
    }

    #[test]
    fn test_distraction_warning_once_policy() {
        let engine = ArbitrationEngine::new(ArbitrationConfig {
            distraction_warning: DistractionWarningPolicy::Once,
            ..Default::default()
        });
        let mut state = ArbitrationState::new(80.0);
        let mut warnings = 0;
        for i in 0..5 {
            let secs = 5.3 + i as f64 * 0.3;
            let decision = engine
                .decide(&state, &step(DriverState::Distracted, DriverState::Distracted, secs), 80.0)
                .unwrap();
            warnings += count_logs(&decision.effects, LogSeverity::Warning);
            state = decision.next;
        }
        assert_eq!(warnings, 1);

        let back = engine
            .decide(&state, &step(DriverState::Distracted, DriverState::Alert, 6.8), 80.0)
            .unwrap();
        assert!(!back.next.distraction_warned);
    }

    #[test]
    fn test_no_distraction_warning_outside_manual() {
        let engine = ArbitrationEngine::default();
        let mut state = ArbitrationState::new(80.0);
        state.mode = AutonomyMode::Autonomous;
        let decision = engine
            .decide(&state, &step(DriverState::Distracted, DriverState::Distracted, 9.0), 80.0)
            .unwrap();
        assert_eq!(count_logs(&decision.effects, LogSeverity::Warning), 0);
    }

    #[test]
    fn test_alert_clears_hazards_outside_emergency() {
        let engine = ArbitrationEngine::default();
        let mut state = ArbitrationState::new(80.0);
        state.hazards_active = true;
        state.emergency_calling = true;
        let decision = engine
            .decide(&state, &step(DriverState::Alert, DriverState::Alert, 1.0), 80.0)
            .unwrap();
        assert!(!decision.next.hazards_active);
        assert!(!decision.next.emergency_calling);
    }

    #[test]
    fn test_invalid_speed_is_rejected() {
        let engine = ArbitrationEngine::default();
        let state = ArbitrationState::new(80.0);
        let fusion = step(DriverState::Alert, DriverState::Alert, 0.0);
        assert!(matches!(
            engine.decide(&state, &fusion, f64::NAN),
            Err(ArbitrationError::InvalidSpeed(_))
        ));
        assert!(engine.decide(&state, &fusion, -1.0).is_err());
    }

    #[test]
    fn test_override_requires_alert_driver() {
        let engine = ArbitrationEngine::default();
        let mut state = ArbitrationState::new(0.0);
        state.mode = AutonomyMode::EmergencyControl;
        state.hazards_active = true;
        state.emergency_calling = true;

        assert!(engine
            .request_mode(&state, DriverState::Drowsy, 0.0, AutonomyMode::Manual)
            .is_err());
        assert!(engine
            .request_mode(&state, DriverState::Alert, 0.0, AutonomyMode::Autonomous)
            .is_err());

        let moving = engine
            .request_mode(&state, DriverState::Alert, 65.8, AutonomyMode::Manual)
            .unwrap();
        assert_eq!(moving.next.mode, AutonomyMode::Manual);
        assert!(!moving.next.hazards_active);

        let released = engine
            .request_mode(&state, DriverState::Alert, 0.0, AutonomyMode::Manual)
            .unwrap();
        assert_eq!(released.next.mode, AutonomyMode::Manual);
        assert!(!released.next.hazards_active);
        assert!(!released.next.emergency_calling);
        assert_eq!(count_logs(&released.effects, LogSeverity::Info), 1);
    }

    #[test]
    fn test_autopilot_engage_and_disengage() {
        let engine = ArbitrationEngine::default();
        let state = ArbitrationState::new(80.0);

        let engaged = engine
            .request_mode(&state, DriverState::Alert, 80.0, AutonomyMode::Autonomous)
            .unwrap();
        assert_eq!(engaged.next.mode, AutonomyMode::Autonomous);

        let same = engine
            .request_mode(&engaged.next, DriverState::Alert, 80.0, AutonomyMode::Autonomous)
            .unwrap();
        assert!(same.effects.is_empty());

        let manual = engine
            .request_mode(&engaged.next, DriverState::Distracted, 80.0, AutonomyMode::Manual)
            .unwrap();
        assert_eq!(manual.next.mode, AutonomyMode::Manual);

        assert!(engine
            .request_mode(&state, DriverState::Alert, 80.0, AutonomyMode::EmergencyControl)
            .is_err());
    }
}
