//! Session state owner

use alerting::{DedupNotifier, NotificationSink, NotifierStats};
use dms::{DriverMetricsSample, DriverState, DriverStateTracker, StateFusion};
use log_stream::{LogEntry, LogSeverity, LogStream};
use metrics::{counter, gauge};
use serde::Serialize;
use takeover::{
    banner, ArbitrationEngine, ArbitrationError, ArbitrationState, AutonomyMode, Effect,
    EmergencyContext, SpeedGovernor, TakeoverBanner, TakeoverUrgency,
};
use tracing::{debug, error, info};

use crate::config::SessionConfig;
use crate::SessionError;

/// Read-only view of the session for the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub driver_state: DriverState,
    pub mode: AutonomyMode,
    pub speed: f64,
    pub target_speed: f64,
    pub urgency: TakeoverUrgency,
    pub hazards_active: bool,
    pub is_braking: bool,
    pub emergency_context: EmergencyContext,
    pub banner: Option<TakeoverBanner>,
    pub metrics: DriverMetricsSample,
    pub log_entries: Vec<LogEntry>,
}

/// What a tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Committed,
    /// The tick faulted and the previous state was kept
    Held,
}

/// All core state, mutated only through the tick and input methods
pub struct Session {
    config: SessionConfig,
    fusion: StateFusion,
    arbitration: ArbitrationEngine,
    governor: SpeedGovernor,
    tracker: DriverStateTracker,
    state: ArbitrationState,
    speed_kmh: f64,
    latest_sample: DriverMetricsSample,
    log: LogStream,
    notifier: DedupNotifier<Box<dyn NotificationSink>>,
}

impl Session {
    /// Create a session starting at `now_ms` with the driver ALERT and the
    /// vehicle cruising at the configured initial speed
    pub fn new(config: SessionConfig, sink: Box<dyn NotificationSink>, now_ms: i64) -> Self {
        info!(
            "Creating takeover session: decision={}ms speed={}ms initial={}km/h",
            config.decision_tick_ms, config.speed_tick_ms, config.initial_speed_kmh
        );
        let mut log = LogStream::new(config.log_capacity);
        log.append_at(now_ms, "Driver monitoring session started.", LogSeverity::Info);

        Self {
            fusion: StateFusion::new(config.fusion.clone()),
            arbitration: ArbitrationEngine::new(config.arbitration.clone()),
            governor: SpeedGovernor::new(config.governor.clone()),
            tracker: DriverStateTracker::new(now_ms),
            state: ArbitrationState::new(config.initial_speed_kmh),
            speed_kmh: config.initial_speed_kmh,
            latest_sample: DriverMetricsSample::attentive(),
            log,
            notifier: DedupNotifier::new(sink),
            config,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Replace the latest sample. Out-of-range fields are clamped.
    pub fn submit_metrics_sample(&mut self, sample: DriverMetricsSample) {
        if let Err(e) = sample.validate() {
            debug!("Clamping invalid sample: {}", e);
        }
        self.latest_sample = sample.sanitized();
    }

    /// Fuse the latest sample, arbitrate, and run the resulting effects.
    /// A fault keeps the previous state and is logged as critical.
    pub fn decision_tick(&mut self, now_ms: i64) -> TickOutcome {
        counter!("intellidrive_decision_ticks_total").increment(1);

        let mut tracker = self.tracker.clone();
        let decision = tracker
            .step(&self.fusion, &self.latest_sample, now_ms)
            .map_err(ArbitrationError::from)
            .and_then(|step| self.arbitration.decide(&self.state, &step, self.speed_kmh));

        let decision = match decision {
            Ok(decision) => decision,
            Err(e) => return self.hold("Decision", &e, now_ms),
        };

        if decision.mode_changed(&self.state) {
            info!("Autonomy mode {} -> {}", self.state.mode, decision.next.mode);
            counter!("intellidrive_mode_transitions_total", "mode" => decision.next.mode.as_str())
                .increment(1);
        }

        self.tracker = tracker;
        self.state = decision.next;
        for effect in decision.effects {
            self.apply(effect, now_ms);
        }

        gauge!("intellidrive_target_speed_kmh").set(self.state.target_speed_kmh);
        TickOutcome::Committed
    }

    /// Move speed one governor step toward the target
    pub fn speed_tick(&mut self, now_ms: i64) -> TickOutcome {
        match self.governor.step(self.speed_kmh, self.state.target_speed_kmh) {
            Ok(speed) => {
                self.speed_kmh = speed;
                gauge!("intellidrive_speed_kmh").set(speed);
                TickOutcome::Committed
            }
            Err(e) => self.hold("Speed", &e, now_ms),
        }
    }

    /// Explicit external mode change (autopilot engage/disengage, driver
    /// override out of emergency control)
    pub fn request_mode(
        &mut self,
        requested: AutonomyMode,
        now_ms: i64,
    ) -> Result<AutonomyMode, SessionError> {
        let decision = self.arbitration.request_mode(
            &self.state,
            self.tracker.state(),
            self.speed_kmh,
            requested,
        )?;

        if decision.mode_changed(&self.state) {
            counter!("intellidrive_mode_transitions_total", "mode" => decision.next.mode.as_str())
                .increment(1);
        }

        self.state = decision.next;
        for effect in decision.effects {
            self.apply(effect, now_ms);
        }
        Ok(self.state.mode)
    }

    fn apply(&mut self, effect: Effect, now_ms: i64) {
        match effect {
            Effect::Log { severity, message } => {
                self.log.append_at(now_ms, message, severity);
            }
            Effect::Speak { category, text } => {
                if !self.notifier.speak(category, &text) {
                    counter!("intellidrive_notifications_suppressed_total").increment(1);
                }
            }
            Effect::Vibrate(pattern) => self.notifier.vibrate(&pattern),
        }
    }

    fn hold(&mut self, tick: &str, e: &ArbitrationError, now_ms: i64) -> TickOutcome {
        error!("{} tick fault, holding previous state: {}", tick, e);
        counter!("intellidrive_ticks_held_total").increment(1);
        self.log.append_at(
            now_ms,
            format!("{} fault: {}. Holding previous state.", tick, e),
            LogSeverity::Critical,
        );
        TickOutcome::Held
    }

    pub fn driver_state(&self) -> DriverState {
        self.tracker.state()
    }

    pub fn mode(&self) -> AutonomyMode {
        self.state.mode
    }

    pub fn urgency(&self) -> TakeoverUrgency {
        self.state.urgency
    }

    pub fn speed_kmh(&self) -> f64 {
        self.speed_kmh
    }

    pub fn target_speed_kmh(&self) -> f64 {
        self.state.target_speed_kmh
    }

    pub fn hazards_active(&self) -> bool {
        self.state.hazards_active
    }

    pub fn emergency_context(&self) -> EmergencyContext {
        EmergencyContext::new(&self.config.arbitration.emergency, self.state.emergency_calling)
    }

    pub fn log(&self) -> &LogStream {
        &self.log
    }

    pub fn notifier_stats(&self) -> NotifierStats {
        self.notifier.stats()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            driver_state: self.tracker.state(),
            mode: self.state.mode,
            speed: self.speed_kmh,
            target_speed: self.state.target_speed_kmh,
            urgency: self.state.urgency,
            hazards_active: self.state.hazards_active,
            is_braking: self.speed_kmh > self.state.target_speed_kmh,
            emergency_context: self.emergency_context(),
            banner: banner(self.state.mode, self.state.urgency),
            metrics: self.latest_sample,
            log_entries: self.log.to_vec(),
        }
    }

    #[cfg(test)]
    pub(crate) fn force_speed(&mut self, speed_kmh: f64) {
        self.speed_kmh = speed_kmh;
    }
}
