//! Metrics sources
//!
//! A source produces [`DriverMetricsSample`]s at its own cadence. Real
//! camera-backed sources live outside this crate; what is here is the
//! simulated fallback, a scripted replay for scenarios, and the wrapper that
//! switches to simulation when the primary source reports it is unavailable.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{info, warn};

use crate::sample::{DriverMetricsSample, HeadPose};
use crate::state::DriverState;
use crate::DmsError;

/// Period between simulated eye/face events (ms)
pub const SIMULATED_EVENT_PERIOD_MS: i64 = 4500;

/// Producer of driver attentiveness samples
pub trait MetricsSource: Send {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Produce the sample for `now_ms`. `driver_state` is the last published
    /// state, which some sources use to shape the readiness score.
    fn next_sample(
        &mut self,
        now_ms: i64,
        driver_state: DriverState,
    ) -> Result<DriverMetricsSample, DmsError>;
}

/// Randomized driver simulation
pub struct SimulatedSource {
    rng: StdRng,
    eyes_open: bool,
    face_detected: bool,
    next_event_ms: Option<i64>,
}

impl SimulatedSource {
    /// Create a simulation; a seed makes the event sequence reproducible
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng,
            eyes_open: true,
            face_detected: true,
            next_event_ms: None,
        }
    }

    fn roll_event(&mut self) {
        let r: f64 = self.rng.gen();

        if r > 0.95 {
            self.eyes_open = false;
        } else if r > 0.85 {
            self.eyes_open = true;
        }

        if r < 0.03 {
            self.face_detected = false;
        } else if r > 0.08 {
            self.face_detected = true;
        }
    }

    fn readiness(&mut self, driver_state: DriverState) -> f64 {
        match driver_state {
            DriverState::Alert => 99.0 - self.rng.gen_range(0.0..5.0),
            DriverState::Distracted => 40.0 + self.rng.gen_range(0.0..10.0),
            DriverState::Drowsy => 15.0 + self.rng.gen_range(0.0..5.0),
            DriverState::Unresponsive => 5.0,
        }
    }
}

impl MetricsSource for SimulatedSource {
    fn name(&self) -> &str {
        "simulated"
    }

    fn next_sample(
        &mut self,
        now_ms: i64,
        driver_state: DriverState,
    ) -> Result<DriverMetricsSample, DmsError> {
        let due = *self
            .next_event_ms
            .get_or_insert(now_ms + SIMULATED_EVENT_PERIOD_MS);
        if now_ms >= due {
            self.roll_event();
            self.next_event_ms = Some(now_ms + SIMULATED_EVENT_PERIOD_MS);
        }

        Ok(DriverMetricsSample {
            eyes_open: self.eyes_open,
            face_detected: self.face_detected,
            head_pose: HeadPose::Forward,
            blink_duration_seconds: 0.12,
            readiness_score: self.readiness(driver_state),
        })
    }
}

/// Replays fixed segments of samples, then holds the last one
pub struct ScriptedSource {
    segments: Vec<(i64, DriverMetricsSample)>,
    started_ms: Option<i64>,
}

impl ScriptedSource {
    /// Each segment is `(duration_ms, sample)`
    pub fn new(segments: Vec<(i64, DriverMetricsSample)>) -> Self {
        Self {
            segments,
            started_ms: None,
        }
    }
}

impl MetricsSource for ScriptedSource {
    fn name(&self) -> &str {
        "scripted"
    }

    fn next_sample(
        &mut self,
        now_ms: i64,
        _driver_state: DriverState,
    ) -> Result<DriverMetricsSample, DmsError> {
        let started = *self.started_ms.get_or_insert(now_ms);
        let elapsed = now_ms - started;

        let mut boundary = 0;
        for (duration_ms, sample) in &self.segments {
            boundary += duration_ms;
            if elapsed < boundary {
                return Ok(*sample);
            }
        }

        self.segments
            .last()
            .map(|(_, sample)| *sample)
            .ok_or_else(|| DmsError::SensorUnavailable("empty script".to_string()))
    }
}

/// Uses `primary` until it reports [`DmsError::SensorUnavailable`], then
/// switches to a [`SimulatedSource`] for the rest of the session
pub struct FallbackSource<P> {
    primary: P,
    fallback: SimulatedSource,
    degraded: bool,
    face_in_frame: bool,
}

impl<P: MetricsSource> FallbackSource<P> {
    pub fn new(primary: P, seed: Option<u64>) -> Self {
        Self {
            primary,
            fallback: SimulatedSource::new(seed),
            degraded: false,
            face_in_frame: true,
        }
    }

    /// Whether the simulated fallback is in use
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Records face presence; true only when it differs from the last sample
    fn track_face(&mut self, face_detected: bool) -> bool {
        let changed = face_detected != self.face_in_frame;
        self.face_in_frame = face_detected;
        changed
    }
}

impl<P: MetricsSource> MetricsSource for FallbackSource<P> {
    fn name(&self) -> &str {
        if self.degraded {
            self.fallback.name()
        } else {
            self.primary.name()
        }
    }

    fn next_sample(
        &mut self,
        now_ms: i64,
        driver_state: DriverState,
    ) -> Result<DriverMetricsSample, DmsError> {
        if !self.degraded {
            match self.primary.next_sample(now_ms, driver_state) {
                Ok(sample) => return Ok(sample),
                Err(DmsError::SensorUnavailable(reason)) => {
                    warn!(
                        "Metrics source '{}' unavailable ({}), running in simulation mode",
                        self.primary.name(),
                        reason
                    );
                    self.degraded = true;
                }
                Err(e) => return Err(e),
            }
        }

        let sample = self.fallback.next_sample(now_ms, driver_state)?;
        if self.track_face(sample.face_detected) {
            if sample.face_detected {
                info!("Simulated driver back in frame");
            } else {
                info!("Simulated driver left the frame");
            }
        }
        Ok(sample)
    }
}
