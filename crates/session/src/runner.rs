//! Session loops
//!
//! The [`Session`] sits behind one async mutex; each loop takes the lock for
//! exactly one tick, so ticks from different loops never interleave. A
//! snapshot is published on a watch channel whenever a tick changed it.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dms::{DriverMetricsSample, MetricsSource};
use log_stream::{LogEntry, LogSeverity};
use takeover::AutonomyMode;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::session::{Session, SessionSnapshot};
use crate::SessionError;

/// Wall-clock milliseconds derived from the tokio clock, so paused-time
/// tests advance it too
#[derive(Debug, Clone, Copy)]
pub struct SessionClock {
    epoch_ms: i64,
    origin: Instant,
}

impl SessionClock {
    pub fn start() -> Self {
        Self {
            epoch_ms: Utc::now().timestamp_millis(),
            origin: Instant::now(),
        }
    }

    pub fn now_ms(&self) -> i64 {
        self.epoch_ms + self.origin.elapsed().as_millis() as i64
    }
}

/// Shared access to a running session
#[derive(Clone)]
pub struct SessionHandle {
    session: Arc<Mutex<Session>>,
    publisher: Arc<watch::Sender<SessionSnapshot>>,
    clock: SessionClock,
}

impl SessionHandle {
    /// Replace the latest metrics sample
    pub async fn submit_metrics_sample(&self, sample: DriverMetricsSample) {
        let mut session = self.session.lock().await;
        session.submit_metrics_sample(sample);
        publish(&self.publisher, &session);
    }

    /// Explicit external mode request
    pub async fn request_mode(&self, requested: AutonomyMode) -> Result<SessionSnapshot, SessionError> {
        let mut session = self.session.lock().await;
        let result = session.request_mode(requested, self.clock.now_ms());
        publish(&self.publisher, &session);
        result.map(|_| session.snapshot())
    }

    /// Last published snapshot
    pub fn snapshot(&self) -> SessionSnapshot {
        self.publisher.borrow().clone()
    }

    /// Receiver notified on every published change
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.publisher.subscribe()
    }

    /// Log entries from the last snapshot, newest first
    pub fn logs(&self, limit: usize, severity: Option<LogSeverity>) -> Vec<LogEntry> {
        self.publisher
            .borrow()
            .log_entries
            .iter()
            .filter(|e| severity.map_or(true, |s| e.severity == s))
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn clock(&self) -> SessionClock {
        self.clock
    }
}

/// Spawns the session loops
pub struct SessionRunner;

impl SessionRunner {
    /// Start the decision and speed loops, plus the sampling loop when a
    /// source is given
    pub fn spawn(
        session: Session,
        source: Option<Box<dyn MetricsSource>>,
        clock: SessionClock,
    ) -> RunningSession {
        let config = session.config().clone();
        let (publisher, _) = watch::channel(session.snapshot());
        let handle = SessionHandle {
            session: Arc::new(Mutex::new(session)),
            publisher: Arc::new(publisher),
            clock,
        };
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut tasks = vec![
            spawn_loop(
                "decision",
                Duration::from_millis(config.decision_tick_ms),
                handle.clone(),
                shutdown_rx.clone(),
                |session, now_ms| {
                    session.decision_tick(now_ms);
                },
            ),
            spawn_loop(
                "speed",
                Duration::from_millis(config.speed_tick_ms),
                handle.clone(),
                shutdown_rx.clone(),
                |session, now_ms| {
                    session.speed_tick(now_ms);
                },
            ),
        ];

        if let Some(source) = source {
            tasks.push(spawn_sampler(
                Duration::from_millis(config.sample_period_ms),
                source,
                handle.clone(),
                shutdown_rx,
            ));
        }

        info!("Session loops started ({} tasks)", tasks.len());

        RunningSession {
            handle,
            shutdown: shutdown_tx,
            tasks,
        }
    }
}

/// A session with its loops running
pub struct RunningSession {
    handle: SessionHandle,
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl RunningSession {
    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    /// Signal every loop and wait for it to exit. No tick runs after this returns.
    pub async fn stop(self) {
        info!("Stopping session loops");
        let _ = self.shutdown.send(true);
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!("Session loop ended abnormally: {}", e);
            }
        }
        info!("Session loops stopped");
    }
}

fn spawn_loop<F>(
    name: &'static str,
    period: Duration,
    handle: SessionHandle,
    mut shutdown: watch::Receiver<bool>,
    tick: F,
) -> JoinHandle<()>
where
    F: Fn(&mut Session, i64) + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        debug!("{} loop running every {:?}", name, period);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {
                    let mut session = handle.session.lock().await;
                    tick(&mut *session, handle.clock.now_ms());
                    publish(&handle.publisher, &session);
                }
            }
        }

        debug!("{} loop stopped", name);
    })
}

fn spawn_sampler(
    period: Duration,
    mut source: Box<dyn MetricsSource>,
    handle: SessionHandle,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("Sampling '{}' every {:?}", source.name(), period);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {
                    let mut session = handle.session.lock().await;
                    match source.next_sample(handle.clock.now_ms(), session.driver_state()) {
                        Ok(sample) => {
                            session.submit_metrics_sample(sample);
                            publish(&handle.publisher, &session);
                        }
                        Err(e) => warn!("Metrics source '{}' produced no sample: {}", source.name(), e),
                    }
                }
            }
        }

        debug!("sampling loop stopped");
    })
}

fn publish(publisher: &watch::Sender<SessionSnapshot>, session: &Session) {
    let snapshot = session.snapshot();
    publisher.send_if_modified(|current| {
        if *current == snapshot {
            false
        } else {
            *current = snapshot;
            true
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use alerting::RecordingSink;
    use dms::{DriverState, ScriptedSource};

    fn start(source: Option<Box<dyn MetricsSource>>) -> (RunningSession, RecordingSink) {
        let sink = RecordingSink::new();
        let clock = SessionClock::start();
        let session = Session::new(SessionConfig::default(), Box::new(sink.clone()), clock.now_ms());
        (SessionRunner::spawn(session, source, clock), sink)
    }

    #[tokio::test(start_paused = true)]
    async fn test_face_loss_reaches_emergency_through_loops() {
        let script = ScriptedSource::new(vec![(60_000, DriverMetricsSample::face_lost())]);
        let (running, sink) = start(Some(Box::new(script)));
        let handle = running.handle();

        tokio::time::sleep(Duration::from_millis(4500)).await;
        let snapshot = handle.snapshot();
        assert_eq!(snapshot.mode, AutonomyMode::EmergencyControl);
        assert_eq!(snapshot.driver_state, DriverState::Unresponsive);
        assert!(snapshot.hazards_active);
        assert!(snapshot.emergency_context.is_calling);
        assert!(snapshot.speed < 80.0);
        assert_eq!(handle.logs(20, Some(LogSeverity::Critical)).len(), 1);
        assert_eq!(sink.spoken().len(), 1);

        running.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_tick_after_stop() {
        let (running, _sink) = start(None);
        let handle = running.handle();
        handle.submit_metrics_sample(DriverMetricsSample::face_lost()).await;

        tokio::time::sleep(Duration::from_millis(1000)).await;
        running.stop().await;

        let frozen = handle.session.lock().await.snapshot();
        tokio::time::sleep(Duration::from_millis(10_000)).await;
        let later = handle.session.lock().await.snapshot();
        assert_eq!(frozen, later);
        assert_eq!(later.mode, AutonomyMode::Manual);
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribers_see_changes() {
        let (running, _sink) = start(None);
        let handle = running.handle();
        let mut rx = handle.subscribe();

        handle
            .submit_metrics_sample(DriverMetricsSample::looking(dms::HeadPose::Right))
            .await;
        tokio::time::sleep(Duration::from_millis(700)).await;

        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().driver_state, DriverState::Distracted);

        running.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_steady_session_publishes_nothing() {
        let (running, _sink) = start(None);
        let handle = running.handle();
        let mut rx = handle.subscribe();

        tokio::time::sleep(Duration::from_millis(1000)).await;
        let settled = rx.borrow_and_update().clone();
        assert_eq!(settled.driver_state, DriverState::Alert);
        assert_eq!(settled.speed, settled.target_speed);

        // Several decision and speed ticks with nothing to report
        tokio::time::sleep(Duration::from_millis(3000)).await;
        assert!(!rx.has_changed().unwrap());
        assert_eq!(handle.snapshot(), settled);

        running.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_mode_request_through_handle() {
        let (running, _sink) = start(None);
        let handle = running.handle();

        let snapshot = handle.request_mode(AutonomyMode::Autonomous).await.unwrap();
        assert_eq!(snapshot.mode, AutonomyMode::Autonomous);
        assert!(handle.request_mode(AutonomyMode::EmergencyControl).await.is_err());
        assert_eq!(handle.snapshot().mode, AutonomyMode::Autonomous);

        running.stop().await;
    }
}
