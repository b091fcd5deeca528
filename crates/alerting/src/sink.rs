//! Notification sinks

use std::sync::{Arc, Mutex};
use tracing::info;

use crate::{NotificationError, VibrationPattern};

/// Speech / haptic output. Calls are fire-and-forget from the core's side.
pub trait NotificationSink: Send {
    fn speak(&mut self, text: &str) -> Result<(), NotificationError>;

    fn vibrate(&mut self, pattern: &VibrationPattern) -> Result<(), NotificationError>;
}

impl<S: NotificationSink + ?Sized> NotificationSink for Box<S> {
    fn speak(&mut self, text: &str) -> Result<(), NotificationError> {
        (**self).speak(text)
    }

    fn vibrate(&mut self, pattern: &VibrationPattern) -> Result<(), NotificationError> {
        (**self).vibrate(pattern)
    }
}

/// Sink that renders notifications into the tracing output
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn speak(&mut self, text: &str) -> Result<(), NotificationError> {
        info!(target: "voice", "\u{1f50a} {}", text);
        Ok(())
    }

    fn vibrate(&mut self, pattern: &VibrationPattern) -> Result<(), NotificationError> {
        info!(target: "haptics", "vibrate {:?} ({}ms)", pattern.0, pattern.total_ms());
        Ok(())
    }
}

/// Sink with no output device
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl NotificationSink for NullSink {
    fn speak(&mut self, _text: &str) -> Result<(), NotificationError> {
        Err(NotificationError::Unavailable("speech synthesis".to_string()))
    }

    fn vibrate(&mut self, _pattern: &VibrationPattern) -> Result<(), NotificationError> {
        Err(NotificationError::Unavailable("vibration".to_string()))
    }
}

/// A call that reached a [`RecordingSink`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkCall {
    Speak(String),
    Vibrate(VibrationPattern),
}

/// Sink that records every call; clones share the same record
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    calls: Arc<Mutex<Vec<SinkCall>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded calls, oldest first
    pub fn calls(&self) -> Vec<SinkCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Recorded utterances, oldest first
    pub fn spoken(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                SinkCall::Speak(text) => Some(text),
                SinkCall::Vibrate(_) => None,
            })
            .collect()
    }

    /// Recorded vibration patterns, oldest first
    pub fn vibrations(&self) -> Vec<VibrationPattern> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                SinkCall::Vibrate(pattern) => Some(pattern),
                SinkCall::Speak(_) => None,
            })
            .collect()
    }

    fn record(&self, call: SinkCall) -> Result<(), NotificationError> {
        self.calls
            .lock()
            .map(|mut calls| calls.push(call))
            .map_err(|e| NotificationError::Rejected(format!("Lock error: {}", e)))
    }
}

impl NotificationSink for RecordingSink {
    fn speak(&mut self, text: &str) -> Result<(), NotificationError> {
        self.record(SinkCall::Speak(text.to_string()))
    }

    fn vibrate(&mut self, pattern: &VibrationPattern) -> Result<(), NotificationError> {
        self.record(SinkCall::Vibrate(pattern.clone()))
    }
}
