//! Alerting System
//!
//! Notification sinks (speech, vibration) driven by the takeover core, and a
//! decorator that suppresses repeated utterances and swallows sink failures.

mod manager;
mod sink;

pub use manager::{DedupNotifier, NotifierStats};
pub use sink::{NotificationSink, NullSink, RecordingSink, SinkCall, TracingSink};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Notification sink errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotificationError {
    #[error("Notification channel unavailable: {0}")]
    Unavailable(String),

    #[error("Notification rejected: {0}")]
    Rejected(String),
}

/// What an utterance is about; part of the deduplication key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationCategory {
    EmergencyTakeover,
    DistractionWarning,
    Status,
}

impl NotificationCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EmergencyTakeover => "emergency_takeover",
            Self::DistractionWarning => "distraction_warning",
            Self::Status => "status",
        }
    }
}

/// Haptic pattern, alternating on/off durations in milliseconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VibrationPattern(pub Vec<u32>);

impl VibrationPattern {
    /// Strong pattern for immediate takeover requests
    pub fn strong() -> Self {
        Self(vec![200, 100, 200])
    }

    /// Single short pulse
    pub fn pulse() -> Self {
        Self(vec![100])
    }

    /// Total duration of the pattern
    pub fn total_ms(&self) -> u32 {
        self.0.iter().sum()
    }
}
