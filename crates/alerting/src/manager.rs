//! Notification Deduplication

use tracing::{debug, warn};

use crate::{NotificationCategory, NotificationSink, VibrationPattern};

/// Delivery counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NotifierStats {
    pub spoken: usize,
    pub suppressed: usize,
    pub vibrations: usize,
    pub failures: usize,
}

/// Decorator around a [`NotificationSink`]:
/// - an utterance is dropped when its (category, normalized text) equals the
///   immediately preceding one
/// - sink errors are logged and swallowed
pub struct DedupNotifier<S> {
    sink: S,
    last: Option<(NotificationCategory, String)>,
    stats: NotifierStats,
}

impl<S: NotificationSink> DedupNotifier<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            last: None,
            stats: NotifierStats::default(),
        }
    }

    /// Speak `text` unless it repeats the previous utterance.
    /// Returns whether the sink was called.
    pub fn speak(&mut self, category: NotificationCategory, text: &str) -> bool {
        let key = (category, normalize(text));
        if self.last.as_ref() == Some(&key) {
            debug!("Utterance suppressed ({}): {}", category.as_str(), text);
            self.stats.suppressed += 1;
            return false;
        }

        // A failed utterance counts as the last one and is not retried
        self.last = Some(key);

        match self.sink.speak(text) {
            Ok(()) => {
                self.stats.spoken += 1;
            }
            Err(e) => {
                warn!("Speech notification dropped: {}", e);
                self.stats.failures += 1;
            }
        }
        true
    }

    /// Vibrate with `pattern`; failures are swallowed
    pub fn vibrate(&mut self, pattern: &VibrationPattern) {
        match self.sink.vibrate(pattern) {
            Ok(()) => self.stats.vibrations += 1,
            Err(e) => {
                warn!("Vibration dropped: {}", e);
                self.stats.failures += 1;
            }
        }
    }

    /// Forget the last utterance so the next one is always spoken
    pub fn reset(&mut self) {
        self.last = None;
    }

    pub fn stats(&self) -> NotifierStats {
        self.stats
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}

fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_end_matches(['.', '!'])
        .to_lowercase()
}
