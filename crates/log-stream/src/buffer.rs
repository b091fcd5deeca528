//! Fixed-capacity log buffer

use crate::{LogEntry, LogSeverity};
use chrono::Utc;
use std::collections::VecDeque;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Default capacity (20 entries)
pub const DEFAULT_CAPACITY: usize = 20;

/// Newest-first log with FIFO eviction
#[derive(Debug, Clone)]
pub struct LogStream {
    /// Front is the newest entry
    entries: VecDeque<LogEntry>,
    /// Maximum number of retained entries
    capacity: usize,
    /// Total entries appended (for statistics)
    total_appended: usize,
}

impl LogStream {
    /// Create a new log stream with given capacity (at least 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            total_appended: 0,
        }
    }

    /// Create a stream with default capacity (20 entries)
    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }

    /// Append a message stamped with the current wall-clock time
    pub fn append(&mut self, message: impl Into<String>, severity: LogSeverity) -> &LogEntry {
        self.append_at(Utc::now().timestamp_millis(), message, severity)
    }

    /// Append a message with an explicit timestamp
    pub fn append_at(
        &mut self,
        timestamp_millis: i64,
        message: impl Into<String>,
        severity: LogSeverity,
    ) -> &LogEntry {
        let message = message.into();
        match severity {
            LogSeverity::Info => info!(target: "decision_log", "{}", message),
            LogSeverity::Warning => warn!(target: "decision_log", "{}", message),
            LogSeverity::Critical => error!(target: "decision_log", "{}", message),
        }

        if self.entries.len() >= self.capacity {
            self.entries.pop_back();
        }

        self.entries.push_front(LogEntry {
            id: Uuid::new_v4(),
            timestamp_millis,
            message,
            severity,
        });
        self.total_appended += 1;

        &self.entries[0]
    }

    /// Iterate entries, newest first
    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    /// Most recent entry
    pub fn latest(&self) -> Option<&LogEntry> {
        self.entries.front()
    }

    /// Copy of up to `limit` entries, newest first
    pub fn read_last(&self, limit: usize) -> Vec<LogEntry> {
        self.entries.iter().take(limit).cloned().collect()
    }

    /// Copy of all entries, newest first
    pub fn to_vec(&self) -> Vec<LogEntry> {
        self.entries.iter().cloned().collect()
    }

    /// Number of entries with the given severity
    pub fn count_severity(&self, severity: LogSeverity) -> usize {
        self.entries.iter().filter(|e| e.severity == severity).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total entries appended, including evicted ones
    pub fn total_appended(&self) -> usize {
        self.total_appended
    }
}

impl Default for LogStream {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}
