//! Record of committed transitions.
//!
//! Every transition an engine commits is appended to its journal. The
//! journal is diagnostic only: it is never replayed or persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A single committed transition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord {
    /// Path of the state the transition left
    pub from: String,
    /// Path of the state the transition settled in
    pub to: String,
    /// Name of the triggering event
    pub event: String,
    /// When the transition committed
    pub timestamp: DateTime<Utc>,
}

/// Ordered list of committed transitions.
///
/// # Example
///
/// ```rust
/// use statecraft::{TransitionLog, TransitionRecord};
/// use chrono::Utc;
///
/// let mut log = TransitionLog::new();
/// log.record(TransitionRecord {
///     from: "Idle".into(),
///     to: "Busy".into(),
///     event: "START".into(),
///     timestamp: Utc::now(),
/// });
/// assert_eq!(log.path(), vec!["Idle", "Busy"]);
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TransitionLog {
    records: Vec<TransitionRecord>,
}

impl TransitionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, record: TransitionRecord) {
        self.records.push(record);
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// States traversed: the first source, then every destination.
    pub fn path(&self) -> Vec<&str> {
        let mut path = Vec::with_capacity(self.records.len() + 1);
        if let Some(first) = self.records.first() {
            path.push(first.from.as_str());
        }
        path.extend(self.records.iter().map(|r| r.to.as_str()));
        path
    }

    /// Time between the first and last record.
    pub fn duration(&self) -> Option<Duration> {
        let first = self.records.first()?;
        let last = self.records.last()?;
        last.timestamp
            .signed_duration_since(first.timestamp)
            .to_std()
            .ok()
    }

    pub fn records(&self) -> &[TransitionRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Transitions triggered by `event`.
    pub fn by_event<'a>(&'a self, event: &'a str) -> impl Iterator<Item = &'a TransitionRecord> {
        self.records.iter().filter(move |r| r.event == event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(from: &str, to: &str, event: &str) -> TransitionRecord {
        TransitionRecord {
            from: from.into(),
            to: to.into(),
            event: event.into(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn new_log_is_empty() {
        let log = TransitionLog::new();
        assert!(log.is_empty());
        assert!(log.path().is_empty());
        assert!(log.duration().is_none());
    }

    #[test]
    fn path_follows_records() {
        let mut log = TransitionLog::new();
        log.record(record("A", "B", "next"));
        log.record(record("B", "C", "next"));
        assert_eq!(log.path(), vec!["A", "B", "C"]);
        assert_eq!(log.by_event("next").count(), 2);
    }

    #[test]
    fn duration_spans_first_to_last() {
        let mut log = TransitionLog::new();
        let start = Utc::now();
        log.record(TransitionRecord {
            timestamp: start,
            ..record("A", "B", "go")
        });
        log.record(TransitionRecord {
            timestamp: start + chrono::Duration::milliseconds(25),
            ..record("B", "C", "go")
        });
        assert_eq!(log.duration(), Some(Duration::from_millis(25)));
    }

    #[test]
    fn log_serializes_correctly() {
        let mut log = TransitionLog::new();
        log.record(record("A", "B", "go"));
        let json = serde_json::to_string(&log).unwrap();
        let back: TransitionLog = serde_json::from_str(&json).unwrap();
        assert_eq!(back.records(), log.records());
    }
}
