//! Event records delivered to a machine.
//!
//! Events are immutable once created. The `with_*` and `renamed` methods
//! return derived copies, leaving the original untouched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

/// Prefix of the completion events a region or submachine engine posts to
/// its owner when it finishes on its own loop.
pub const COMPLETION_PREFIX: &str = "done.state.";

/// Metadata key naming the timeout state that armed a timer.
pub const TIMEOUT_SOURCE_KEY: &str = "timeout.source";

/// Relative urgency of an event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EventPriority {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

/// A named occurrence, optionally carrying a JSON payload.
///
/// # Example
///
/// ```rust
/// use statecraft::{Event, EventPriority};
/// use serde_json::json;
///
/// let event = Event::new("ORDER_PLACED")
///     .with_payload(json!({ "id": 42 }))
///     .with_priority(EventPriority::High);
///
/// assert_eq!(event.name(), "ORDER_PLACED");
/// assert_eq!(event.payload().unwrap()["id"], 42);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    id: Uuid,
    name: String,
    payload: Option<Value>,
    timestamp: DateTime<Utc>,
    priority: EventPriority,
    metadata: HashMap<String, String>,
}

impl Event {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            payload: None,
            timestamp: Utc::now(),
            priority: EventPriority::Normal,
            metadata: HashMap::new(),
        }
    }

    /// Completion notice for the state at `path`.
    pub(crate) fn completion(path: &str) -> Self {
        Self::new(format!("{COMPLETION_PREFIX}{path}")).with_priority(EventPriority::High)
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_priority(mut self, priority: EventPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Copy of this event under another name, with a fresh id and timestamp.
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            payload: self.payload.clone(),
            timestamp: Utc::now(),
            priority: self.priority,
            metadata: self.metadata.clone(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn payload(&self) -> Option<&Value> {
        self.payload.as_ref()
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn priority(&self) -> EventPriority {
        self.priority
    }

    pub fn metadata(&self) -> &HashMap<String, String> {
        &self.metadata
    }

    pub fn meta(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    /// True for the completion notices engines post to their owner.
    pub fn is_completion(&self) -> bool {
        self.name.starts_with(COMPLETION_PREFIX)
    }
}

impl From<&str> for Event {
    fn from(name: &str) -> Self {
        Event::new(name)
    }
}

impl From<String> for Event {
    fn from(name: String) -> Self {
        Event::new(name)
    }
}
