//! Engine configuration.

use serde::{Deserialize, Serialize};

/// Tunables for one engine instance.
///
/// Missing fields take their defaults when deserialized, so a host can load
/// a partial configuration:
///
/// ```rust
/// use statecraft::MachineConfig;
///
/// let config: MachineConfig = serde_json::from_str(r#"{ "queue_capacity": 8 }"#).unwrap();
/// assert_eq!(config.queue_capacity, 8);
/// assert_eq!(config.max_continuations, 32);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineConfig {
    /// Bound of the event queue; `send_event` fails fast once it is full.
    pub queue_capacity: usize,
    /// Maximum number of chained pseudostate hops (choice, history, entry
    /// and exit points) a single transition may take.
    pub max_continuations: usize,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 100,
            max_continuations: 32,
        }
    }
}

impl MachineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_max_continuations(mut self, limit: usize) -> Self {
        self.max_continuations = limit;
        self
    }
}
