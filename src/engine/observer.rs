//! Notification contract for logging, metrics and validation collaborators.

use crate::core::{Event, MachineError};

/// Receives engine notifications.
///
/// Methods are called synchronously, in registration order, from the
/// thread processing the event. Implementations must not block for long and
/// must not change the machine's topology. Every method defaults to a
/// no-op, so observers implement only what they need.
///
/// State arguments are dotted paths (`"Door.Open"`).
pub trait Observer: Send + Sync {
    fn on_state_enter(&self, _machine: &str, _state: &str) {}

    fn on_state_exit(&self, _machine: &str, _state: &str) {}

    fn on_transition(&self, _machine: &str, _from: &str, _to: &str, _event: &str) {}

    /// Called once per event that was not deferred, after any transition
    /// it triggered.
    fn on_event_processed(&self, _machine: &str, _event: &Event) {}

    fn on_error(&self, _machine: &str, _error: &MachineError) {}
}
