//! Stock observers.

use crate::core::sync::lock;
use crate::core::{Event, MachineError};
use crate::engine::Observer;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Forwards every notification to `tracing` at `info` (errors at `error`).
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl TracingObserver {
    pub fn new() -> Self {
        Self
    }
}

impl Observer for TracingObserver {
    fn on_state_enter(&self, machine: &str, state: &str) {
        tracing::info!(machine = %machine, state = %state, "state entered");
    }

    fn on_state_exit(&self, machine: &str, state: &str) {
        tracing::info!(machine = %machine, state = %state, "state exited");
    }

    fn on_transition(&self, machine: &str, from: &str, to: &str, event: &str) {
        tracing::info!(machine = %machine, from = %from, to = %to, event = %event, "transition");
    }

    fn on_event_processed(&self, machine: &str, event: &Event) {
        tracing::info!(machine = %machine, event = %event.name(), id = %event.id(), "event processed");
    }

    fn on_error(&self, machine: &str, error: &MachineError) {
        tracing::error!(machine = %machine, error = %error, "machine error");
    }
}

/// A transition as seen by [`CountingObserver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedTransition {
    pub from: String,
    pub to: String,
    pub event: String,
}

/// Counts notifications and keeps the transitions, processed event names
/// and errors it saw, in order. Useful for metrics and for tests.
#[derive(Debug, Default)]
pub struct CountingObserver {
    entered: AtomicUsize,
    exited: AtomicUsize,
    transitions: Mutex<Vec<ObservedTransition>>,
    events: Mutex<Vec<String>>,
    errors: Mutex<Vec<MachineError>>,
}

impl CountingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entered(&self) -> usize {
        self.entered.load(Ordering::SeqCst)
    }

    pub fn exited(&self) -> usize {
        self.exited.load(Ordering::SeqCst)
    }

    pub fn transition_count(&self) -> usize {
        lock(&self.transitions).len()
    }

    pub fn transitions(&self) -> Vec<ObservedTransition> {
        lock(&self.transitions).clone()
    }

    pub fn event_count(&self) -> usize {
        lock(&self.events).len()
    }

    /// Names of processed events, in processing order.
    pub fn events(&self) -> Vec<String> {
        lock(&self.events).clone()
    }

    pub fn error_count(&self) -> usize {
        lock(&self.errors).len()
    }

    pub fn errors(&self) -> Vec<MachineError> {
        lock(&self.errors).clone()
    }

    pub fn clear(&self) {
        self.entered.store(0, Ordering::SeqCst);
        self.exited.store(0, Ordering::SeqCst);
        lock(&self.transitions).clear();
        lock(&self.events).clear();
        lock(&self.errors).clear();
    }
}

impl Observer for CountingObserver {
    fn on_state_enter(&self, _machine: &str, _state: &str) {
        self.entered.fetch_add(1, Ordering::SeqCst);
    }

    fn on_state_exit(&self, _machine: &str, _state: &str) {
        self.exited.fetch_add(1, Ordering::SeqCst);
    }

    fn on_transition(&self, _machine: &str, from: &str, to: &str, event: &str) {
        lock(&self.transitions).push(ObservedTransition {
            from: from.to_string(),
            to: to.to_string(),
            event: event.to_string(),
        });
    }

    fn on_event_processed(&self, _machine: &str, event: &Event) {
        lock(&self.events).push(event.name().to_string());
    }

    fn on_error(&self, _machine: &str, error: &MachineError) {
        lock(&self.errors).push(error.clone());
    }
}
