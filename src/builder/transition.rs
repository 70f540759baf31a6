//! Builder for constructing transitions.

use crate::builder::error::BuildError;
use crate::core::{Action, ActionResult, Context, Guard};
use crate::engine::Transition;
use std::sync::Arc;

/// Builder for constructing transitions with a fluent API.
#[derive(Default)]
pub struct TransitionBuilder {
    from: Option<String>,
    to: Option<String>,
    event: Option<String>,
    guard: Option<Guard>,
    action: Option<Action>,
    priority: i32,
}

impl TransitionBuilder {
    /// Create a new transition builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the source state path (required).
    pub fn from(mut self, state: impl Into<String>) -> Self {
        self.from = Some(state.into());
        self
    }

    /// Set the target state path (required).
    pub fn to(mut self, state: impl Into<String>) -> Self {
        self.to = Some(state.into());
        self
    }

    /// Set the triggering event name (required).
    pub fn on(mut self, event: impl Into<String>) -> Self {
        self.event = Some(event.into());
        self
    }

    /// Add a guard (optional).
    pub fn guard(mut self, guard: Guard) -> Self {
        self.guard = Some(guard);
        self
    }

    /// Add a guard using a closure (optional).
    pub fn when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Context) -> bool + Send + Sync + 'static,
    {
        self.guard = Some(Guard::new(predicate));
        self
    }

    /// Set the transition action (optional).
    pub fn action<F>(mut self, f: F) -> Self
    where
        F: Fn(&Context) -> ActionResult + Send + Sync + 'static,
    {
        self.action = Some(Arc::new(f));
        self
    }

    /// Set the priority used to break ties (optional, default 0).
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Build the transition.
    pub fn build(self) -> Result<Transition, BuildError> {
        let from = self.from.ok_or(BuildError::MissingFromState)?;
        let to = self.to.ok_or(BuildError::MissingToState)?;
        let event = self.event.ok_or(BuildError::MissingEvent)?;

        let mut transition = Transition::new(from, to, event).with_priority(self.priority);
        if let Some(guard) = self.guard {
            transition = transition.with_guard(guard);
        }
        if let Some(action) = self.action {
            transition = transition.with_action(action);
        }
        Ok(transition)
    }
}
