//! Deferring states.

use crate::core::Event;
use std::collections::BTreeSet;

/// Payload of a state that postpones matching events.
///
/// While a defer state is part of the active chain, events it matches are
/// buffered by the engine instead of being dispatched. They are replayed in
/// arrival order once a transition commits and they no longer match.
#[derive(Clone, Debug, Default)]
pub struct DeferState {
    names: BTreeSet<String>,
    prefixes: Vec<String>,
}

impl DeferState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defer every event in `names`.
    pub fn events<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
            prefixes: Vec::new(),
        }
    }

    pub fn event(mut self, name: impl Into<String>) -> Self {
        self.names.insert(name.into());
        self
    }

    /// Defer every event whose name starts with `prefix`.
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefixes.push(prefix.into());
        self
    }

    pub fn defers(&self, event: &Event) -> bool {
        if event.is_completion() {
            return false;
        }
        self.names.contains(event.name())
            || self.prefixes.iter().any(|p| event.name().starts_with(p))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}
