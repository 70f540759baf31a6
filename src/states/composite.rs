//! Composite (nested) states.

use crate::core::{Context, State};
use crate::engine::Transition;

/// Payload of a composite state: its children, the initial child, and
/// transitions local to the composite.
///
/// Local transitions name children by their local name (`"A"`) or their
/// full path (`"Parent.A"`). They are consulted before the event is
/// delegated to the active child and resolve by first match in
/// declaration order; priorities are ignored at this level.
///
/// Attaching a [`State::history`] child makes entry restore the previously
/// active child instead of the declared initial one.
#[derive(Default)]
pub struct CompositeState {
    pub(crate) children: Vec<State>,
    pub(crate) initial: Option<String>,
    pub(crate) transitions: Vec<Transition>,
}

impl CompositeState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn child(mut self, state: State) -> Self {
        self.children.push(state);
        self
    }

    pub fn initial(mut self, name: impl Into<String>) -> Self {
        self.initial = Some(name.into());
        self
    }

    pub fn transition(mut self, transition: Transition) -> Self {
        self.transitions.push(transition);
        self
    }

    /// Declared children. Empty once the composite has been added to a
    /// machine, which takes ownership of the children.
    pub fn children(&self) -> &[State] {
        &self.children
    }

    pub fn initial_name(&self) -> Option<&str> {
        self.initial.as_deref()
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    /// First enabled local transition leaving the child `name` (or `path`)
    /// on `event`.
    pub(crate) fn local_transition(
        &self,
        name: &str,
        path: &str,
        event: &str,
        ctx: &Context,
    ) -> Option<&Transition> {
        self.transitions.iter().find(|t| {
            (t.from() == name || t.from() == path) && t.triggers(event) && t.is_enabled(ctx)
        })
    }
}
