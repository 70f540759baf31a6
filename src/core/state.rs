//! State declarations.
//!
//! A [`State`] is a declaration: a name, a [`StateKind`] carrying the
//! variant-specific payload, and optional entry/exit actions and a
//! do-activity. Once added to a machine the declaration is flattened into
//! the machine's state arena, which owns the runtime flags (active, current
//! child, recorded history) and the non-owning parent links.

use super::action::{Action, ActionResult, Activity};
use super::context::Context;
use crate::states::{
    ChoiceState, CompositeState, DeferState, HistoryState, JunctionState, ParallelState,
    PointState, SubmachineState, TimeoutState,
};
use std::sync::Arc;

/// Variant payload of a state.
pub enum StateKind {
    /// Plain leaf state.
    Simple,
    /// Nested states, exactly one of which is active.
    Composite(CompositeState),
    /// Orthogonal regions, each driven by its own engine.
    Parallel(ParallelState),
    /// Dynamic guarded branch evaluated on entry.
    Choice(ChoiceState),
    /// Static guarded branch table resolved on request.
    Junction(JunctionState),
    /// Restores the previously active child of the enclosing composite.
    History(HistoryState),
    /// Leaf state that buffers matching events while active.
    Defer(DeferState),
    /// Leaf state that posts an event after a delay.
    Timeout(TimeoutState),
    /// Terminal state.
    Final,
    /// Redirects entry into a composite to a specific child.
    EntryPoint(PointState),
    /// Redirects a transition out of a composite to an outer state.
    ExitPoint(PointState),
    /// Wraps an independent nested machine.
    Submachine(SubmachineState),
}

impl StateKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Composite(_) => "composite",
            Self::Parallel(_) => "parallel",
            Self::Choice(_) => "choice",
            Self::Junction(_) => "junction",
            Self::History(_) => "history",
            Self::Defer(_) => "defer",
            Self::Timeout(_) => "timeout",
            Self::Final => "final",
            Self::EntryPoint(_) => "entry-point",
            Self::ExitPoint(_) => "exit-point",
            Self::Submachine(_) => "submachine",
        }
    }
}

impl std::fmt::Debug for StateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A state declaration.
///
/// # Example
///
/// ```rust
/// use statecraft::{CompositeState, State};
///
/// let door = State::composite(
///     "Door",
///     CompositeState::new()
///         .child(State::simple("Closed"))
///         .child(State::simple("Open"))
///         .initial("Closed"),
/// )
/// .on_entry(|ctx| {
///     ctx.set("door_seen", true);
///     Ok(())
/// });
///
/// assert!(door.is_composite());
/// assert_eq!(door.name(), "Door");
/// ```
pub struct State {
    pub(crate) name: String,
    pub(crate) kind: StateKind,
    pub(crate) on_entry: Option<Action>,
    pub(crate) on_exit: Option<Action>,
    pub(crate) activity: Option<Activity>,
}

impl State {
    pub fn new(name: impl Into<String>, kind: StateKind) -> Self {
        Self {
            name: name.into(),
            kind,
            on_entry: None,
            on_exit: None,
            activity: None,
        }
    }

    pub fn simple(name: impl Into<String>) -> Self {
        Self::new(name, StateKind::Simple)
    }

    pub fn composite(name: impl Into<String>, composite: CompositeState) -> Self {
        Self::new(name, StateKind::Composite(composite))
    }

    pub fn parallel(name: impl Into<String>, parallel: ParallelState) -> Self {
        Self::new(name, StateKind::Parallel(parallel))
    }

    pub fn choice(name: impl Into<String>, choice: ChoiceState) -> Self {
        Self::new(name, StateKind::Choice(choice))
    }

    pub fn junction(name: impl Into<String>, junction: JunctionState) -> Self {
        Self::new(name, StateKind::Junction(junction))
    }

    pub fn history(name: impl Into<String>, history: HistoryState) -> Self {
        Self::new(name, StateKind::History(history))
    }

    pub fn defer(name: impl Into<String>, defer: DeferState) -> Self {
        Self::new(name, StateKind::Defer(defer))
    }

    pub fn timeout(name: impl Into<String>, timeout: TimeoutState) -> Self {
        Self::new(name, StateKind::Timeout(timeout))
    }

    pub fn final_state(name: impl Into<String>) -> Self {
        Self::new(name, StateKind::Final)
    }

    pub fn entry_point(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(name, StateKind::EntryPoint(PointState::new(target)))
    }

    pub fn exit_point(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(name, StateKind::ExitPoint(PointState::new(target)))
    }

    pub fn submachine(name: impl Into<String>, submachine: SubmachineState) -> Self {
        Self::new(name, StateKind::Submachine(submachine))
    }

    pub fn on_entry<F>(mut self, f: F) -> Self
    where
        F: Fn(&Context) -> ActionResult + Send + Sync + 'static,
    {
        self.on_entry = Some(Arc::new(f));
        self
    }

    pub fn on_exit<F>(mut self, f: F) -> Self
    where
        F: Fn(&Context) -> ActionResult + Send + Sync + 'static,
    {
        self.on_exit = Some(Arc::new(f));
        self
    }

    pub fn with_entry_action(mut self, action: Action) -> Self {
        self.on_entry = Some(action);
        self
    }

    pub fn with_exit_action(mut self, action: Action) -> Self {
        self.on_exit = Some(action);
        self
    }

    /// Attach a do-activity, spawned after entry and cancelled on exit.
    pub fn with_activity(mut self, activity: Activity) -> Self {
        self.activity = Some(activity);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &StateKind {
        &self.kind
    }

    pub fn is_composite(&self) -> bool {
        matches!(self.kind, StateKind::Composite(_))
    }

    pub fn is_parallel(&self) -> bool {
        matches!(self.kind, StateKind::Parallel(_))
    }

    pub fn is_history(&self) -> bool {
        matches!(self.kind, StateKind::History(_))
    }

    pub fn is_final(&self) -> bool {
        matches!(self.kind, StateKind::Final)
    }

    /// True for states that never rest as a stable configuration on their
    /// own: history, entry and exit points. Choice and junction are
    /// reported as pseudostates too, although an unresolved choice stays
    /// active.
    pub fn is_pseudo(&self) -> bool {
        matches!(
            self.kind,
            StateKind::Choice(_)
                | StateKind::Junction(_)
                | StateKind::History(_)
                | StateKind::EntryPoint(_)
                | StateKind::ExitPoint(_)
        )
    }
}

impl std::fmt::Debug for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("State")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::states::HistoryKind;

    #[test]
    fn capability_queries() {
        let composite = State::composite("C", CompositeState::new());
        assert!(composite.is_composite());
        assert!(!composite.is_parallel());

        let history = State::history("H", HistoryState::new(HistoryKind::Deep));
        assert!(history.is_history());
        assert!(history.is_pseudo());

        assert!(State::final_state("Done").is_final());
        assert!(!State::simple("Idle").is_pseudo());
    }

    #[test]
    fn actions_are_attached() {
        let state = State::simple("A")
            .on_entry(|ctx| {
                ctx.set("entered", true);
                Ok(())
            })
            .on_exit(|_| Ok(()));

        let ctx = Context::new();
        let entry = state.on_entry.as_ref().unwrap();
        entry(&ctx).unwrap();
        assert!(ctx.flag("entered"));
        assert!(state.on_exit.is_some());
    }

    #[test]
    fn kind_labels() {
        assert_eq!(State::simple("A").kind().label(), "simple");
        assert_eq!(State::entry_point("in", "A").kind().label(), "entry-point");
        assert_eq!(format!("{:?}", State::final_state("F")), "State { name: \"F\", kind: final }");
    }
}
