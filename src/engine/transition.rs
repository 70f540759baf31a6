//! Declared transitions and priority-based selection.

use crate::core::{Action, ActionResult, Context, Guard};
use std::sync::Arc;

/// A declared transition between two states.
///
/// `from` and `to` are state paths (`"Idle"`, `"Door.Open"`); `event` is the
/// name of the triggering event. A transition with no guard is always
/// enabled. When several transitions are enabled for the same event, the
/// one with the highest `priority` wins and ties keep declaration order.
///
/// Transitions are stateless and can be cloned freely.
#[derive(Clone)]
pub struct Transition {
    from: String,
    to: String,
    event: String,
    guard: Option<Guard>,
    action: Option<Action>,
    priority: i32,
}

impl Transition {
    pub fn new(from: impl Into<String>, to: impl Into<String>, event: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            event: event.into(),
            guard: None,
            action: None,
            priority: 0,
        }
    }

    pub fn with_guard(mut self, guard: Guard) -> Self {
        self.guard = Some(guard);
        self
    }

    /// Guard the transition with a closure.
    pub fn when<F>(self, predicate: F) -> Self
    where
        F: Fn(&Context) -> bool + Send + Sync + 'static,
    {
        self.with_guard(Guard::new(predicate))
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.action = Some(action);
        self
    }

    /// Run a closure between exiting the source and entering the target.
    pub fn then<F>(self, f: F) -> Self
    where
        F: Fn(&Context) -> ActionResult + Send + Sync + 'static,
    {
        self.with_action(Arc::new(f))
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn from(&self) -> &str {
        &self.from
    }

    pub fn to(&self) -> &str {
        &self.to
    }

    pub fn event(&self) -> &str {
        &self.event
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn has_guard(&self) -> bool {
        self.guard.is_some()
    }

    pub fn has_action(&self) -> bool {
        self.action.is_some()
    }

    pub fn triggers(&self, event: &str) -> bool {
        self.event == event
    }

    pub fn is_enabled(&self, ctx: &Context) -> bool {
        self.guard.as_ref().map_or(true, |guard| guard.check(ctx))
    }

    pub(crate) fn run_action(&self, ctx: &Context) -> ActionResult {
        match &self.action {
            Some(action) => action(ctx),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for Transition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transition")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("event", &self.event)
            .field("priority", &self.priority)
            .field("has_guard", &self.has_guard())
            .field("has_action", &self.has_action())
            .finish()
    }
}

/// Pick the transition to fire for `event` from any of the `sources`.
///
/// Guards are only evaluated for transitions whose source and event match.
/// Highest priority wins; among equal priorities the earliest declared wins.
pub(crate) fn select<'t>(
    transitions: &'t [Transition],
    sources: &[&str],
    event: &str,
    ctx: &Context,
) -> Option<&'t Transition> {
    transitions
        .iter()
        .filter(|t| t.triggers(event) && sources.contains(&t.from()))
        .filter(|t| t.is_enabled(ctx))
        .fold(None, |best: Option<&Transition>, t| match best {
            Some(b) if b.priority >= t.priority => Some(b),
            _ => Some(t),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unguarded_transition_is_enabled() {
        let t = Transition::new("A", "B", "GO");
        assert!(t.is_enabled(&Context::new()));
        assert!(t.triggers("GO"));
        assert!(!t.triggers("STOP"));
    }

    #[test]
    fn guard_is_consulted() {
        let t = Transition::new("A", "B", "GO").when(|ctx| ctx.flag("x"));
        let ctx = Context::new();
        assert!(!t.is_enabled(&ctx));
        ctx.set("x", true);
        assert!(t.is_enabled(&ctx));
    }

    #[test]
    fn highest_priority_wins() {
        let transitions = vec![
            Transition::new("A", "B", "GO").with_priority(1),
            Transition::new("A", "C", "GO").with_priority(5),
            Transition::new("A", "D", "GO").with_priority(3),
        ];
        let chosen = select(&transitions, &["A"], "GO", &Context::new()).unwrap();
        assert_eq!(chosen.to(), "C");
    }

    #[test]
    fn ties_keep_declaration_order() {
        let transitions = vec![
            Transition::new("A", "B", "GO"),
            Transition::new("A", "C", "GO"),
        ];
        let chosen = select(&transitions, &["A"], "GO", &Context::new()).unwrap();
        assert_eq!(chosen.to(), "B");
    }

    #[test]
    fn disabled_and_foreign_transitions_are_skipped() {
        let transitions = vec![
            Transition::new("A", "B", "GO").with_priority(9).when(|_| false),
            Transition::new("X", "C", "GO").with_priority(8),
            Transition::new("A", "D", "GO"),
        ];
        let chosen = select(&transitions, &["A"], "GO", &Context::new()).unwrap();
        assert_eq!(chosen.to(), "D");
        assert!(select(&transitions, &["A"], "STOP", &Context::new()).is_none());
    }

    #[test]
    fn action_runs_against_context() {
        let t = Transition::new("A", "B", "GO").then(|ctx| {
            ctx.set("ran", true);
            Ok(())
        });
        let ctx = Context::new();
        t.run_action(&ctx).unwrap();
        assert!(ctx.flag("ran"));
        assert!(t.has_action());
    }
}
