//! Guard predicates for controlling transitions.
//!
//! Guards are boolean functions over the run [`Context`]. They decide
//! whether a transition or choice branch is enabled and should not have
//! side effects.

use super::context::Context;
use std::sync::Arc;

/// Shareable predicate evaluated against the run context.
///
/// # Example
///
/// ```rust
/// use statecraft::{Context, Guard};
///
/// let armed = Guard::new(|ctx: &Context| ctx.flag("armed"));
///
/// let ctx = Context::new();
/// assert!(!armed.check(&ctx));
/// ctx.set("armed", true);
/// assert!(armed.check(&ctx));
/// ```
#[derive(Clone)]
pub struct Guard {
    predicate: Arc<dyn Fn(&Context) -> bool + Send + Sync>,
}

impl Guard {
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&Context) -> bool + Send + Sync + 'static,
    {
        Guard {
            predicate: Arc::new(predicate),
        }
    }

    /// Guard that is always enabled. Used for `else` branches.
    pub fn always() -> Self {
        Guard::new(|_| true)
    }

    /// Guard enabled while `key` holds the boolean `true`.
    pub fn flag(key: impl Into<String>) -> Self {
        let key = key.into();
        Guard::new(move |ctx| ctx.flag(&key))
    }

    pub fn check(&self, ctx: &Context) -> bool {
        (self.predicate)(ctx)
    }

    pub fn not(self) -> Self {
        Guard::new(move |ctx| !self.check(ctx))
    }

    pub fn and(self, other: Guard) -> Self {
        Guard::new(move |ctx| self.check(ctx) && other.check(ctx))
    }

    pub fn or(self, other: Guard) -> Self {
        Guard::new(move |ctx| self.check(ctx) || other.check(ctx))
    }
}

impl std::fmt::Debug for Guard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Guard(..)")
    }
}
