//! Builder API for ergonomic machine construction.
//!
//! The builders only call the engine's topology operations
//! (`add_state`, `declare`, `set_initial_state`, `add_final_state`); they
//! add no runtime behavior of their own.

pub mod error;
pub mod machine;
pub mod transition;

pub use error::BuildError;
pub use machine::MachineBuilder;
pub use transition::TransitionBuilder;

use crate::core::Context;
use crate::engine::Transition;

/// Create an unconditional transition.
///
/// # Example
///
/// ```
/// use statecraft::builder::simple_transition;
///
/// let transition = simple_transition("Start", "End", "FINISH");
/// assert_eq!(transition.to(), "End");
/// ```
pub fn simple_transition(
    from: impl Into<String>,
    to: impl Into<String>,
    event: impl Into<String>,
) -> Transition {
    Transition::new(from, to, event)
}

/// Create a transition with a guard predicate.
///
/// # Example
///
/// ```
/// use statecraft::builder::guarded_transition;
///
/// let transition = guarded_transition("Start", "Middle", "NEXT", |ctx| ctx.flag("ready"));
/// assert!(transition.has_guard());
/// ```
pub fn guarded_transition<F>(
    from: impl Into<String>,
    to: impl Into<String>,
    event: impl Into<String>,
    guard: F,
) -> Transition
where
    F: Fn(&Context) -> bool + Send + Sync + 'static,
{
    Transition::new(from, to, event).when(guard)
}
