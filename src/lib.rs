//! Statecraft: hierarchical, concurrent statecharts on Tokio
//!
//! Statecraft executes UML-style statecharts: composite states, orthogonal
//! regions with joins, shallow and deep history, choice and junction
//! pseudostates, event deferral, timeouts and embedded sub-machines.
//!
//! # Core Concepts
//!
//! - **State**: a declaration ([`State`]) whose [`StateKind`] says how it behaves
//! - **Transition**: from/to/event plus optional guard, action and priority
//! - **Engine**: [`StateMachine`] owns the active configuration, a bounded
//!   event queue served by one Tokio task, and the deferred-event buffer
//! - **Regions**: a parallel state's regions are machines of their own,
//!   each with its own loop
//! - **Context**: a shared key/value scratchpad handed to guards and actions
//!
//! # Example
//!
//! ```rust
//! use statecraft::{CompositeState, Context, State, StateMachine, Transition};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> statecraft::Result<()> {
//! let machine = StateMachine::new("player");
//! machine.add_state(State::composite(
//!     "Active",
//!     CompositeState::new()
//!         .child(State::simple("Playing"))
//!         .child(State::simple("Paused"))
//!         .initial("Playing")
//!         .transition(Transition::new("Playing", "Paused", "PAUSE")),
//! ));
//! machine.add_state(State::final_state("Off"));
//! machine.add_transition("Active", "Off", "POWER");
//! machine.set_initial_state("Active");
//!
//! let ctx = Context::new();
//! machine.start(ctx.clone())?;
//! assert_eq!(machine.active_path(), vec!["Active", "Active.Playing"]);
//!
//! machine.handle_event(&ctx, "PAUSE")?;
//! assert_eq!(machine.active_leaf().as_deref(), Some("Active.Paused"));
//!
//! machine.handle_event(&ctx, "POWER")?;
//! assert_eq!(machine.run_state(), statecraft::RunState::Completed);
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod core;
pub mod engine;
pub mod observers;
pub mod states;

// Re-export commonly used types
pub use builder::{BuildError, MachineBuilder, TransitionBuilder};
pub use core::{
    Action, ActionResult, Activity, BoxError, Context, Event, EventPriority, Guard, MachineError,
    Result, State, StateKind, TransitionLog, TransitionRecord, COMPLETION_PREFIX,
};
pub use engine::{
    DeferredEvent, EventDeferrer, MachineConfig, Observer, RunState, StateId, StateMachine,
    Transition, Violation, WeakMachine,
};
pub use observers::{CountingObserver, ObservedTransition, TracingObserver};
pub use states::{
    ChoiceOption, ChoiceState, CompositeState, DeferState, HistoryKind, HistoryState,
    JunctionRoute, JunctionState, ParallelState, PointState, Region, SubmachineState,
    TimeoutState, DEFAULT_TIMEOUT_EVENT,
};
