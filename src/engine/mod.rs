//! The statechart engine.
//!
//! [`StateMachine`] owns a flattened state tree, the declared transitions,
//! a bounded event queue served by one Tokio task, and the deferred-event
//! buffer. Parallel regions and submachines are themselves
//! `StateMachine`s, each with its own loop, owned by the state that
//! declares them.

mod config;
mod deferral;
mod machine;
mod observer;
mod step;
mod topology;
mod transition;
mod validation;

pub use config::MachineConfig;
pub use deferral::{DeferredEvent, EventDeferrer};
pub use machine::{RunState, StateMachine, WeakMachine};
pub use observer::Observer;
pub use topology::StateId;
pub use transition::Transition;
pub use validation::Violation;
