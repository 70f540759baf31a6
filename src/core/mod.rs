//! Leaf types shared by the engine and the state variants.
//!
//! - Events and the shared run context
//! - Guards, actions and do-activities
//! - State declarations
//! - The error taxonomy and the transition journal

pub mod action;
mod context;
mod error;
mod event;
mod guard;
mod journal;
mod state;
pub(crate) mod sync;

pub use action::{Action, ActionResult, Activity, BoxFuture};
pub use context::Context;
pub use error::{BoxError, MachineError, Result};
pub use event::{Event, EventPriority, COMPLETION_PREFIX, TIMEOUT_SOURCE_KEY};
pub use guard::Guard;
pub use journal::{TransitionLog, TransitionRecord};
pub use state::{State, StateKind};
