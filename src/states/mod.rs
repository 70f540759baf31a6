//! State variant payloads and their decision logic.
//!
//! Each variant of [`crate::StateKind`] that carries data has its payload
//! here. Pure decisions (history restoration, choice and junction
//! selection, deferral matching) live next to the payload; the engine
//! drives entry, exit and dispatch by matching on the kind.

mod choice;
mod composite;
mod defer;
pub(crate) mod history;
mod parallel;
mod point;
pub(crate) mod submachine;
mod timeout;

pub use choice::{ChoiceOption, ChoiceState, JunctionRoute, JunctionState};
pub use composite::CompositeState;
pub use defer::DeferState;
pub use history::{HistoryKind, HistoryState};
pub use parallel::{ParallelState, Region};
pub use point::PointState;
pub use submachine::SubmachineState;
pub use timeout::{TimeoutState, DEFAULT_TIMEOUT_EVENT};
