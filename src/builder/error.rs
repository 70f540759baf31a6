//! Build errors for machine and transition builders.

use crate::engine::Violation;
use thiserror::Error;

/// Errors that can occur when building machines and transitions.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Initial state not specified. Call .initial(state) before .build()")]
    MissingInitialState,

    #[error("Final state '{0}' is not declared. Add it with .state(..) first")]
    UnknownFinalState(String),

    #[error("Transition source state not specified. Call .from(state)")]
    MissingFromState,

    #[error("Transition target state not specified. Call .to(state)")]
    MissingToState,

    #[error("Transition event not specified. Call .on(event)")]
    MissingEvent,

    #[error("Machine definition has {} violation(s): {}", .0.len(), summarize(.0))]
    Invalid(Vec<Violation>),
}

fn summarize(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
