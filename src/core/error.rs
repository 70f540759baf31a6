//! Error types for the statechart engine.

use thiserror::Error;

/// Boxed error returned by user-supplied entry, exit and transition actions.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Convenience alias used throughout the engine.
pub type Result<T, E = MachineError> = std::result::Result<T, E>;

/// Errors raised while configuring, starting or driving a machine.
///
/// Variants fall into three groups:
///
/// - configuration errors (`NoInitialState`, `UnknownState`, `NoInitialChild`,
///   `NoTargetState`, `ContinuationLimit`) are fatal at start or entry time;
/// - runtime errors (`EntryFailed`, `ExitFailed`, `ActionFailed`, `Region`,
///   `Submachine`) abort the in-flight transition and put the machine into the
///   `Error` run-state;
/// - concurrency errors (`AlreadyRunning`, `NotRunning`, `QueueFull`,
///   `NoRuntime`) are returned to the caller and leave the machine untouched.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MachineError {
    #[error("machine '{0}' is already running")]
    AlreadyRunning(String),

    #[error("machine '{0}' is not running")]
    NotRunning(String),

    #[error("event queue of machine '{0}' is full")]
    QueueFull(String),

    #[error("machine '{0}' has no initial state")]
    NoInitialState(String),

    #[error("unknown state '{0}'")]
    UnknownState(String),

    #[error("composite state '{0}' has no initial child and no history to restore")]
    NoInitialChild(String),

    #[error("history state '{0}' has neither a recorded state nor a default")]
    NoTargetState(String),

    #[error("pseudostate chain starting at '{0}' exceeded the continuation limit")]
    ContinuationLimit(String),

    #[error("entry action of state '{state}' failed: {message}")]
    EntryFailed { state: String, message: String },

    #[error("exit action of state '{state}' failed: {message}")]
    ExitFailed { state: String, message: String },

    #[error("action of transition '{from}' -> '{to}' on '{event}' failed: {message}")]
    ActionFailed {
        from: String,
        to: String,
        event: String,
        message: String,
    },

    #[error("region '{region}' failed: {source}")]
    Region {
        region: String,
        #[source]
        source: Box<MachineError>,
    },

    #[error("submachine state '{state}' failed: {message}")]
    Submachine { state: String, message: String },

    #[error("no Tokio runtime available to drive machine '{0}'")]
    NoRuntime(String),
}

impl MachineError {
    /// True for errors that reject a call without affecting the machine.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::AlreadyRunning(_) | Self::NotRunning(_) | Self::QueueFull(_) | Self::NoRuntime(_)
        )
    }

    /// True for errors caused by an invalid topology.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::NoInitialState(_)
                | Self::UnknownState(_)
                | Self::NoInitialChild(_)
                | Self::NoTargetState(_)
                | Self::ContinuationLimit(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_errors_are_classified() {
        assert!(MachineError::QueueFull("m".into()).is_transient());
        assert!(MachineError::NotRunning("m".into()).is_transient());
        assert!(!MachineError::NoInitialState("m".into()).is_transient());
    }

    #[test]
    fn configuration_errors_are_classified() {
        assert!(MachineError::NoTargetState("C.H".into()).is_configuration());
        assert!(!MachineError::EntryFailed {
            state: "A".into(),
            message: "boom".into(),
        }
        .is_configuration());
    }

    #[test]
    fn region_error_displays_source() {
        let err = MachineError::Region {
            region: "left".into(),
            source: Box::new(MachineError::UnknownState("X".into())),
        };
        assert_eq!(err.to_string(), "region 'left' failed: unknown state 'X'");
    }
}
