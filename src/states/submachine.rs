//! Submachine states.

use crate::core::sync::lock;
use crate::core::{Context, Event, MachineError, Result};
use crate::engine::{Observer, RunState, StateMachine, WeakMachine};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Observer attached to the nested machine to capture its failures.
#[derive(Default)]
struct Watch {
    failure: Mutex<Option<String>>,
}

impl Observer for Watch {
    fn on_error(&self, _machine: &str, error: &MachineError) {
        *lock(&self.failure) = Some(error.to_string());
    }
}

/// What the nested machine means for the submachine state after an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Outcome<'a> {
    Running,
    Exit(&'a str),
    Unmapped(String),
    Failed(String),
}

/// Payload of a state wrapping an independent nested machine.
///
/// On entry the nested machine is started with a forked context; on exit
/// it is stopped. Events reaching the submachine state are renamed through
/// the event map (unmapped names pass through) and handed to the nested
/// machine. When the nested machine completes, the state moves to the
/// exit mapped from the nested final state, or the default exit. When it
/// fails, the state moves to the error exit, or the failure propagates.
///
/// # Example
///
/// ```rust
/// use statecraft::{StateMachine, SubmachineState};
///
/// let checkout = StateMachine::new("checkout");
/// let state = SubmachineState::new(checkout)
///     .map_event("PAY", "SUBMIT")
///     .exit_on("Paid", "Shipping")
///     .error_exit("Support");
///
/// assert_eq!(state.mapped_event("PAY"), "SUBMIT");
/// assert_eq!(state.mapped_event("OTHER"), "OTHER");
/// ```
pub struct SubmachineState {
    machine: StateMachine,
    event_map: HashMap<String, String>,
    exits: HashMap<String, String>,
    default_exit: Option<String>,
    error_exit: Option<String>,
    watch: Arc<Watch>,
    attached: AtomicBool,
}

impl SubmachineState {
    pub fn new(machine: StateMachine) -> Self {
        Self {
            machine,
            event_map: HashMap::new(),
            exits: HashMap::new(),
            default_exit: None,
            error_exit: None,
            watch: Arc::new(Watch::default()),
            attached: AtomicBool::new(false),
        }
    }

    pub fn map_event(mut self, outer: impl Into<String>, inner: impl Into<String>) -> Self {
        self.event_map.insert(outer.into(), inner.into());
        self
    }

    /// Leave to `target` when the nested machine completes in `final_state`.
    pub fn exit_on(mut self, final_state: impl Into<String>, target: impl Into<String>) -> Self {
        self.exits.insert(final_state.into(), target.into());
        self
    }

    pub fn default_exit(mut self, target: impl Into<String>) -> Self {
        self.default_exit = Some(target.into());
        self
    }

    pub fn error_exit(mut self, target: impl Into<String>) -> Self {
        self.error_exit = Some(target.into());
        self
    }

    pub fn machine(&self) -> &StateMachine {
        &self.machine
    }

    pub fn mapped_event<'a>(&'a self, name: &'a str) -> &'a str {
        self.event_map.get(name).map_or(name, String::as_str)
    }

    pub fn error_exit_target(&self) -> Option<&str> {
        self.error_exit.as_deref()
    }

    /// Every parent-side state this submachine may exit to.
    pub fn exit_targets(&self) -> impl Iterator<Item = &str> {
        self.exits
            .values()
            .chain(self.default_exit.iter())
            .chain(self.error_exit.iter())
            .map(String::as_str)
    }

    pub(crate) fn enter(&self, path: &str, ctx: &Context, owner: &WeakMachine) -> Result<()> {
        if !self.attached.swap(true, Ordering::AcqRel) {
            self.machine.add_observer(self.watch.clone());
        }
        *lock(&self.watch.failure) = None;
        self.machine.set_owner(owner.clone(), path);
        self.machine
            .start(ctx.fork())
            .map_err(|err| MachineError::Submachine {
                state: path.to_string(),
                message: err.to_string(),
            })
    }

    /// Hand `event` to the nested machine. Failures are not returned here;
    /// they surface through [`SubmachineState::outcome`].
    pub(crate) fn forward(&self, event: &Event) {
        if event.is_completion() {
            return;
        }
        let mapped = match self.event_map.get(event.name()) {
            Some(inner) => event.renamed(inner.clone()),
            None => event.clone(),
        };
        if let Err(err) = self.machine.dispatch(&mapped) {
            tracing::debug!(
                machine = %self.machine.name(),
                event = %mapped.name(),
                error = %err,
                "nested machine failed"
            );
        }
    }

    pub(crate) fn outcome(&self) -> Outcome<'_> {
        match self.machine.run_state() {
            RunState::Completed => {
                let final_state = self.machine.current_state().unwrap_or_default();
                match self.exits.get(&final_state).or(self.default_exit.as_ref()) {
                    Some(target) => Outcome::Exit(target),
                    None => Outcome::Unmapped(final_state),
                }
            }
            RunState::Error => {
                let message = lock(&self.watch.failure)
                    .clone()
                    .or_else(|| self.machine.last_error().map(|e| e.to_string()))
                    .unwrap_or_else(|| "nested machine failed".to_string());
                Outcome::Failed(message)
            }
            RunState::Running | RunState::Stopped => Outcome::Running,
        }
    }

    pub(crate) fn exit(&self, path: &str) -> Result<()> {
        self.machine
            .halt()
            .map_err(|err| MachineError::Submachine {
                state: path.to_string(),
                message: err.to_string(),
            })
    }

    pub(crate) fn reset(&self) {
        self.machine.reset();
        *lock(&self.watch.failure) = None;
    }
}
