//! Builder for constructing state machines.

use crate::builder::error::BuildError;
use crate::builder::transition::TransitionBuilder;
use crate::core::State;
use crate::engine::{MachineConfig, Observer, StateMachine, Transition};
use std::sync::Arc;

/// Builder for constructing state machines with a fluent API.
///
/// `build` only uses the machine's public topology operations, then
/// validates the result and reports every violation at once.
pub struct MachineBuilder {
    name: String,
    config: MachineConfig,
    states: Vec<State>,
    transitions: Vec<Transition>,
    initial: Option<String>,
    finals: Vec<String>,
    observers: Vec<Arc<dyn Observer>>,
}

impl MachineBuilder {
    /// Create a new builder for a machine called `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: MachineConfig::default(),
            states: Vec::new(),
            transitions: Vec::new(),
            initial: None,
            finals: Vec::new(),
            observers: Vec::new(),
        }
    }

    pub fn config(mut self, config: MachineConfig) -> Self {
        self.config = config;
        self
    }

    /// Add a top-level state.
    pub fn state(mut self, state: State) -> Self {
        self.states.push(state);
        self
    }

    /// Set the initial state (required).
    pub fn initial(mut self, path: impl Into<String>) -> Self {
        self.initial = Some(path.into());
        self
    }

    /// Mark a declared state as final.
    pub fn final_state(mut self, path: impl Into<String>) -> Self {
        self.finals.push(path.into());
        self
    }

    /// Add a transition using a builder.
    /// Returns an error if the builder fails validation.
    pub fn transition(mut self, builder: TransitionBuilder) -> Result<Self, BuildError> {
        let transition = builder.build()?;
        self.transitions.push(transition);
        Ok(self)
    }

    /// Add a pre-built transition.
    pub fn add_transition(mut self, transition: Transition) -> Self {
        self.transitions.push(transition);
        self
    }

    /// Add multiple transitions at once.
    pub fn transitions(mut self, transitions: Vec<Transition>) -> Self {
        self.transitions.extend(transitions);
        self
    }

    pub fn observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Build and validate the machine.
    pub fn build(self) -> Result<StateMachine, BuildError> {
        let initial = self.initial.ok_or(BuildError::MissingInitialState)?;

        let machine = StateMachine::with_config(self.name, self.config);
        for state in self.states {
            machine.add_state(state);
        }
        for transition in self.transitions {
            machine.declare(transition);
        }
        machine.set_initial_state(initial);
        for path in self.finals {
            machine
                .add_final_state(&path)
                .map_err(|_| BuildError::UnknownFinalState(path.clone()))?;
        }
        for observer in self.observers {
            machine.add_observer(observer);
        }

        machine.validate().map_err(BuildError::Invalid)?;
        Ok(machine)
    }
}
