//! Processing of one event: selection, exit/action/entry ordering,
//! pseudostate redirects and continuations.
//!
//! A [`Step`] borrows the topology for the duration of one event and is
//! only ever built while the machine's processing lock is held, so the
//! runtime mutations it makes (active flags, current children, history
//! records) never interleave with another event of the same machine.

use super::machine::StateMachine;
use super::observer::Observer;
use super::topology::{StateId, Topology};
use super::transition::{self, Transition};
use crate::core::{Context, Event, MachineError, Result, StateKind, TransitionRecord};
use crate::states::history;
use crate::states::submachine::Outcome;
use chrono::Utc;
use std::cell::Cell;
use std::sync::Arc;
use tracing::{debug, warn};

/// Trigger recorded for transitions taken while entering the initial chain.
const INITIAL_TRIGGER: &str = "(initial)";

/// Pending hop out of a pseudostate: `(source, target)`.
type Continuation = Option<(StateId, StateId)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Processed {
    /// Buffered by a defer state; nothing else happened.
    Deferred,
    /// At least one transition committed.
    Transitioned,
    /// Handled or ignored without changing the configuration.
    Unchanged,
}

pub(crate) struct Step<'a> {
    machine: &'a StateMachine,
    topo: &'a Topology,
    ctx: &'a Context,
    observers: Vec<Arc<dyn Observer>>,
    committed: Cell<bool>,
}

impl<'a> Step<'a> {
    pub(crate) fn new(machine: &'a StateMachine, topo: &'a Topology, ctx: &'a Context) -> Self {
        Self {
            machine,
            topo,
            ctx,
            observers: machine.observers(),
            committed: Cell::new(false),
        }
    }

    pub(crate) fn process(&self, event: &Event) -> Result<Processed> {
        self.ctx.set_event(Some(event.clone()));
        let Some(top) = self.machine.current() else {
            return Ok(Processed::Unchanged);
        };

        let chain = self.topo.chain_from(top);
        if chain.iter().any(|&id| self.defers(id, event)) {
            self.machine.defer(event.clone(), self.ctx.clone());
            debug!(machine = %self.machine.name(), event = %event.name(), "event deferred");
            return Ok(Processed::Deferred);
        }

        let sources: Vec<&str> = chain.iter().map(|&id| self.topo.path(id)).collect();
        match transition::select(&self.topo.transitions, &sources, event.name(), self.ctx) {
            Some(selected) => {
                let source = chain
                    .iter()
                    .copied()
                    .find(|&id| self.topo.path(id) == selected.from())
                    .unwrap_or(top);
                let target = self.target(None, selected.to())?;
                self.execute(source, target, event.name(), Some(selected))?;
            }
            None => {
                if let Some(target) = self.dispatch(top, event)? {
                    self.execute(top, target, event.name(), None)?;
                }
            }
        }

        for observer in &self.observers {
            observer.on_event_processed(self.machine.name(), event);
        }
        debug!(machine = %self.machine.name(), event = %event.name(), "event processed");

        Ok(if self.committed.get() {
            Processed::Transitioned
        } else {
            Processed::Unchanged
        })
    }

    /// Enter the initial chain of a machine being started.
    pub(crate) fn initialize(&self, initial: StateId) -> Result<()> {
        let target = self.redirect(initial)?;
        let next = self.enter(None, target)?;
        self.follow(next, INITIAL_TRIGGER)?;
        if self.topo.is_final(target) {
            self.machine.complete(self.topo.path(target));
        }
        Ok(())
    }

    fn defers(&self, id: StateId, event: &Event) -> bool {
        match &self.topo.node(id).kind {
            StateKind::Defer(defer) => defer.defers(event),
            _ => false,
        }
    }

    fn target(&self, scope: Option<StateId>, name: &str) -> Result<StateId> {
        self.topo
            .resolve(scope, name)
            .ok_or_else(|| MachineError::UnknownState(name.to_string()))
    }

    /// Let the active state at `id` handle `event`. Returns a target the
    /// caller must transition to, if the state cannot settle it itself.
    fn dispatch(&self, id: StateId, event: &Event) -> Result<Option<StateId>> {
        let node = self.topo.node(id);
        match &node.kind {
            StateKind::Composite(composite) => {
                let Some(child) = node.current_child() else {
                    return Ok(None);
                };
                let child_node = self.topo.node(child);
                if let Some(local) =
                    composite.local_transition(&child_node.name, &child_node.path, event.name(), self.ctx)
                {
                    let target = self.target(Some(id), local.to())?;
                    self.execute(child, target, event.name(), Some(local))?;
                    return Ok(None);
                }
                match self.dispatch(child, event)? {
                    Some(target) if self.topo.is_descendant(target, id) => {
                        self.execute(child, target, event.name(), None)?;
                        Ok(None)
                    }
                    other => Ok(other),
                }
            }
            StateKind::Parallel(parallel) => {
                parallel.broadcast(event)?;
                if let Some(failure) = parallel.failure() {
                    return Err(failure);
                }
                match parallel.join_target() {
                    Some(join) if parallel.all_completed() => {
                        debug!(machine = %self.machine.name(), state = %node.path, "regions joined");
                        self.target(node.parent, join).map(Some)
                    }
                    _ => Ok(None),
                }
            }
            StateKind::Submachine(submachine) => {
                submachine.forward(event);
                match submachine.outcome() {
                    Outcome::Running => Ok(None),
                    Outcome::Exit(exit) => self.target(node.parent, exit).map(Some),
                    Outcome::Unmapped(final_state) => {
                        warn!(
                            machine = %self.machine.name(),
                            state = %node.path,
                            final_state = %final_state,
                            "nested machine completed without a mapped exit"
                        );
                        Ok(None)
                    }
                    Outcome::Failed(message) => match submachine.error_exit_target() {
                        Some(exit) => self.target(node.parent, exit).map(Some),
                        None => Err(MachineError::Submachine {
                            state: node.path.clone(),
                            message,
                        }),
                    },
                }
            }
            StateKind::Timeout(timeout) => match timeout.target_name() {
                Some(target) if timeout.fired_by(event, &node.path) => {
                    self.target(node.parent, target).map(Some)
                }
                _ => Ok(None),
            },
            _ => Ok(None),
        }
    }

    /// Take a transition and every pseudostate hop that follows from it.
    fn execute(
        &self,
        source: StateId,
        target: StateId,
        trigger: &str,
        transition: Option<&Transition>,
    ) -> Result<()> {
        let next = self.transit(source, target, trigger, transition)?;
        self.follow(next, trigger)
    }

    fn follow(&self, mut next: Continuation, trigger: &str) -> Result<()> {
        let mut hops = 0;
        while let Some((source, target)) = next {
            hops += 1;
            if hops > self.machine.config().max_continuations {
                return Err(MachineError::ContinuationLimit(self.topo.path(source).to_string()));
            }
            next = self.transit(source, target, trigger, None)?;
        }
        Ok(())
    }

    /// Exit up to the common ancestor, run the action, enter down to the
    /// target.
    fn transit(
        &self,
        source: StateId,
        target: StateId,
        trigger: &str,
        transition: Option<&Transition>,
    ) -> Result<Continuation> {
        let target = self.redirect(target)?;
        let scope = if source == target {
            self.topo.node(source).parent
        } else {
            self.topo.common_ancestor(source, target)
        };
        let from = self.topo.path(source);
        let to = self.topo.path(target);

        self.exit(self.topo.child_toward(scope, source))?;
        if let Some(transition) = transition {
            transition
                .run_action(self.ctx)
                .map_err(|err| MachineError::ActionFailed {
                    from: from.to_string(),
                    to: to.to_string(),
                    event: trigger.to_string(),
                    message: err.to_string(),
                })?;
        }
        let next = self.enter(scope, target)?;

        self.committed.set(true);
        self.machine.record(TransitionRecord {
            from: from.to_string(),
            to: to.to_string(),
            event: trigger.to_string(),
            timestamp: Utc::now(),
        });
        for observer in &self.observers {
            observer.on_transition(self.machine.name(), from, to, trigger);
        }
        debug!(machine = %self.machine.name(), from = %from, to = %to, event = %trigger, "transition");

        if self.topo.is_final(target) {
            self.machine.complete(to);
        }
        Ok(next)
    }

    /// Replace pseudostates that stand for another state: history restores
    /// its recorded state, entry and exit points forward to their target.
    fn redirect(&self, target: StateId) -> Result<StateId> {
        let mut current = target;
        for _ in 0..=self.machine.config().max_continuations {
            let node = self.topo.node(current);
            current = match &node.kind {
                StateKind::History(_) => self.restore(current)?,
                StateKind::EntryPoint(point) | StateKind::ExitPoint(point) => {
                    self.target(node.parent, point.target())?
                }
                _ => return Ok(current),
            };
        }
        Err(MachineError::ContinuationLimit(self.topo.path(target).to_string()))
    }

    /// Entering a history state: its record, else its default. Having
    /// neither is a configuration error.
    fn restore(&self, id: StateId) -> Result<StateId> {
        self.recall(id)
            .ok_or_else(|| MachineError::NoTargetState(self.topo.path(id).to_string()))
    }

    fn recall(&self, id: StateId) -> Option<StateId> {
        let node = self.topo.node(id);
        let StateKind::History(state) = &node.kind else {
            return Some(id);
        };
        let recorded = node.runtime().recorded;
        let default = state
            .default_state()
            .and_then(|name| self.topo.resolve(node.parent, name));
        history::resolve(recorded, default)
    }

    /// Enter every state from just inside `scope` down to `target`, then
    /// settle `target` into a stable configuration.
    fn enter(&self, scope: Option<StateId>, target: StateId) -> Result<Continuation> {
        for id in self.topo.path_between(scope, target) {
            self.enter_node(id)?;
        }
        self.descend(target)
    }

    fn descend(&self, id: StateId) -> Result<Continuation> {
        let node = self.topo.node(id);
        match &node.kind {
            StateKind::Composite(composite) => {
                // An attached history that can restore something takes
                // precedence over the initial child.
                let child = match node.history.and_then(|history| self.recall(history)) {
                    Some(child) => child,
                    None => composite
                        .initial_name()
                        .and_then(|name| self.topo.resolve(Some(id), name))
                        .ok_or_else(|| MachineError::NoInitialChild(node.path.clone()))?,
                };
                let child = self.redirect(child)?;
                if !self.topo.is_descendant(child, id) {
                    return Err(MachineError::NoInitialChild(node.path.clone()));
                }
                self.enter(Some(id), child)
            }
            StateKind::Choice(choice) => match choice.select(self.ctx) {
                Some(target) => Ok(Some((id, self.target(node.parent, target)?))),
                None => {
                    warn!(
                        machine = %self.machine.name(),
                        state = %node.path,
                        "choice has no enabled branch, staying"
                    );
                    Ok(None)
                }
            },
            _ => Ok(None),
        }
    }

    fn enter_node(&self, id: StateId) -> Result<()> {
        let node = self.topo.node(id);
        if let Some(action) = &node.on_entry {
            action(self.ctx).map_err(|err| MachineError::EntryFailed {
                state: node.path.clone(),
                message: err.to_string(),
            })?;
        }

        node.runtime().active = true;
        match node.parent {
            Some(parent) => self.topo.node(parent).runtime().current_child = Some(id),
            None => self.machine.set_current(Some(id)),
        }

        let root = self.cancellation();
        match &node.kind {
            StateKind::Timeout(timeout) => {
                let timer = timeout.arm(&node.path, self.machine.downgrade(), &root)?;
                node.runtime().timer = Some(timer);
            }
            StateKind::Parallel(parallel) => {
                parallel.enter(&node.path, self.ctx, &self.machine.downgrade())?;
            }
            StateKind::Submachine(submachine) => {
                submachine.enter(&node.path, self.ctx, &self.machine.downgrade())?;
            }
            _ => {}
        }

        if let Some(activity) = &node.activity {
            let runtime = tokio::runtime::Handle::try_current()
                .map_err(|_| MachineError::NoRuntime(self.machine.name().to_string()))?;
            let token = root.child_token();
            let cancelled = token.clone();
            let work = activity(self.ctx.clone(), token.clone());
            runtime.spawn(async move {
                tokio::select! {
                    _ = cancelled.cancelled() => {}
                    _ = work => {}
                }
            });
            node.runtime().activity = Some(token);
        }

        for observer in &self.observers {
            observer.on_state_enter(self.machine.name(), &node.path);
        }
        debug!(machine = %self.machine.name(), state = %node.path, "entered state");
        Ok(())
    }

    /// Exit `id` and everything active below it, innermost first. Exiting an
    /// inactive state does nothing.
    pub(crate) fn exit(&self, id: StateId) -> Result<()> {
        let node = self.topo.node(id);
        if !node.is_active() {
            return Ok(());
        }

        match &node.kind {
            StateKind::Composite(_) => {
                if let Some(child) = node.current_child() {
                    self.record_history(id, child);
                    self.exit(child)?;
                }
                node.runtime().current_child = None;
            }
            StateKind::Parallel(parallel) => parallel.exit()?,
            StateKind::Submachine(submachine) => submachine.exit(&node.path)?,
            StateKind::Timeout(_) => {
                if let Some(timer) = node.runtime().timer.take() {
                    timer.cancel();
                }
            }
            _ => {}
        }
        if let Some(activity) = node.runtime().activity.take() {
            activity.cancel();
        }

        if let Some(action) = &node.on_exit {
            action(self.ctx).map_err(|err| MachineError::ExitFailed {
                state: node.path.clone(),
                message: err.to_string(),
            })?;
        }

        node.runtime().active = false;
        match node.parent {
            Some(parent) => {
                let mut runtime = self.topo.node(parent).runtime();
                if runtime.current_child == Some(id) {
                    runtime.current_child = None;
                }
            }
            None => {
                if self.machine.current() == Some(id) {
                    self.machine.set_current(None);
                }
            }
        }

        for observer in &self.observers {
            observer.on_state_exit(self.machine.name(), &node.path);
        }
        debug!(machine = %self.machine.name(), state = %node.path, "exited state");
        Ok(())
    }

    fn record_history(&self, composite: StateId, child: StateId) {
        let Some(history) = self.topo.node(composite).history else {
            return;
        };
        let node = self.topo.node(history);
        if let StateKind::History(state) = &node.kind {
            let leaf = self.topo.leaf_from(child);
            node.runtime().recorded = Some(state.record_target(child, leaf));
        }
    }

    fn cancellation(&self) -> tokio_util::sync::CancellationToken {
        self.machine
            .cancellation()
            .unwrap_or_else(|| self.ctx.cancellation().clone())
    }
}
