//! The engine: topology, run-state and the per-machine event loop.

use super::config::MachineConfig;
use super::deferral::EventDeferrer;
use super::observer::Observer;
use super::step::{Processed, Step};
use super::topology::{StateId, Topology};
use super::transition::Transition;
use super::validation::{self, Violation};
use crate::core::sync::{lock, read, write};
use crate::core::{
    Action, Context, Event, Guard, MachineError, Result, State, StateKind, TransitionLog,
    TransitionRecord,
};
use std::sync::{Arc, Mutex, RwLock, Weak};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Lifecycle of an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunState {
    Stopped,
    Running,
    Completed,
    Error,
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Stopped => "stopped",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Error => "error",
        };
        f.write_str(label)
    }
}

struct Status {
    run_state: RunState,
    current: Option<StateId>,
    last_error: Option<MachineError>,
    context: Option<Context>,
    /// Bumped by every `start`; a loop only acts for the run it was spawned for.
    run: u64,
}

struct Worker {
    sender: mpsc::Sender<Event>,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

#[derive(Clone)]
struct Owner {
    machine: WeakMachine,
    path: String,
}

struct Shared {
    name: String,
    config: MachineConfig,
    topology: RwLock<Topology>,
    processing: Mutex<()>,
    status: Mutex<Status>,
    deferrer: Mutex<EventDeferrer>,
    observers: RwLock<Vec<Arc<dyn Observer>>>,
    journal: Mutex<TransitionLog>,
    worker: Mutex<Option<Worker>>,
    owner: Mutex<Option<Owner>>,
    changes: watch::Sender<u64>,
}

/// A hierarchical state machine.
///
/// `StateMachine` is a cheap handle; clones drive the same engine. The
/// topology is declared up front with [`add_state`](Self::add_state) and the
/// `add_transition*` family, then [`start`](Self::start) enters the initial
/// state and spawns the processing loop on the current Tokio runtime.
///
/// Events are either queued with [`send_event`](Self::send_event), which
/// never blocks, or processed inline with [`handle_event`](Self::handle_event).
/// Either way only one event is processed at a time.
///
/// # Example
///
/// ```rust
/// use statecraft::{Context, Guard, State, StateMachine};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> statecraft::Result<()> {
/// let machine = StateMachine::new("door");
/// machine.add_state(State::simple("Closed"));
/// machine.add_state(State::simple("Open"));
/// machine.add_transition_with_guard("Closed", "Open", "PUSH", Guard::flag("unlocked"));
/// machine.set_initial_state("Closed");
///
/// let ctx = Context::new();
/// machine.start(ctx.clone())?;
///
/// machine.handle_event(&ctx, "PUSH")?;
/// assert_eq!(machine.current_state().as_deref(), Some("Closed"));
///
/// ctx.set("unlocked", true);
/// machine.handle_event(&ctx, "PUSH")?;
/// assert_eq!(machine.current_state().as_deref(), Some("Open"));
///
/// machine.stop()?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct StateMachine {
    shared: Arc<Shared>,
}

/// Non-owning handle to a [`StateMachine`].
#[derive(Clone, Default)]
pub struct WeakMachine {
    shared: Weak<Shared>,
}

impl WeakMachine {
    pub fn upgrade(&self) -> Option<StateMachine> {
        self.shared.upgrade().map(|shared| StateMachine { shared })
    }
}

impl StateMachine {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(name, MachineConfig::default())
    }

    pub fn with_config(name: impl Into<String>, config: MachineConfig) -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            shared: Arc::new(Shared {
                name: name.into(),
                config,
                topology: RwLock::new(Topology::default()),
                processing: Mutex::new(()),
                status: Mutex::new(Status {
                    run_state: RunState::Stopped,
                    current: None,
                    last_error: None,
                    context: None,
                    run: 0,
                }),
                deferrer: Mutex::new(EventDeferrer::new()),
                observers: RwLock::new(Vec::new()),
                journal: Mutex::new(TransitionLog::new()),
                worker: Mutex::new(None),
                owner: Mutex::new(None),
                changes,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn config(&self) -> &MachineConfig {
        &self.shared.config
    }

    pub fn downgrade(&self) -> WeakMachine {
        WeakMachine {
            shared: Arc::downgrade(&self.shared),
        }
    }

    // Topology

    /// Add a top-level state. Composite children are added with it.
    ///
    /// The topology is static once the machine runs; do not call this from
    /// inside actions or observers.
    pub fn add_state(&self, state: State) -> StateId {
        write(&self.shared.topology).insert(state, None)
    }

    pub fn add_transition(
        &self,
        from: impl Into<String>,
        to: impl Into<String>,
        event: impl Into<String>,
    ) {
        self.declare(Transition::new(from, to, event));
    }

    pub fn add_transition_with_guard(
        &self,
        from: impl Into<String>,
        to: impl Into<String>,
        event: impl Into<String>,
        guard: Guard,
    ) {
        self.declare(Transition::new(from, to, event).with_guard(guard));
    }

    pub fn add_transition_with_action(
        &self,
        from: impl Into<String>,
        to: impl Into<String>,
        event: impl Into<String>,
        action: Action,
    ) {
        self.declare(Transition::new(from, to, event).with_action(action));
    }

    /// Add a fully configured transition.
    pub fn declare(&self, transition: Transition) {
        write(&self.shared.topology).transitions.push(transition);
    }

    pub fn set_initial_state(&self, path: impl Into<String>) {
        write(&self.shared.topology).initial = Some(path.into());
    }

    /// Mark an existing state as final. Top-level [`State::final_state`]
    /// declarations are final already.
    pub fn add_final_state(&self, path: &str) -> Result<()> {
        let mut topology = write(&self.shared.topology);
        if topology.lookup(path).is_none() {
            return Err(MachineError::UnknownState(path.to_string()));
        }
        topology.finals.insert(path.to_string());
        Ok(())
    }

    pub fn add_observer(&self, observer: Arc<dyn Observer>) {
        write(&self.shared.observers).push(observer);
    }

    /// Check the topology, reporting every problem found.
    pub fn validate(&self) -> std::result::Result<(), Vec<Violation>> {
        let violations = validation::validate(&read(&self.shared.topology));
        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }

    // Lifecycle

    /// Enter the initial state chain and spawn the processing loop.
    ///
    /// Fails with `AlreadyRunning` unless the machine is stopped, and with
    /// `NoRuntime` outside a Tokio runtime. A failure while entering the
    /// initial chain puts the machine into the `Error` run-state and no loop
    /// is spawned.
    pub fn start(&self, ctx: Context) -> Result<()> {
        let _processing = lock(&self.shared.processing);
        if self.run_state() != RunState::Stopped {
            return Err(MachineError::AlreadyRunning(self.shared.name.clone()));
        }
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| MachineError::NoRuntime(self.shared.name.clone()))?;

        let topology = read(&self.shared.topology);
        let initial_path = topology
            .initial
            .clone()
            .ok_or_else(|| MachineError::NoInitialState(self.shared.name.clone()))?;
        let initial = topology
            .lookup(&initial_path)
            .ok_or_else(|| MachineError::UnknownState(initial_path.clone()))?;

        ctx.bind(self.downgrade());
        let cancel = ctx.cancellation().child_token();
        let (sender, receiver) = mpsc::channel(self.shared.config.queue_capacity.max(1));
        let run = {
            let mut status = lock(&self.shared.status);
            status.run_state = RunState::Running;
            status.current = None;
            status.last_error = None;
            status.context = Some(ctx.clone());
            status.run = status.run.wrapping_add(1);
            status.run
        };
        *lock(&self.shared.worker) = Some(Worker {
            sender,
            cancel: cancel.clone(),
            handle: None,
        });
        info!(machine = %self.shared.name, initial = %initial_path, "starting machine");

        let entered = Step::new(self, &topology, &ctx)
            .initialize(initial)
            .and_then(|()| self.drain(&topology));
        drop(topology);

        if let Err(err) = entered {
            if let Some(worker) = lock(&self.shared.worker).take() {
                worker.cancel.cancel();
            }
            self.fail(&err);
            return Err(err);
        }

        let handle = runtime.spawn(run_loop(self.downgrade(), receiver, cancel, run));
        if let Some(worker) = lock(&self.shared.worker).as_mut() {
            worker.handle = Some(handle);
        }
        self.bump();
        Ok(())
    }

    /// Stop the loop and exit the active chain. No-op unless running.
    ///
    /// Returns once any in-flight event has finished and every active state,
    /// including region and nested machines, has been exited.
    pub fn stop(&self) -> Result<()> {
        if self.run_state() != RunState::Running {
            return Ok(());
        }
        self.halt()
    }

    /// Like [`stop`](Self::stop), then wait for the loop task to finish.
    pub async fn shutdown(&self) -> Result<()> {
        let worker = self.take_worker();
        let result = self.halt();
        if let Some(handle) = worker.and_then(|w| w.handle) {
            if let Err(err) = handle.await {
                warn!(machine = %self.shared.name, error = %err, "event loop task failed");
            }
        }
        result
    }

    /// Return to `Stopped`, clearing the last error, deferred events, the
    /// journal, recorded history and region state.
    pub fn reset(&self) {
        if self.run_state() != RunState::Stopped {
            if let Err(err) = self.halt() {
                warn!(machine = %self.shared.name, error = %err, "exit failed during reset");
            }
        }
        let _processing = lock(&self.shared.processing);
        read(&self.shared.topology).reset_runtime();
        {
            let mut status = lock(&self.shared.status);
            status.run_state = RunState::Stopped;
            status.current = None;
            status.last_error = None;
        }
        lock(&self.shared.journal).clear();
        lock(&self.shared.deferrer).clear();
        self.bump();
        debug!(machine = %self.shared.name, "machine reset");
    }

    /// Stop regardless of run-state: cancel the loop, wait for any in-flight
    /// event, exit the active chain.
    pub(crate) fn halt(&self) -> Result<()> {
        self.take_worker();
        let _processing = lock(&self.shared.processing);
        self.halt_locked()
    }

    /// Halt only if run `run` is still the live one. Used by a loop whose
    /// token was cancelled from outside.
    fn halt_run(&self, run: u64) -> Result<()> {
        let _processing = lock(&self.shared.processing);
        if !self.is_run(run) || self.run_state() != RunState::Running {
            return Ok(());
        }
        self.take_worker();
        self.halt_locked()
    }

    fn halt_locked(&self) -> Result<()> {
        let result = match self.current() {
            Some(top) => {
                let topology = read(&self.shared.topology);
                let ctx = self.context().unwrap_or_default();
                Step::new(self, &topology, &ctx).exit(top)
            }
            None => Ok(()),
        };
        lock(&self.shared.status).current = None;
        lock(&self.shared.deferrer).clear();

        match &result {
            Ok(()) => {
                lock(&self.shared.status).run_state = RunState::Stopped;
                info!(machine = %self.shared.name, "machine stopped");
                self.bump();
            }
            Err(err) => self.fail(err),
        }
        result
    }

    fn take_worker(&self) -> Option<Worker> {
        let worker = lock(&self.shared.worker).take();
        if let Some(worker) = &worker {
            worker.cancel.cancel();
        }
        worker
    }

    // Events

    /// Queue `event` for the processing loop. Never blocks.
    pub fn send_event(&self, event: impl Into<Event>) -> Result<()> {
        if self.run_state() != RunState::Running {
            return Err(MachineError::NotRunning(self.shared.name.clone()));
        }
        let sender = lock(&self.shared.worker)
            .as_ref()
            .map(|worker| worker.sender.clone())
            .ok_or_else(|| MachineError::NotRunning(self.shared.name.clone()))?;
        sender.try_send(event.into()).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => {
                MachineError::QueueFull(self.shared.name.clone())
            }
            mpsc::error::TrySendError::Closed(_) => {
                MachineError::NotRunning(self.shared.name.clone())
            }
        })
    }

    /// Process `event` on the caller's thread, bypassing the queue.
    ///
    /// Guards and actions see `ctx`. Deferred events are replayed before
    /// this returns.
    pub fn handle_event(&self, ctx: &Context, event: impl Into<Event>) -> Result<()> {
        let event = event.into();
        let _processing = lock(&self.shared.processing);
        if self.run_state() != RunState::Running {
            return Err(MachineError::NotRunning(self.shared.name.clone()));
        }
        self.process_locked(ctx, &event)
    }

    /// Process `event` with the machine's own context if it is running.
    /// Used by the loop and by owning states delivering events inward.
    pub(crate) fn dispatch(&self, event: &Event) -> Result<()> {
        let _processing = lock(&self.shared.processing);
        if self.run_state() != RunState::Running {
            return Ok(());
        }
        let ctx = self.context().unwrap_or_default();
        self.process_locked(&ctx, event)
    }

    fn process_locked(&self, ctx: &Context, event: &Event) -> Result<()> {
        let topology = read(&self.shared.topology);
        let result = Step::new(self, &topology, ctx)
            .process(event)
            .and_then(|processed| match processed {
                Processed::Transitioned => self.drain(&topology),
                Processed::Deferred | Processed::Unchanged => Ok(()),
            });
        drop(topology);

        self.bump();
        if let Err(err) = &result {
            self.fail(err);
        }
        result
    }

    /// Replay deferred events, oldest first, until a pass commits no
    /// transition. Events still deferred stay buffered in order.
    fn drain(&self, topology: &Topology) -> Result<()> {
        loop {
            let pending = lock(&self.shared.deferrer).take_all();
            if pending.is_empty() {
                return Ok(());
            }
            debug!(machine = %self.shared.name, count = pending.len(), "replaying deferred events");

            let mut progressed = false;
            let mut pending = pending.into_iter();
            while let Some(deferred) = pending.next() {
                if self.run_state() != RunState::Running {
                    let mut rest = vec![deferred];
                    rest.extend(pending);
                    lock(&self.shared.deferrer).requeue(rest);
                    return Ok(());
                }
                let processed = Step::new(self, topology, &deferred.context).process(&deferred.event)?;
                progressed |= processed == Processed::Transitioned;
            }
            if !progressed {
                return Ok(());
            }
        }
    }

    fn fail(&self, err: &MachineError) {
        {
            let mut status = lock(&self.shared.status);
            status.run_state = RunState::Error;
            status.last_error = Some(err.clone());
        }
        if let Some(worker) = lock(&self.shared.worker).as_ref() {
            worker.cancel.cancel();
        }
        error!(machine = %self.shared.name, error = %err, "machine failed");
        for observer in self.observers() {
            observer.on_error(&self.shared.name, err);
        }
        self.bump();
    }

    // Waiting

    /// Wait until `predicate` holds. Re-evaluated after every processed
    /// event and lifecycle change.
    pub async fn wait_until<F>(&self, predicate: F)
    where
        F: Fn(&StateMachine) -> bool,
    {
        let mut changes = self.shared.changes.subscribe();
        loop {
            if predicate(self) {
                return;
            }
            if changes.changed().await.is_err() {
                return;
            }
        }
    }

    /// Wait until the state at `path` is active.
    pub async fn wait_for_state(&self, path: &str) {
        self.wait_until(|machine| machine.is_active(path)).await;
    }

    pub async fn wait_for_run_state(&self, run_state: RunState) {
        self.wait_until(|machine| machine.run_state() == run_state).await;
    }

    // Introspection

    pub fn run_state(&self) -> RunState {
        lock(&self.shared.status).run_state
    }

    pub fn is_running(&self) -> bool {
        self.run_state() == RunState::Running
    }

    pub fn last_error(&self) -> Option<MachineError> {
        lock(&self.shared.status).last_error.clone()
    }

    /// Context bound at the last start.
    pub fn context(&self) -> Option<Context> {
        lock(&self.shared.status).context.clone()
    }

    /// Path of the active top-level state.
    pub fn current_state(&self) -> Option<String> {
        let current = self.current()?;
        Some(read(&self.shared.topology).path(current).to_string())
    }

    /// Paths of the active chain, outermost first.
    pub fn active_path(&self) -> Vec<String> {
        let Some(top) = self.current() else {
            return Vec::new();
        };
        let topology = read(&self.shared.topology);
        topology
            .chain_from(top)
            .into_iter()
            .map(|id| topology.path(id).to_string())
            .collect()
    }

    /// Path of the innermost active state of the top-level chain.
    pub fn active_leaf(&self) -> Option<String> {
        let top = self.current()?;
        let topology = read(&self.shared.topology);
        Some(topology.path(topology.leaf_from(top)).to_string())
    }

    /// Every active state, including those of active regions, which are
    /// reported as `parallel/region/path`.
    pub fn active_configuration(&self) -> Vec<String> {
        let Some(top) = self.current() else {
            return Vec::new();
        };
        let topology = read(&self.shared.topology);
        let mut configuration = Vec::new();
        for id in topology.chain_from(top) {
            let node = topology.node(id);
            configuration.push(node.path.clone());
            if let StateKind::Parallel(parallel) = &node.kind {
                for region in parallel.regions().iter().filter(|r| r.is_active()) {
                    configuration.extend(
                        region
                            .machine()
                            .active_configuration()
                            .into_iter()
                            .map(|path| format!("{}/{}/{}", node.path, region.name(), path)),
                    );
                }
            }
        }
        configuration
    }

    pub fn is_active(&self, path: &str) -> bool {
        let topology = read(&self.shared.topology);
        topology
            .lookup(path)
            .is_some_and(|id| topology.node(id).is_active())
    }

    pub fn deferred_len(&self) -> usize {
        lock(&self.shared.deferrer).len()
    }

    /// Copy of the committed transitions since the last reset.
    pub fn journal(&self) -> TransitionLog {
        lock(&self.shared.journal).clone()
    }

    pub fn state_count(&self) -> usize {
        read(&self.shared.topology).len()
    }

    /// Resolve the junction at `path` for a flow arriving from `from`.
    /// Returns the full path of the selected target, if any route matches.
    pub fn resolve_junction(&self, path: &str, from: &str, ctx: &Context) -> Result<Option<String>> {
        let topology = read(&self.shared.topology);
        let id = topology
            .lookup(path)
            .ok_or_else(|| MachineError::UnknownState(path.to_string()))?;
        let node = topology.node(id);
        let StateKind::Junction(junction) = &node.kind else {
            return Err(MachineError::UnknownState(path.to_string()));
        };
        match junction.resolve(from, ctx) {
            Some(target) => topology
                .resolve(node.parent, target)
                .map(|found| Some(topology.path(found).to_string()))
                .ok_or_else(|| MachineError::UnknownState(target.to_string())),
            None => Ok(None),
        }
    }

    /// Handle to the machine of region `region` of parallel state `parallel`.
    pub fn region(&self, parallel: &str, region: &str) -> Option<StateMachine> {
        let topology = read(&self.shared.topology);
        let id = topology.lookup(parallel)?;
        match &topology.node(id).kind {
            StateKind::Parallel(state) => state.find(region).map(|r| r.machine().clone()),
            _ => None,
        }
    }

    /// Mark a region completed and let the parallel state re-check its join.
    pub fn mark_region_completed(&self, parallel: &str, region: &str) -> Result<()> {
        {
            let topology = read(&self.shared.topology);
            let found = topology.lookup(parallel).and_then(|id| match &topology.node(id).kind {
                StateKind::Parallel(state) => state.find(region),
                _ => None,
            });
            let Some(found) = found else {
                return Err(MachineError::UnknownState(format!("{parallel}/{region}")));
            };
            found.mark_completed();
        }
        if self.is_running() {
            self.send_event(Event::completion(parallel))?;
        }
        Ok(())
    }

    // Crate-internal plumbing used by `Step` and the owning states.

    pub(crate) fn current(&self) -> Option<StateId> {
        lock(&self.shared.status).current
    }

    pub(crate) fn set_current(&self, current: Option<StateId>) {
        lock(&self.shared.status).current = current;
    }

    pub(crate) fn observers(&self) -> Vec<Arc<dyn Observer>> {
        read(&self.shared.observers).clone()
    }

    pub(crate) fn defer(&self, event: Event, ctx: Context) {
        lock(&self.shared.deferrer).push(event, ctx);
    }

    pub(crate) fn record(&self, record: TransitionRecord) {
        lock(&self.shared.journal).record(record);
    }

    /// Cancellation root for timers and activities of this run.
    pub(crate) fn cancellation(&self) -> Option<CancellationToken> {
        lock(&self.shared.worker)
            .as_ref()
            .map(|worker| worker.cancel.clone())
    }

    /// A final state was reached.
    pub(crate) fn complete(&self, state: &str) {
        lock(&self.shared.status).run_state = RunState::Completed;
        if let Some(worker) = lock(&self.shared.worker).as_ref() {
            worker.cancel.cancel();
        }
        info!(machine = %self.shared.name, state = %state, "machine completed");
    }

    /// Make completion and failure of this machine visible to `owner` as a
    /// completion event for the state at `path`.
    pub(crate) fn set_owner(&self, owner: WeakMachine, path: &str) {
        *lock(&self.shared.owner) = Some(Owner {
            machine: owner,
            path: path.to_string(),
        });
    }

    fn is_run(&self, run: u64) -> bool {
        lock(&self.shared.status).run == run
    }

    fn notify_owner(&self) {
        let Some(owner) = lock(&self.shared.owner).clone() else {
            return;
        };
        let Some(machine) = owner.machine.upgrade() else {
            return;
        };
        if let Err(err) = machine.send_event(Event::completion(&owner.path)) {
            warn!(
                machine = %self.shared.name,
                owner = %machine.name(),
                error = %err,
                "dropping completion notice"
            );
        }
    }

    fn bump(&self) {
        self.shared.changes.send_modify(|rev| *rev = rev.wrapping_add(1));
    }
}

impl std::fmt::Debug for StateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateMachine")
            .field("name", &self.shared.name)
            .field("run_state", &self.run_state())
            .field("current", &self.current_state())
            .finish()
    }
}

async fn run_loop(
    machine: WeakMachine,
    mut receiver: mpsc::Receiver<Event>,
    cancel: CancellationToken,
    run: u64,
) {
    loop {
        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            event = receiver.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };
        let Some(machine) = machine.upgrade() else {
            return;
        };
        if !machine.is_run(run) {
            return;
        }
        debug!(machine = %machine.name(), event = %event.name(), "processing event");
        if let Err(err) = machine.dispatch(&event) {
            debug!(machine = %machine.name(), error = %err, "event processing failed");
        }
    }

    let Some(machine) = machine.upgrade() else {
        return;
    };
    // Stopped and started again since this loop was spawned.
    if !machine.is_run(run) {
        return;
    }
    match machine.run_state() {
        RunState::Completed | RunState::Error => machine.notify_owner(),
        RunState::Running => {
            // The run's cancellation token was cancelled from outside.
            if let Err(err) = machine.halt_run(run) {
                warn!(machine = %machine.name(), error = %err, "exit failed after cancellation");
            }
        }
        RunState::Stopped => {}
    }
}
