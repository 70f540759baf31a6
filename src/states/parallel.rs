//! Parallel states and their regions.

use crate::core::{Context, Event, MachineError, Result};
use crate::engine::{RunState, StateMachine, WeakMachine};
use std::sync::atomic::{AtomicBool, Ordering};

/// One orthogonal region: a named, independently looped machine.
pub struct Region {
    name: String,
    machine: StateMachine,
    completed: AtomicBool,
    active: AtomicBool,
}

impl Region {
    pub fn new(name: impl Into<String>, machine: StateMachine) -> Self {
        Self {
            name: name.into(),
            machine,
            completed: AtomicBool::new(false),
            active: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn machine(&self) -> &StateMachine {
        &self.machine
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Completed when the region machine reached a final state or the
    /// region was marked completed explicitly.
    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::Acquire) || self.machine.run_state() == RunState::Completed
    }

    pub fn mark_completed(&self) {
        self.completed.store(true, Ordering::Release);
    }

    fn wrap(&self, source: MachineError) -> MachineError {
        MachineError::Region {
            region: self.name.clone(),
            source: Box::new(source),
        }
    }
}

impl std::fmt::Debug for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Region")
            .field("name", &self.name)
            .field("active", &self.is_active())
            .field("completed", &self.is_completed())
            .finish()
    }
}

/// Payload of a parallel state.
///
/// Each region owns a machine that is started when the parallel state is
/// entered and stopped when it exits. Events reaching the parallel state
/// are broadcast to every active region; once all regions are completed
/// the parallel state moves to its join target, if one is configured.
///
/// Regions run on their own loops and no ordering is guaranteed between
/// them. Each region gets a forked copy of the context.
///
/// Broadcast is synchronous: each region processes the event under its own
/// processing lock before the next region sees it, so the join check that
/// follows sees every region's outcome for this event.
#[derive(Default)]
pub struct ParallelState {
    regions: Vec<Region>,
    join: Option<String>,
}

impl ParallelState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn region(mut self, name: impl Into<String>, machine: StateMachine) -> Self {
        self.regions.push(Region::new(name, machine));
        self
    }

    pub fn join(mut self, target: impl Into<String>) -> Self {
        self.join = Some(target.into());
        self
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn find(&self, name: &str) -> Option<&Region> {
        self.regions.iter().find(|r| r.name == name)
    }

    pub fn join_target(&self) -> Option<&str> {
        self.join.as_deref()
    }

    pub fn all_completed(&self) -> bool {
        !self.regions.is_empty() && self.regions.iter().all(Region::is_completed)
    }

    pub(crate) fn enter(&self, path: &str, ctx: &Context, owner: &WeakMachine) -> Result<()> {
        for region in &self.regions {
            region.completed.store(false, Ordering::Release);
            region.machine.set_owner(owner.clone(), path);
            region
                .machine
                .start(ctx.fork())
                .map_err(|err| region.wrap(err))?;
            region.active.store(true, Ordering::Release);
        }
        Ok(())
    }

    /// Deliver `event` to every active region, in declaration order.
    /// Completion notices are addressed to this state and not forwarded.
    pub(crate) fn broadcast(&self, event: &Event) -> Result<()> {
        if event.is_completion() {
            return Ok(());
        }
        for region in self.regions.iter().filter(|r| r.is_active()) {
            region
                .machine
                .dispatch(event)
                .map_err(|err| region.wrap(err))?;
        }
        Ok(())
    }

    /// First active region whose machine ended in the `Error` run-state.
    pub(crate) fn failure(&self) -> Option<MachineError> {
        self.regions
            .iter()
            .filter(|r| r.is_active() && r.machine.run_state() == RunState::Error)
            .map(|r| {
                let source = r
                    .machine
                    .last_error()
                    .unwrap_or_else(|| MachineError::NotRunning(r.machine.name().to_string()));
                r.wrap(source)
            })
            .next()
    }

    /// Stop every active region. All regions are stopped even if one fails;
    /// the first failure is returned.
    pub(crate) fn exit(&self) -> Result<()> {
        let mut failure = None;
        for region in self.regions.iter().filter(|r| r.is_active()) {
            if let Err(err) = region.machine.halt() {
                failure.get_or_insert_with(|| region.wrap(err));
            }
            region.active.store(false, Ordering::Release);
        }
        failure.map_or(Ok(()), Err)
    }

    pub(crate) fn reset(&self) {
        for region in &self.regions {
            region.machine.reset();
            region.completed.store(false, Ordering::Release);
            region.active.store(false, Ordering::Release);
        }
    }
}
