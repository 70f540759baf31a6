//! Timeout states.

use crate::core::{Event, MachineError, Result, TIMEOUT_SOURCE_KEY};
use crate::engine::WeakMachine;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Default name of the event a timeout state posts.
pub const DEFAULT_TIMEOUT_EVENT: &str = "timeout";

/// Payload of a state that posts an event after it has been active for a
/// fixed duration.
///
/// The timer starts on entry and is cancelled on exit. When it fires, the
/// timeout event is queued on the owning machine like any other event. If
/// a target is configured and no declared transition consumes the event,
/// the state moves to that target.
#[derive(Clone, Debug)]
pub struct TimeoutState {
    after: Duration,
    event: String,
    target: Option<String>,
}

impl TimeoutState {
    pub fn new(after: Duration) -> Self {
        Self {
            after,
            event: DEFAULT_TIMEOUT_EVENT.to_string(),
            target: None,
        }
    }

    pub fn event(mut self, name: impl Into<String>) -> Self {
        self.event = name.into();
        self
    }

    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn after(&self) -> Duration {
        self.after
    }

    pub fn event_name(&self) -> &str {
        &self.event
    }

    pub fn target_name(&self) -> Option<&str> {
        self.target.as_deref()
    }

    /// True when `event` is the timeout this state armed at `path`.
    pub(crate) fn fired_by(&self, event: &Event, path: &str) -> bool {
        event.name() == self.event && event.meta(TIMEOUT_SOURCE_KEY).map_or(true, |s| s == path)
    }

    /// Start the one-shot timer. The returned token cancels it.
    pub(crate) fn arm(
        &self,
        path: &str,
        machine: WeakMachine,
        parent: &CancellationToken,
    ) -> Result<CancellationToken> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| MachineError::NoRuntime(path.to_string()))?;
        let token = parent.child_token();
        let cancelled = token.clone();
        let after = self.after;
        let event = Event::new(self.event.clone()).with_metadata(TIMEOUT_SOURCE_KEY, path);
        let source = path.to_string();

        runtime.spawn(async move {
            tokio::select! {
                _ = cancelled.cancelled() => {}
                _ = tokio::time::sleep(after) => {
                    let Some(machine) = machine.upgrade() else { return };
                    if let Err(err) = machine.send_event(event) {
                        tracing::warn!(state = %source, error = %err, "dropping timeout event");
                    }
                }
            }
        });

        Ok(token)
    }
}
