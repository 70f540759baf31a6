//! Shared, thread-safe scratchpad for one machine run.

use super::event::Event;
use super::sync::{read, write};
use crate::engine::{StateMachine, WeakMachine};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio_util::sync::CancellationToken;

/// Run context handed to guards, actions and activities.
///
/// `Context` is a cheap handle: clones share the same data map, event slot
/// and engine binding. Use [`Context::fork`] to obtain an independent child
/// context for a region or nested machine.
///
/// The data map has its own lock, independent of any engine lock, so
/// actions may read and write it freely while a transition is in flight.
///
/// # Example
///
/// ```rust
/// use statecraft::Context;
///
/// let ctx = Context::new();
/// ctx.set("x", true);
/// assert!(ctx.flag("x"));
///
/// let child = ctx.fork();
/// child.set("x", false);
/// assert!(ctx.flag("x"));
/// ```
#[derive(Clone, Default)]
pub struct Context {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    data: RwLock<HashMap<String, Value>>,
    event: RwLock<Option<Event>>,
    machine: RwLock<Option<WeakMachine>>,
    cancel: CancellationToken,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context whose cancellation is driven by `token`.
    pub fn with_cancellation(token: CancellationToken) -> Self {
        Self {
            inner: Arc::new(Inner {
                cancel: token,
                ..Inner::default()
            }),
        }
    }

    /// Independent child context.
    ///
    /// Starts from a snapshot of this context's data, has an empty event
    /// slot, no engine binding, and a cancellation token that is cancelled
    /// whenever this context's token is.
    pub fn fork(&self) -> Self {
        Self {
            inner: Arc::new(Inner {
                data: RwLock::new(self.snapshot()),
                event: RwLock::new(None),
                machine: RwLock::new(None),
                cancel: self.inner.cancel.child_token(),
            }),
        }
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        write(&self.inner.data).insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        read(&self.inner.data).get(key).cloned()
    }

    /// Typed read; `None` when missing or not convertible.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get(key)
            .and_then(|value| serde_json::from_value(value).ok())
    }

    /// True only when `key` holds the boolean `true`.
    pub fn flag(&self, key: &str) -> bool {
        matches!(read(&self.inner.data).get(key), Some(Value::Bool(true)))
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        write(&self.inner.data).remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        read(&self.inner.data).contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = read(&self.inner.data).keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn snapshot(&self) -> HashMap<String, Value> {
        read(&self.inner.data).clone()
    }

    /// The event currently being processed, if any.
    pub fn event(&self) -> Option<Event> {
        read(&self.inner.event).clone()
    }

    pub(crate) fn set_event(&self, event: Option<Event>) {
        *write(&self.inner.event) = event;
    }

    /// The engine this context is bound to, while it is alive.
    pub fn machine(&self) -> Option<StateMachine> {
        read(&self.inner.machine)
            .as_ref()
            .and_then(WeakMachine::upgrade)
    }

    pub(crate) fn bind(&self, machine: WeakMachine) {
        *write(&self.inner.machine) = Some(machine);
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.inner.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("keys", &self.keys())
            .field("event", &self.event().map(|e| e.name().to_string()))
            .finish()
    }
}
