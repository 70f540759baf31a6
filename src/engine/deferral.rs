//! Buffer for deferred events.

use crate::core::{Context, Event};
use chrono::{DateTime, Utc};
use std::collections::VecDeque;

/// An event held back by a defer state, with the context it arrived with.
#[derive(Clone, Debug)]
pub struct DeferredEvent {
    pub event: Event,
    pub context: Context,
    pub deferred_at: DateTime<Utc>,
}

/// FIFO of deferred events.
#[derive(Debug, Default)]
pub struct EventDeferrer {
    queue: VecDeque<DeferredEvent>,
}

impl EventDeferrer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: Event, context: Context) {
        self.queue.push_back(DeferredEvent {
            event,
            context,
            deferred_at: Utc::now(),
        });
    }

    /// Remove and return everything buffered, oldest first.
    pub fn take_all(&mut self) -> Vec<DeferredEvent> {
        self.queue.drain(..).collect()
    }

    /// Put events back in front of anything buffered since, keeping their
    /// relative order.
    pub fn requeue(&mut self, events: Vec<DeferredEvent>) {
        for deferred in events.into_iter().rev() {
            self.queue.push_front(deferred);
        }
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }

    pub fn names(&self) -> Vec<&str> {
        self.queue.iter().map(|d| d.event.name()).collect()
    }
}
