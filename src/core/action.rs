//! Entry, exit and transition actions, plus do-activities.
//!
//! The helpers here are plain constructors; they capture everything they
//! need and take the run [`Context`] explicitly.

use super::context::Context;
use super::error::BoxError;
use super::guard::Guard;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub type ActionResult = Result<(), BoxError>;

/// Synchronous effect run on entry, exit, or while taking a transition.
pub type Action = Arc<dyn Fn(&Context) -> ActionResult + Send + Sync>;

pub type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Long-running behavior started after entry and cancelled on exit.
pub type Activity = Arc<dyn Fn(Context, CancellationToken) -> BoxFuture + Send + Sync>;

/// Wrap a closure as an [`Action`].
pub fn action<F>(f: F) -> Action
where
    F: Fn(&Context) -> ActionResult + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Action that stores `value` under `key`.
pub fn set_value(key: impl Into<String>, value: impl Into<Value>) -> Action {
    let key = key.into();
    let value = value.into();
    Arc::new(move |ctx: &Context| -> ActionResult {
        ctx.set(key.clone(), value.clone());
        Ok(())
    })
}

/// Action that increments an integer counter under `key`.
pub fn increment(key: impl Into<String>) -> Action {
    let key = key.into();
    Arc::new(move |ctx: &Context| -> ActionResult {
        let current = ctx.get_as::<i64>(&key).unwrap_or(0);
        ctx.set(key.clone(), current + 1);
        Ok(())
    })
}

/// Runs `actions` in order, stopping at the first failure.
pub fn sequence(actions: Vec<Action>) -> Action {
    Arc::new(move |ctx: &Context| actions.iter().try_for_each(|a| a(ctx)))
}

/// Runs `then` only while `guard` holds.
pub fn when(guard: Guard, then: Action) -> Action {
    Arc::new(move |ctx: &Context| if guard.check(ctx) { then(ctx) } else { Ok(()) })
}

/// Wrap an async closure as an [`Activity`].
pub fn activity<F, Fut>(f: F) -> Activity
where
    F: Fn(Context, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(move |ctx: Context, token: CancellationToken| -> BoxFuture {
        Box::pin(f(ctx, token))
    })
}
