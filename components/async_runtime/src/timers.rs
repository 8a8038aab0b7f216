//! Timer-backed promises.
//!
//! These helpers live on top of the event loop's virtual clock. `timeout` is
//! the race-against-a-timer pattern, with the timer cleared once the input
//! settles first.

use crate::event_loop::LoopHandle;
use crate::promise::Promise;
use crate::task_queue::Task;
use core_types::{ErrorKind, JsError, Value};

/// A promise that fulfills with `value` after `ms` milliseconds.
pub fn delay(handle: &LoopHandle, ms: u64, value: impl Into<Value>) -> Promise {
    let (promise, settle, _) = Promise::with_resolvers(&handle.scheduler());
    let value = value.into();
    handle.set_timeout(
        ms,
        Task::new(move || {
            settle.call(value);
            Ok(Value::Undefined)
        }),
    );
    promise
}

/// A promise that rejects with `reason` after `ms` milliseconds.
pub fn reject_after(handle: &LoopHandle, ms: u64, reason: impl Into<Value>) -> Promise {
    let (promise, _, fail) = Promise::with_resolvers(&handle.scheduler());
    let reason = reason.into();
    handle.set_timeout(
        ms,
        Task::new(move || {
            fail.call(reason);
            Ok(Value::Undefined)
        }),
    );
    promise
}

/// Settles like `promise`, or rejects with an `Error` if `promise` is still
/// pending after `ms` milliseconds.
pub fn timeout(handle: &LoopHandle, promise: &Promise, ms: u64) -> Promise {
    let (result, _settle, expire) = Promise::with_resolvers(&handle.scheduler());

    let timer = handle.set_timeout(
        ms,
        Task::new(move || {
            tracing::debug!(ms, "promise timed out");
            expire.call(JsError::new(
                ErrorKind::Error,
                format!("operation timed out after {ms}ms"),
            ));
            Ok(Value::Undefined)
        }),
    );

    let loop_handle = handle.clone();
    promise.subscribe_into(&result, move |settlement, target| {
        loop_handle.clear_timeout(timer);
        target.complete(settlement);
    });
    result
}
