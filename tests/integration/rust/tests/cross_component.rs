//! Cross-component tests: core_types thenables and errors flowing through
//! async_runtime promises, combinators and the unhandled rejection hook.

use async_runtime::logging::{self, LogLevel};
use async_runtime::timers::{delay, timeout};
use async_runtime::{
    any, on_unhandled_rejection, remove_unhandled_rejection_hook, EventLoop, Promise, PromiseId,
};
use core_types::{ErrorKind, JsError, SettleCallback, Thenable, Value};
use integration_tests::{drain, s};
use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::{Arc, Mutex};

/// A host object that completes when the host says so, like a pending I/O handle.
#[derive(Default)]
struct HostRequest {
    waiters: RefCell<Vec<(SettleCallback, SettleCallback)>>,
}

impl std::fmt::Debug for HostRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HostRequest({} waiters)", self.waiters.borrow().len())
    }
}

impl HostRequest {
    fn fail(&self, err: JsError) {
        let waiters = std::mem::take(&mut *self.waiters.borrow_mut());
        for (_, on_rejected) in waiters {
            on_rejected(Value::Error(err.clone()));
        }
    }
}

impl Thenable for HostRequest {
    fn then(&self, on_fulfilled: SettleCallback, on_rejected: SettleCallback) -> Result<(), Value> {
        self.waiters.borrow_mut().push((on_fulfilled, on_rejected));
        Ok(())
    }

    fn into_any(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }

    fn class_name(&self) -> &'static str {
        "HostRequest"
    }
}

#[test]
fn host_thenable_failure_reaches_any_as_aggregate() {
    logging::init_for_tests(LogLevel::Debug);
    let mut event_loop = EventLoop::new();
    let scheduler = event_loop.scheduler();
    let request = Rc::new(HostRequest::default());

    let combined = any(
        &scheduler,
        vec![
            Value::Thenable(request.clone()),
            Value::from(Promise::reject_with(&scheduler, "cache miss")),
        ],
    );
    let _ = combined.catch(Ok);

    drain(&mut event_loop);
    request.fail(JsError::new(ErrorKind::Error, "connection reset"));
    drain(&mut event_loop);

    match combined.reason() {
        Some(Value::Error(err)) => {
            assert_eq!(err.kind, ErrorKind::AggregateError);
            assert_eq!(err.errors.len(), 2);
            assert_eq!(err.errors[0].to_string(), "Error: connection reset");
            assert_eq!(err.errors[1], s("cache miss"));
        }
        other => panic!("expected AggregateError, got {:?}", other),
    }
}

#[test]
fn unhandled_rejection_hook_sees_timer_failure() {
    logging::init_for_tests(LogLevel::Debug);
    let mut event_loop = EventLoop::new();
    let handle = event_loop.handle();
    let never = Promise::pending(&event_loop.scheduler());
    let guarded = timeout(&handle, &never, 30);

    let target: PromiseId = guarded.id();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let s2 = seen.clone();
    let hook = on_unhandled_rejection(move |reason, promise| {
        if promise.id() == target {
            s2.lock().unwrap().push(reason.to_string());
        }
    });

    drain(&mut event_loop);
    remove_unhandled_rejection_hook(hook);

    assert_eq!(
        *seen.lock().unwrap(),
        vec!["Error: operation timed out after 30ms".to_string()]
    );
}

#[test]
fn promise_value_displays_as_object() {
    let mut event_loop = EventLoop::new();
    let promise = delay(&event_loop.handle(), 1, Value::Null);
    assert_eq!(Value::from(&promise).to_string(), "[object Promise]");
    drain(&mut event_loop);
    assert_eq!(promise.value(), Some(Value::Null));
}
