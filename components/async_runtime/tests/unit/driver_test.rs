//! Unit tests for the step-function driver

use crate::new_log;
use async_runtime::timers::{delay, reject_after};
use async_runtime::{drive, EventLoop, Promise, PromiseState, Step};
use core_types::Value;

#[test]
fn awaited_values_feed_the_next_step() {
    let mut event_loop = EventLoop::new();
    let handle = event_loop.handle();
    let seen = new_log();

    let log = seen.clone();
    let mut stage = 0;
    let result = drive(&event_loop.scheduler(), move |input| {
        log.borrow_mut().push(input.clone().unwrap_or(Value::Null));
        stage += 1;
        Ok(match stage {
            1 => Step::Await(Value::Smi(1)),
            2 => Step::Await(delay(&handle, 10, "later").into()),
            _ => Step::Return(Value::from("done")),
        })
    });

    assert_eq!(*seen.borrow(), vec![Value::Undefined]);
    event_loop.run_until_done().unwrap();

    assert_eq!(
        *seen.borrow(),
        vec![Value::Undefined, Value::Smi(1), Value::from("later")]
    );
    assert_eq!(result.value(), Some(Value::from("done")));
    assert_eq!(event_loop.now_ms(), 10);
}

#[test]
fn rejection_is_routed_back_into_the_step() {
    let mut event_loop = EventLoop::new();
    let handle = event_loop.handle();

    let mut stage = 0;
    let result = drive(&event_loop.scheduler(), move |input| {
        stage += 1;
        match (stage, input) {
            (1, _) => Ok(Step::Await(reject_after(&handle, 5, "disk full").into())),
            (_, Err(reason)) => Ok(Step::Return(Value::from(format!("recovered: {reason}")))),
            (_, Ok(value)) => Ok(Step::Return(value)),
        }
    });

    event_loop.run_until_done().unwrap();
    assert_eq!(result.value(), Some(Value::from("recovered: disk full")));
}

#[test]
fn uncaught_error_rejects_the_result() {
    let mut event_loop = EventLoop::new();
    let scheduler = event_loop.scheduler();

    let failing = Promise::reject_with(&scheduler, "boom");
    let mut first = true;
    let result = drive(&scheduler, move |input| {
        if std::mem::take(&mut first) {
            return Ok(Step::Await(failing.clone().into()));
        }
        input.map(Step::Return)
    });
    let _ = result.catch(Ok);

    event_loop.run_until_done().unwrap();
    assert_eq!(result.reason(), Some(Value::from("boom")));
}

#[test]
fn error_on_first_step_rejects_without_running_the_loop() {
    let event_loop = EventLoop::new();
    let result = drive(&event_loop.scheduler(), |_| Err(Value::from("early")));
    assert_eq!(result.state(), PromiseState::Rejected);
    assert_eq!(result.reason(), Some(Value::from("early")));
}

#[test]
fn returned_promise_is_adopted() {
    let mut event_loop = EventLoop::new();
    let handle = event_loop.handle();

    let result = drive(&event_loop.scheduler(), move |_| {
        Ok(Step::Return(delay(&handle, 3, 42).into()))
    });

    event_loop.run_until_done().unwrap();
    assert_eq!(result.value(), Some(Value::Smi(42)));
}
