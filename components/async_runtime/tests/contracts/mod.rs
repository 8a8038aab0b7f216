//! Contract tests for async_runtime component
//!
//! These tests pin the public surface other components build on: the
//! scheduler contract, promise construction and inspection, combinators and
//! the event loop.

use async_runtime::{
    EventLoop, Fail, Handler, MicroTask, Promise, PromiseId, PromiseState, RuntimeError,
    Scheduler, SchedulerRef, Settle, Settlement, Task,
};
use core_types::{ErrorKind, JsError, Value};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// The smallest valid scheduler: a bare FIFO queue, drained by hand.
#[derive(Default)]
struct BareQueue {
    queue: RefCell<VecDeque<MicroTask>>,
}

impl Scheduler for BareQueue {
    fn enqueue(&self, task: MicroTask) {
        self.queue.borrow_mut().push_back(task);
    }
}

impl BareQueue {
    fn drain(&self) -> usize {
        let mut ran = 0;
        loop {
            let next = self.queue.borrow_mut().pop_front();
            match next {
                Some(task) => {
                    task.run().unwrap();
                    ran += 1;
                }
                None => return ran,
            }
        }
    }
}

mod scheduler_contract {
    use super::*;

    #[test]
    fn any_fifo_queue_is_a_scheduler() {
        let queue = Rc::new(BareQueue::default());
        let scheduler: SchedulerRef = queue.clone();

        let promise = Promise::resolve_with(&scheduler, 1);
        let derived = promise.then(Some(Handler::new(|v| Ok(v))), None);
        assert_eq!(derived.state(), PromiseState::Pending);

        assert_eq!(queue.drain(), 1);
        assert_eq!(derived.value(), Some(Value::Smi(1)));
    }

    #[test]
    fn one_enqueue_per_reaction_firing() {
        let queue = Rc::new(BareQueue::default());
        let scheduler: SchedulerRef = queue.clone();

        let promise = Promise::pending(&scheduler);
        for _ in 0..3 {
            promise.then(None, None);
        }
        assert_eq!(queue.queue.borrow().len(), 0);

        promise.settle(());
        assert_eq!(queue.queue.borrow().len(), 3);
    }

    #[test]
    fn rejection_tracking_is_optional() {
        let queue = Rc::new(BareQueue::default());
        let scheduler: SchedulerRef = queue.clone();
        let promise = Promise::reject_with(&scheduler, "fine");
        assert_eq!(promise.state(), PromiseState::Rejected);
        assert_eq!(queue.drain(), 0);
    }
}

mod promise_contract {
    use super::*;

    #[test]
    fn producer_receives_settle_and_fail() {
        let event_loop = EventLoop::new();
        let promise = Promise::new(&event_loop.scheduler(), |settle: Settle, fail: Fail| {
            let _ = fail;
            settle.call(Value::Null);
            Ok(())
        });
        assert_eq!(promise.value(), Some(Value::Null));
    }

    #[test]
    fn ids_are_unique() {
        let event_loop = EventLoop::new();
        let scheduler = event_loop.scheduler();
        let a: PromiseId = Promise::pending(&scheduler).id();
        let b: PromiseId = Promise::pending(&scheduler).id();
        assert_ne!(a, b);
    }

    #[test]
    fn clones_share_one_instance() {
        let event_loop = EventLoop::new();
        let promise = Promise::pending(&event_loop.scheduler());
        let clone = promise.clone();
        clone.settle(5);
        assert_eq!(promise.value(), Some(Value::Smi(5)));
        assert!(promise.ptr_eq(&clone));
    }

    #[test]
    fn settlement_converts_to_result() {
        assert_eq!(Settlement::Fulfilled(Value::Smi(1)).into_result(), Ok(Value::Smi(1)));
        assert_eq!(Settlement::Rejected(Value::Null).into_result(), Err(Value::Null));
    }

    #[test]
    fn promise_converts_to_thenable_value() {
        let event_loop = EventLoop::new();
        let promise = Promise::pending(&event_loop.scheduler());
        let value: Value = promise.clone().into();
        assert_eq!(value.type_of(), "object");
        assert!(value.as_thenable().is_some());
        assert_eq!(Promise::from_value(&value), Some(promise));
    }
}

mod event_loop_contract {
    use super::*;

    #[test]
    fn event_loop_enqueue_task_accepts_task() {
        let mut event_loop = EventLoop::new();
        event_loop.enqueue_task(Task::new(|| Ok(Value::Undefined)));
        assert!(!event_loop.is_task_queue_empty());
    }

    #[test]
    fn event_loop_run_until_done_returns_result() {
        let mut event_loop = EventLoop::new();
        let result: Result<(), RuntimeError> = event_loop.run_until_done();
        assert!(result.is_ok());
    }

    #[test]
    fn runtime_errors_convert_to_reasons() {
        let err = RuntimeError::TaskFailed(JsError::new(ErrorKind::RangeError, "too deep"));
        let js: JsError = err.into();
        assert_eq!(js.kind, ErrorKind::RangeError);
        assert_eq!(js.message, "too deep");
    }
}
