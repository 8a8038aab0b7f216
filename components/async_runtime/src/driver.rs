//! Step-function driver: sequential async code written as a resumable state
//! machine.
//!
//! The step function is called with the outcome of the value it last awaited
//! (`Ok(Undefined)` on the first call). It either awaits another value or
//! returns. A rejection of an awaited value comes back as `Err(reason)`, so
//! the step function can recover from it or pass it on by returning `Err`.
//!
//! # Examples
//!
//! ```
//! use async_runtime::{drive, EventLoop, Step};
//! use core_types::Value;
//!
//! let mut event_loop = EventLoop::new();
//! let mut total = 0;
//! let mut remaining = vec![Value::Smi(2), Value::Smi(1)];
//!
//! let result = drive(&event_loop.scheduler(), move |input| {
//!     if let Ok(Value::Smi(n)) = input {
//!         total += n;
//!     }
//!     Ok(match remaining.pop() {
//!         Some(next) => Step::Await(next),
//!         None => Step::Return(Value::Smi(total)),
//!     })
//! });
//!
//! event_loop.run_until_done().unwrap();
//! assert_eq!(result.value(), Some(Value::Smi(3)));
//! ```

use crate::promise::{Promise, Settlement};
use crate::scheduler::SchedulerRef;
use core_types::Value;
use std::cell::RefCell;
use std::rc::Rc;

/// What a step function does next.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Suspend until the value settles, then call the step function with its outcome
    Await(Value),
    /// Finish, resolving the driven promise with the value
    Return(Value),
}

struct Driver<F> {
    step: RefCell<F>,
    result: Promise,
}

impl<F> Driver<F>
where
    F: FnMut(Result<Value, Value>) -> Result<Step, Value> + 'static,
{
    fn resume(self: Rc<Self>, input: Result<Value, Value>) {
        let next = (*self.step.borrow_mut())(input);
        match next {
            Err(reason) => {
                tracing::trace!(promise = %self.result.id(), "driven steps threw");
                self.result.fail(reason);
            }
            Ok(Step::Return(value)) => self.result.settle(value),
            Ok(Step::Await(value)) => {
                let awaited = Promise::resolve_with(self.result.scheduler(), value);
                awaited.subscribe(move |settlement| match settlement {
                    Settlement::Fulfilled(value) => self.resume(Ok(value)),
                    Settlement::Rejected(reason) => self.resume(Err(reason)),
                });
            }
        }
    }
}

/// Runs `step` until it returns, awaiting each value it hands back.
///
/// The first call happens synchronously; every later call runs as a reaction
/// of the awaited value. The returned promise fulfills with the final
/// [`Step::Return`] value, or rejects with the first `Err` the step function
/// returns.
pub fn drive<F>(scheduler: &SchedulerRef, step: F) -> Promise
where
    F: FnMut(Result<Value, Value>) -> Result<Step, Value> + 'static,
{
    let result = Promise::pending(scheduler);
    let driver = Rc::new(Driver {
        step: RefCell::new(step),
        result: result.clone(),
    });
    driver.resume(Ok(Value::Undefined));
    result
}
