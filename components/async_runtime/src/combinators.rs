//! Promise combinators: `all`, `race`, `all_settled` and `any`.
//!
//! Every input goes through [`Promise::resolve_with`] first, so plain values,
//! promises and foreign thenables can be mixed freely. Inputs are observed,
//! never cancelled: once the combined promise is settled, later outcomes are
//! ignored.

use crate::promise::{Promise, Settlement};
use crate::scheduler::SchedulerRef;
use core_types::{JsError, Value};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Message carried by the `AggregateError` of [`any`].
pub const ALL_REJECTED_MESSAGE: &str = "All promises were rejected";

/// Per-input slots shared by the observers of one combinator call.
struct Gather {
    slots: RefCell<Vec<Value>>,
    remaining: Cell<usize>,
}

impl Gather {
    fn new(len: usize) -> Rc<Self> {
        Rc::new(Gather {
            slots: RefCell::new(vec![Value::Undefined; len]),
            remaining: Cell::new(len),
        })
    }

    /// Stores the value for `index`. Returns all slots once every input reported.
    fn fill(&self, index: usize, value: Value) -> Option<Vec<Value>> {
        self.slots.borrow_mut()[index] = value;
        let remaining = self.remaining.get() - 1;
        self.remaining.set(remaining);
        if remaining == 0 {
            Some(std::mem::take(&mut *self.slots.borrow_mut()))
        } else {
            None
        }
    }
}

fn resolve_inputs<I>(scheduler: &SchedulerRef, inputs: I) -> Vec<Promise>
where
    I: IntoIterator,
    I::Item: Into<Value>,
{
    inputs
        .into_iter()
        .map(|input| Promise::resolve_with(scheduler, input))
        .collect()
}

/// Fulfills with the array of all fulfillment values, in input order, or
/// rejects with the first rejection reason.
///
/// An empty input fulfills with an empty array.
pub fn all<I>(scheduler: &SchedulerRef, inputs: I) -> Promise
where
    I: IntoIterator,
    I::Item: Into<Value>,
{
    let inputs = resolve_inputs(scheduler, inputs);
    let combined = Promise::pending(scheduler);
    if inputs.is_empty() {
        combined.settle(Value::Array(Vec::new()));
        return combined;
    }

    let gather = Gather::new(inputs.len());
    for (index, input) in inputs.iter().enumerate() {
        let gather = gather.clone();
        input.subscribe_into(&combined, move |settlement, target| match settlement {
            Settlement::Fulfilled(value) => {
                if let Some(values) = gather.fill(index, value) {
                    target.settle(Value::Array(values));
                }
            }
            Settlement::Rejected(reason) => target.fail(reason),
        });
    }
    combined
}

/// Settles like the first input to settle.
///
/// An empty input never settles.
pub fn race<I>(scheduler: &SchedulerRef, inputs: I) -> Promise
where
    I: IntoIterator,
    I::Item: Into<Value>,
{
    let combined = Promise::pending(scheduler);
    for input in resolve_inputs(scheduler, inputs) {
        input.subscribe_into(&combined, |settlement, target| target.complete(settlement));
    }
    combined
}

/// Fulfills, once every input has settled, with one outcome record per input
/// (see [`Settlement::into_record`]). Never rejects.
pub fn all_settled<I>(scheduler: &SchedulerRef, inputs: I) -> Promise
where
    I: IntoIterator,
    I::Item: Into<Value>,
{
    let inputs = resolve_inputs(scheduler, inputs);
    let combined = Promise::pending(scheduler);
    if inputs.is_empty() {
        combined.settle(Value::Array(Vec::new()));
        return combined;
    }

    let gather = Gather::new(inputs.len());
    for (index, input) in inputs.iter().enumerate() {
        let gather = gather.clone();
        input.subscribe_into(&combined, move |settlement, target| {
            if let Some(records) = gather.fill(index, settlement.into_record()) {
                target.settle(Value::Array(records));
            }
        });
    }
    combined
}

/// Fulfills with the first fulfillment value. If every input rejects, rejects
/// with an `AggregateError` holding the reasons in input order.
///
/// An empty input rejects right away.
pub fn any<I>(scheduler: &SchedulerRef, inputs: I) -> Promise
where
    I: IntoIterator,
    I::Item: Into<Value>,
{
    let inputs = resolve_inputs(scheduler, inputs);
    let combined = Promise::pending(scheduler);
    if inputs.is_empty() {
        combined.fail(JsError::aggregate(ALL_REJECTED_MESSAGE, Vec::new()));
        return combined;
    }

    let gather = Gather::new(inputs.len());
    for (index, input) in inputs.iter().enumerate() {
        let gather = gather.clone();
        input.subscribe_into(&combined, move |settlement, target| match settlement {
            Settlement::Fulfilled(value) => target.settle(value),
            Settlement::Rejected(reason) => {
                if let Some(reasons) = gather.fill(index, reason) {
                    target.fail(JsError::aggregate(ALL_REJECTED_MESSAGE, reasons));
                }
            }
        });
    }
    combined
}
