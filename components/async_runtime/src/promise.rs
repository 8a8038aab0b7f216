//! Promise implementation following the Promise/A+ specification.
//!
//! A [`Promise`] is a cheap handle to a shared, single-threaded state machine:
//!
//! - state moves from pending to fulfilled or rejected exactly once;
//! - the result never changes after that;
//! - reactions run on the [`Scheduler`](crate::Scheduler), never inside the
//!   call that triggered them, and in registration order per promise.
//!
//! Resolving a promise with another promise (or any [`Thenable`]) makes it
//! adopt that value's eventual outcome instead of fulfilling with it.

use crate::error::RuntimeError;
use crate::scheduler::SchedulerRef;
use crate::task_queue::MicroTask;
use core_types::{SettleCallback, Thenable, Value};
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_PROMISE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of a promise instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PromiseId(u64);

impl PromiseId {
    fn next() -> Self {
        PromiseId(NEXT_PROMISE_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[cfg(test)]
    pub(crate) fn from_raw(raw: u64) -> Self {
        PromiseId(raw)
    }

    /// The numeric value of this id.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PromiseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The state of a Promise.
///
/// Once settled (Fulfilled or Rejected), a Promise cannot change state.
/// A promise that is following another one still reports `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromiseState {
    /// The initial state; the promise is neither fulfilled nor rejected.
    Pending,
    /// The promise has been resolved with a value.
    Fulfilled,
    /// The promise has been rejected with a reason.
    Rejected,
}

/// The terminal outcome of a promise.
#[derive(Debug, Clone, PartialEq)]
pub enum Settlement {
    /// Fulfilled with a value
    Fulfilled(Value),
    /// Rejected with a reason
    Rejected(Value),
}

impl Settlement {
    /// Converts into a `Result`, mapping rejection to `Err`.
    pub fn into_result(self) -> Result<Value, Value> {
        match self {
            Settlement::Fulfilled(value) => Ok(value),
            Settlement::Rejected(reason) => Err(reason),
        }
    }

    /// The outcome record reported by `all_settled`:
    /// `{status: "fulfilled", value}` or `{status: "rejected", reason}`.
    pub fn into_record(self) -> Value {
        match self {
            Settlement::Fulfilled(value) => {
                Value::object([("status", Value::from("fulfilled")), ("value", value)])
            }
            Settlement::Rejected(reason) => {
                Value::object([("status", Value::from("rejected")), ("reason", reason)])
            }
        }
    }

    /// Reads an outcome record back. `None` if `record` is not one.
    pub fn from_record(record: &Value) -> Option<Settlement> {
        match record.get("status") {
            Some(Value::String(status)) if status == "fulfilled" => {
                record.get("value").cloned().map(Settlement::Fulfilled)
            }
            Some(Value::String(status)) if status == "rejected" => {
                record.get("reason").cloned().map(Settlement::Rejected)
            }
            _ => None,
        }
    }

    fn state(&self) -> PromiseState {
        match self {
            Settlement::Fulfilled(_) => PromiseState::Fulfilled,
            Settlement::Rejected(_) => PromiseState::Rejected,
        }
    }
}

/// A reaction handler registered via [`Promise::then`].
///
/// `Ok` resolves the derived promise (adopting promises and thenables),
/// `Err` rejects it; returning `Err` is how a handler throws.
pub struct Handler {
    callback: Box<dyn FnOnce(Value) -> Result<Value, Value>>,
}

impl Handler {
    /// Creates a new Handler from a closure.
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce(Value) -> Result<Value, Value> + 'static,
    {
        Self {
            callback: Box::new(f),
        }
    }

    /// Calls the handler with the settled value or reason.
    pub fn call(self, arg: Value) -> Result<Value, Value> {
        (self.callback)(arg)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handler {{ ... }}")
    }
}

/// A reaction to be triggered when a Promise settles.
///
/// The promise the reaction resolves is held here rather than inside the job,
/// so dropping an unsettled chain can release it link by link.
pub(crate) struct PromiseReaction {
    derived: Option<Promise>,
    job: Box<dyn FnOnce(Settlement, Option<Promise>)>,
}

impl PromiseReaction {
    fn observer<F>(job: F) -> Self
    where
        F: FnOnce(Settlement) + 'static,
    {
        Self {
            derived: None,
            job: Box::new(move |settlement, _| job(settlement)),
        }
    }

    fn resolving<F>(derived: &Promise, job: F) -> Self
    where
        F: FnOnce(Settlement, Promise) + 'static,
    {
        Self {
            derived: Some(derived.clone()),
            job: Box::new(move |settlement, derived| {
                if let Some(derived) = derived {
                    job(settlement, derived);
                }
            }),
        }
    }

    fn run(self, settlement: Settlement) {
        (self.job)(settlement, self.derived)
    }
}

fn take_derived(reactions: &mut Vec<PromiseReaction>) -> Vec<Promise> {
    reactions.drain(..).filter_map(|reaction| reaction.derived).collect()
}

enum Slot {
    Pending,
    /// Locked in to follow another promise or a foreign thenable.
    Delegated(Delegate),
    Fulfilled(Value),
    Rejected(Value),
}

enum Delegate {
    Promise(Weak<PromiseCell>),
    Thenable,
}

pub(crate) struct PromiseCell {
    id: PromiseId,
    slot: RefCell<Slot>,
    reactions: RefCell<Vec<PromiseReaction>>,
    handled: Cell<bool>,
    scheduler: SchedulerRef,
    this: Weak<PromiseCell>,
}

impl Drop for PromiseCell {
    // Unwinds a chain of pending derived promises iteratively; letting each
    // link drop the next would recurse once per link.
    fn drop(&mut self) {
        let mut pending = take_derived(self.reactions.get_mut());
        while let Some(promise) = pending.pop() {
            if Rc::strong_count(&promise.cell) == 1 {
                let next = take_derived(&mut promise.cell.reactions.borrow_mut());
                pending.extend(next);
            }
        }
    }
}

/// A JavaScript Promise.
///
/// Cloning a `Promise` clones the handle; both handles observe the same
/// instance.
///
/// # Examples
///
/// ```
/// use async_runtime::{EventLoop, Handler, Promise, PromiseState};
/// use core_types::Value;
/// use std::cell::RefCell;
/// use std::rc::Rc;
///
/// let mut event_loop = EventLoop::new();
/// let scheduler = event_loop.scheduler();
///
/// let promise = Promise::new(&scheduler, |settle, _fail| {
///     settle.call(1);
///     Ok(())
/// });
/// assert_eq!(promise.state(), PromiseState::Fulfilled);
///
/// let seen = Rc::new(RefCell::new(None));
/// let s = seen.clone();
/// promise.then(
///     Some(Handler::new(move |v| {
///         *s.borrow_mut() = Some(v.clone());
///         Ok(v)
///     })),
///     None,
/// );
///
/// // Reactions never run synchronously.
/// assert!(seen.borrow().is_none());
/// event_loop.run_until_done().unwrap();
/// assert_eq!(*seen.borrow(), Some(Value::Smi(1)));
/// ```
#[derive(Clone)]
pub struct Promise {
    cell: Rc<PromiseCell>,
}

/// The fulfill capability handed to a producer.
#[derive(Clone, Debug)]
pub struct Settle {
    promise: Promise,
}

impl Settle {
    /// Resolves the promise. No-op once the promise is resolved.
    pub fn call(&self, value: impl Into<Value>) {
        self.promise.settle(value);
    }
}

/// The reject capability handed to a producer.
#[derive(Clone, Debug)]
pub struct Fail {
    promise: Promise,
}

impl Fail {
    /// Rejects the promise. No-op once the promise is resolved.
    pub fn call(&self, reason: impl Into<Value>) {
        self.promise.fail(reason);
    }
}

impl Promise {
    /// Creates a promise and synchronously runs `producer` with its
    /// settle/fail capabilities.
    ///
    /// An `Err` returned by the producer rejects the promise, unless the
    /// producer already resolved it.
    pub fn new<P>(scheduler: &SchedulerRef, producer: P) -> Promise
    where
        P: FnOnce(Settle, Fail) -> Result<(), Value>,
    {
        let promise = Promise::pending(scheduler);
        let settle = Settle {
            promise: promise.clone(),
        };
        let fail = Fail {
            promise: promise.clone(),
        };
        if let Err(reason) = producer(settle, fail) {
            tracing::debug!(promise = %promise.id(), "producer threw");
            promise.fail(reason);
        }
        promise
    }

    /// Creates a pending promise with no producer.
    pub fn pending(scheduler: &SchedulerRef) -> Promise {
        let cell = Rc::new_cyclic(|this| PromiseCell {
            id: PromiseId::next(),
            slot: RefCell::new(Slot::Pending),
            reactions: RefCell::new(Vec::new()),
            handled: Cell::new(false),
            scheduler: scheduler.clone(),
            this: this.clone(),
        });
        tracing::trace!(promise = %cell.id, "promise created");
        Promise { cell }
    }

    /// Creates a pending promise together with its capabilities.
    pub fn with_resolvers(scheduler: &SchedulerRef) -> (Promise, Settle, Fail) {
        let promise = Promise::pending(scheduler);
        let settle = Settle {
            promise: promise.clone(),
        };
        let fail = Fail {
            promise: promise.clone(),
        };
        (promise, settle, fail)
    }

    /// Returns `value` unchanged if it already is a promise, a promise
    /// adopting it if it is a thenable, or a promise fulfilled with it.
    pub fn resolve_with(scheduler: &SchedulerRef, value: impl Into<Value>) -> Promise {
        let value = value.into();
        if let Some(promise) = Promise::from_value(&value) {
            return promise;
        }
        let promise = Promise::pending(scheduler);
        promise.settle(value);
        promise
    }

    /// Returns a new promise rejected with `reason`, verbatim.
    pub fn reject_with(scheduler: &SchedulerRef, reason: impl Into<Value>) -> Promise {
        let promise = Promise::pending(scheduler);
        promise.fail(reason);
        promise
    }

    /// Runs `f` synchronously and wraps its outcome in a promise.
    pub fn attempt<F>(scheduler: &SchedulerRef, f: F) -> Promise
    where
        F: FnOnce() -> Result<Value, Value>,
    {
        let promise = Promise::pending(scheduler);
        match f() {
            Ok(value) => promise.settle(value),
            Err(reason) => promise.fail(reason),
        }
        promise
    }

    /// Recovers the promise behind a value, if there is one.
    pub fn from_value(value: &Value) -> Option<Promise> {
        value.as_thenable().and_then(Promise::from_thenable)
    }

    fn from_thenable(thenable: &Rc<dyn Thenable>) -> Option<Promise> {
        Rc::clone(thenable)
            .into_any()
            .downcast::<PromiseCell>()
            .ok()
            .map(|cell| Promise { cell })
    }

    /// This promise's identifier.
    pub fn id(&self) -> PromiseId {
        self.cell.id
    }

    /// The current state.
    pub fn state(&self) -> PromiseState {
        match &*self.cell.slot.borrow() {
            Slot::Pending | Slot::Delegated(_) => PromiseState::Pending,
            Slot::Fulfilled(_) => PromiseState::Fulfilled,
            Slot::Rejected(_) => PromiseState::Rejected,
        }
    }

    /// The fulfillment value, if fulfilled.
    pub fn value(&self) -> Option<Value> {
        match &*self.cell.slot.borrow() {
            Slot::Fulfilled(value) => Some(value.clone()),
            _ => None,
        }
    }

    /// The rejection reason, if rejected.
    pub fn reason(&self) -> Option<Value> {
        match &*self.cell.slot.borrow() {
            Slot::Rejected(reason) => Some(reason.clone()),
            _ => None,
        }
    }

    /// The terminal outcome, if settled.
    pub fn settlement(&self) -> Option<Settlement> {
        match &*self.cell.slot.borrow() {
            Slot::Fulfilled(value) => Some(Settlement::Fulfilled(value.clone())),
            Slot::Rejected(reason) => Some(Settlement::Rejected(reason.clone())),
            Slot::Pending | Slot::Delegated(_) => None,
        }
    }

    /// Whether any reaction has ever been attached.
    pub fn is_handled(&self) -> bool {
        self.cell.handled.get()
    }

    /// The scheduler this promise queues its reactions on.
    pub fn scheduler(&self) -> &SchedulerRef {
        &self.cell.scheduler
    }

    /// Returns true if both handles refer to the same instance.
    pub fn ptr_eq(&self, other: &Promise) -> bool {
        Rc::ptr_eq(&self.cell, &other.cell)
    }

    pub(crate) fn downgrade(&self) -> Weak<PromiseCell> {
        Rc::downgrade(&self.cell)
    }

    /// Resolves the promise.
    ///
    /// No-op unless the promise is pending and not already following another
    /// value. Promises and thenables are adopted; anything else fulfills.
    pub fn settle(&self, value: impl Into<Value>) {
        if self.is_resolved() {
            return;
        }
        self.resolve_value(value.into());
    }

    /// Rejects the promise with `reason`, verbatim.
    ///
    /// No-op unless the promise is pending and not already following another
    /// value.
    pub fn fail(&self, reason: impl Into<Value>) {
        if self.is_resolved() {
            return;
        }
        self.finish(Settlement::Rejected(reason.into()));
    }

    /// Adds handlers for fulfillment and/or rejection.
    ///
    /// Returns a new Promise resolved with the matching handler's result. A
    /// missing handler passes the value or reason through unchanged.
    pub fn then(&self, on_fulfilled: Option<Handler>, on_rejected: Option<Handler>) -> Promise {
        let derived = Promise::pending(&self.cell.scheduler);
        self.subscribe_into(&derived, move |settlement, target| {
            let outcome = match settlement {
                Settlement::Fulfilled(value) => match on_fulfilled {
                    Some(handler) => handler.call(value),
                    None => Ok(value),
                },
                Settlement::Rejected(reason) => match on_rejected {
                    Some(handler) => handler.call(reason),
                    None => Err(reason),
                },
            };
            match outcome {
                Ok(value) => target.settle(value),
                Err(reason) => target.fail(reason),
            }
        });
        derived
    }

    /// Shorthand for `then(None, Some(on_rejected))`.
    pub fn catch<F>(&self, on_rejected: F) -> Promise
    where
        F: FnOnce(Value) -> Result<Value, Value> + 'static,
    {
        self.then(None, Some(Handler::new(on_rejected)))
    }

    /// Runs `on_settle` whatever the outcome and passes the outcome through.
    ///
    /// If `on_settle` returns `Err`, or returns a promise that rejects, the
    /// derived promise rejects with that reason instead. A promise returned by
    /// `on_settle` is waited for before the original outcome is forwarded.
    pub fn finally<F>(&self, on_settle: F) -> Promise
    where
        F: FnOnce() -> Result<Value, Value> + 'static,
    {
        let scheduler = self.cell.scheduler.clone();
        let derived = Promise::pending(&scheduler);
        self.subscribe_into(&derived, move |settlement, target| match on_settle() {
            Err(reason) => target.fail(reason),
            Ok(value @ Value::Thenable(_)) => {
                let gate = Promise::resolve_with(&scheduler, value);
                gate.subscribe_into(&target, move |gated, target| match gated {
                    Settlement::Rejected(reason) => target.fail(reason),
                    Settlement::Fulfilled(_) => target.complete(settlement),
                });
            }
            Ok(_) => target.complete(settlement),
        });
        derived
    }

    /// Registers an internal observer that runs as a microtask once settled.
    pub(crate) fn subscribe<F>(&self, job: F)
    where
        F: FnOnce(Settlement) + 'static,
    {
        self.mark_handled();
        self.register(PromiseReaction::observer(job));
    }

    /// Like [`subscribe`](Self::subscribe), but the reaction owns `derived`
    /// and hands it to `job` when it runs.
    pub(crate) fn subscribe_into<F>(&self, derived: &Promise, job: F)
    where
        F: FnOnce(Settlement, Promise) + 'static,
    {
        self.mark_handled();
        self.register(PromiseReaction::resolving(derived, job));
    }

    fn register(&self, reaction: PromiseReaction) {
        match self.settlement() {
            None => self.cell.reactions.borrow_mut().push(reaction),
            Some(settlement) => self.schedule(reaction, settlement),
        }
    }

    pub(crate) fn complete(&self, settlement: Settlement) {
        match settlement {
            Settlement::Fulfilled(value) => self.settle(value),
            Settlement::Rejected(reason) => self.fail(reason),
        }
    }

    fn is_resolved(&self) -> bool {
        !matches!(*self.cell.slot.borrow(), Slot::Pending)
    }

    fn mark_handled(&self) {
        if !self.cell.handled.replace(true) && self.state() == PromiseState::Rejected {
            self.cell.scheduler.untrack_rejection(self);
        }
    }

    fn schedule(&self, reaction: PromiseReaction, settlement: Settlement) {
        self.cell
            .scheduler
            .enqueue(MicroTask::from_job(move || reaction.run(settlement)));
    }

    fn resolve_value(&self, value: Value) {
        match value {
            Value::Thenable(thenable) => match Promise::from_thenable(&thenable) {
                Some(other) => self.adopt(other),
                None => self.adopt_thenable(thenable),
            },
            other => self.finish(Settlement::Fulfilled(other)),
        }
    }

    fn adopt(&self, other: Promise) {
        if self.closes_cycle(&other) {
            tracing::debug!(promise = %self.id(), target = %other.id(), "adoption cycle detected");
            let err = RuntimeError::ChainingCycle { promise: self.id() };
            self.finish(Settlement::Rejected(err.into()));
            return;
        }
        tracing::trace!(promise = %self.id(), target = %other.id(), "adopting promise");
        *self.cell.slot.borrow_mut() = Slot::Delegated(Delegate::Promise(Rc::downgrade(&other.cell)));
        other.subscribe_into(self, |settlement, target| target.finish(settlement));
    }

    fn closes_cycle(&self, other: &Promise) -> bool {
        let mut current = Some(other.clone());
        while let Some(promise) = current {
            if promise.ptr_eq(self) {
                return true;
            }
            current = promise.delegate();
        }
        false
    }

    fn delegate(&self) -> Option<Promise> {
        match &*self.cell.slot.borrow() {
            Slot::Delegated(Delegate::Promise(weak)) => weak.upgrade().map(|cell| Promise { cell }),
            _ => None,
        }
    }

    fn adopt_thenable(&self, thenable: Rc<dyn Thenable>) {
        tracing::trace!(promise = %self.id(), "adopting thenable");
        *self.cell.slot.borrow_mut() = Slot::Delegated(Delegate::Thenable);
        let target = self.clone();
        self.cell
            .scheduler
            .enqueue(MicroTask::from_job(move || target.run_thenable_job(thenable)));
    }

    fn run_thenable_job(&self, thenable: Rc<dyn Thenable>) {
        let called = Rc::new(Cell::new(false));

        let target = self.clone();
        let guard = called.clone();
        let on_fulfilled: SettleCallback = Box::new(move |value| {
            if !guard.replace(true) {
                target.resolve_value(value);
            }
        });

        let target = self.clone();
        let guard = called.clone();
        let on_rejected: SettleCallback = Box::new(move |reason| {
            if !guard.replace(true) {
                target.finish(Settlement::Rejected(reason));
            }
        });

        if let Err(reason) = thenable.then(on_fulfilled, on_rejected) {
            if !called.replace(true) {
                self.finish(Settlement::Rejected(reason));
            }
        }
    }

    /// Moves to a terminal state and schedules every queued reaction.
    fn finish(&self, settlement: Settlement) {
        {
            let mut slot = self.cell.slot.borrow_mut();
            if matches!(*slot, Slot::Fulfilled(_) | Slot::Rejected(_)) {
                return;
            }
            *slot = match &settlement {
                Settlement::Fulfilled(value) => Slot::Fulfilled(value.clone()),
                Settlement::Rejected(reason) => Slot::Rejected(reason.clone()),
            };
        }
        tracing::trace!(promise = %self.id(), state = ?settlement.state(), "promise settled");

        let reactions = std::mem::take(&mut *self.cell.reactions.borrow_mut());
        if matches!(settlement, Settlement::Rejected(_)) && !self.is_handled() {
            self.cell.scheduler.track_rejection(self);
        }
        for reaction in reactions {
            self.schedule(reaction, settlement.clone());
        }
    }
}

impl PartialEq for Promise {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for Promise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.cell, f)
    }
}

impl fmt::Debug for PromiseCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &*self.slot.borrow() {
            Slot::Pending | Slot::Delegated(_) => PromiseState::Pending,
            Slot::Fulfilled(_) => PromiseState::Fulfilled,
            Slot::Rejected(_) => PromiseState::Rejected,
        };
        f.debug_struct("Promise")
            .field("id", &self.id)
            .field("state", &state)
            .finish()
    }
}

impl Thenable for PromiseCell {
    fn then(&self, on_fulfilled: SettleCallback, on_rejected: SettleCallback) -> Result<(), Value> {
        if let Some(cell) = self.this.upgrade() {
            let promise = Promise { cell };
            promise.subscribe(move |settlement| match settlement {
                Settlement::Fulfilled(value) => on_fulfilled(value),
                Settlement::Rejected(reason) => on_rejected(reason),
            });
        }
        Ok(())
    }

    fn into_any(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }

    fn class_name(&self) -> &'static str {
        "Promise"
    }
}

impl From<Promise> for Value {
    fn from(promise: Promise) -> Self {
        Value::Thenable(promise.cell)
    }
}

impl From<&Promise> for Value {
    fn from(promise: &Promise) -> Self {
        Value::Thenable(promise.cell.clone())
    }
}
