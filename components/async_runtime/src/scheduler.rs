//! The continuation scheduling contract.
//!
//! Promises never run reactions themselves. Every reaction firing becomes one
//! [`MicroTask`] handed to a [`Scheduler`], which owns the FIFO queue and
//! decides when the current synchronous unit of work is over.
//!
//! Rejections that reach a promise with no reaction attached are handed to the
//! scheduler as well. A host that knows where its turns end collects them in a
//! [`RejectionTracker`] and reports the ones still unhandled through the
//! process-wide hooks registered with [`on_unhandled_rejection`].

use crate::promise::{Promise, PromiseCell, PromiseId};
use crate::task_queue::MicroTask;
use core_types::Value;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// The host queue promises schedule their reactions on.
pub trait Scheduler {
    /// Appends a microtask to the FIFO queue. It must not run before the
    /// caller's synchronous unit of work finishes.
    fn enqueue(&self, task: MicroTask);

    /// Called when `promise` rejects while nothing is subscribed to it.
    fn track_rejection(&self, _promise: &Promise) {}

    /// Called when a previously tracked promise gains its first reaction.
    fn untrack_rejection(&self, _promise: &Promise) {}
}

/// Shared handle to a scheduler, stored by every promise.
pub type SchedulerRef = Rc<dyn Scheduler>;

/// Rejected promises waiting for the end of the turn.
///
/// Reported promises are remembered only while they are alive, so a late
/// handler can still be noticed without the tracker keeping them around.
#[derive(Debug, Default)]
pub struct RejectionTracker {
    pending: Vec<Promise>,
    reported: HashMap<PromiseId, Weak<PromiseCell>>,
}

impl RejectionTracker {
    /// Creates an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts tracking a rejected promise with no reactions.
    pub fn track(&mut self, promise: &Promise) {
        self.pending.push(promise.clone());
    }

    /// Stops tracking `promise` because a reaction was attached.
    pub fn untrack(&mut self, promise: &Promise) {
        let before = self.pending.len();
        self.pending.retain(|p| p.id() != promise.id());
        if self.pending.len() == before && self.reported.remove(&promise.id()).is_some() {
            tracing::debug!(promise = %promise.id(), "rejection handled late");
        }
    }

    /// Drains the promises that are still unhandled and remembers them as
    /// reported. Reported promises that have since been dropped are forgotten.
    pub fn take_unhandled(&mut self) -> Vec<Promise> {
        self.reported.retain(|_, cell| cell.strong_count() > 0);
        let unhandled: Vec<Promise> = self
            .pending
            .drain(..)
            .filter(|p| !p.is_handled())
            .collect();
        self.reported
            .extend(unhandled.iter().map(|p| (p.id(), p.downgrade())));
        unhandled
    }

    /// Number of promises currently tracked.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Returns true if nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Number of reported promises still remembered for late handling.
    pub fn reported_len(&self) -> usize {
        self.reported.len()
    }
}

/// Identifies a registered unhandled rejection hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookId(u64);

type UnhandledRejectionHook = Arc<dyn Fn(&Value, &Promise) + Send + Sync>;

static HOOKS: RwLock<Vec<(HookId, UnhandledRejectionHook)>> = RwLock::new(Vec::new());
static NEXT_HOOK_ID: AtomicU64 = AtomicU64::new(0);

/// Registers a process-wide hook called with `(reason, promise)` for every
/// unhandled rejection. With no hooks registered reports are dropped.
pub fn on_unhandled_rejection<F>(hook: F) -> HookId
where
    F: Fn(&Value, &Promise) + Send + Sync + 'static,
{
    let id = HookId(NEXT_HOOK_ID.fetch_add(1, Ordering::Relaxed));
    HOOKS.write().push((id, Arc::new(hook)));
    id
}

/// Removes a hook. Returns false if it was not registered.
pub fn remove_unhandled_rejection_hook(id: HookId) -> bool {
    let mut hooks = HOOKS.write();
    let before = hooks.len();
    hooks.retain(|(hook_id, _)| *hook_id != id);
    hooks.len() != before
}

/// Calls every registered hook for one unhandled rejection.
pub fn report_unhandled_rejection(reason: &Value, promise: &Promise) {
    // Snapshot so a hook may register or remove hooks.
    let hooks: Vec<UnhandledRejectionHook> =
        HOOKS.read().iter().map(|(_, hook)| hook.clone()).collect();
    for hook in hooks {
        hook(reason, promise);
    }
}
