//! Event loop implementation.
//!
//! This module provides the host event loop that drives promise reactions.
//! It owns the task, microtask and timer queues and implements
//! [`Scheduler`] through a cloneable [`LoopHandle`].

use crate::config::EventLoopConfig;
use crate::error::RuntimeError;
use crate::promise::Promise;
use crate::scheduler::{self, RejectionTracker, Scheduler, SchedulerRef};
use crate::task_queue::{MicroTask, MicrotaskQueue, Task, TaskQueue, TimerId, TimerQueue};
use core_types::Value;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

#[derive(Debug, Default)]
struct LoopShared {
    tasks: RefCell<TaskQueue>,
    microtasks: RefCell<MicrotaskQueue>,
    timers: RefCell<TimerQueue>,
    now_ms: Cell<u64>,
    rejections: RefCell<RejectionTracker>,
}

/// A cloneable handle to an [`EventLoop`]'s queues.
///
/// Promises hold one (as a [`SchedulerRef`]) to enqueue their reactions;
/// producers hold one to set timers.
#[derive(Debug, Clone)]
pub struct LoopHandle {
    shared: Rc<LoopShared>,
}

impl LoopHandle {
    /// Adds a task to the task queue.
    pub fn enqueue_task(&self, task: Task) {
        self.shared.tasks.borrow_mut().enqueue(task);
    }

    /// Adds a microtask to the microtask queue.
    pub fn enqueue_microtask(&self, microtask: MicroTask) {
        self.shared.microtasks.borrow_mut().enqueue(microtask);
    }

    /// Schedules `task` to run once `delay_ms` of virtual time has passed.
    pub fn set_timeout(&self, delay_ms: u64, task: Task) -> TimerId {
        let deadline = self.now_ms().saturating_add(delay_ms);
        tracing::trace!(deadline, "timer scheduled");
        self.shared.timers.borrow_mut().schedule(deadline, task)
    }

    /// Cancels a timer that has not fired yet.
    pub fn clear_timeout(&self, id: TimerId) -> bool {
        self.shared.timers.borrow_mut().cancel(id)
    }

    /// Current virtual time in milliseconds.
    pub fn now_ms(&self) -> u64 {
        self.shared.now_ms.get()
    }

    /// This handle as a promise scheduler.
    pub fn scheduler(&self) -> SchedulerRef {
        Rc::new(self.clone())
    }
}

impl Scheduler for LoopHandle {
    fn enqueue(&self, task: MicroTask) {
        self.enqueue_microtask(task);
    }

    fn track_rejection(&self, promise: &Promise) {
        self.shared.rejections.borrow_mut().track(promise);
    }

    fn untrack_rejection(&self, promise: &Promise) {
        self.shared.rejections.borrow_mut().untrack(promise);
    }
}

/// The JavaScript event loop.
///
/// Each iteration (turn) of the loop:
/// 1. Moves timers whose deadline has passed onto the task queue
/// 2. Takes the oldest task from the task queue and executes it
/// 3. Drains all microtasks in the microtask queue
/// 4. Reports rejections that are still unhandled
/// 5. Repeats, advancing the virtual clock when only timers remain
///
/// # Examples
///
/// ```
/// use async_runtime::{EventLoop, Task};
/// use core_types::Value;
///
/// let mut event_loop = EventLoop::new();
///
/// event_loop.enqueue_task(Task::new(|| Ok(Value::Undefined)));
/// event_loop.run_until_done().unwrap();
/// ```
#[derive(Debug, Default)]
pub struct EventLoop {
    handle: LoopHandle,
    config: EventLoopConfig,
}

impl Default for LoopHandle {
    fn default() -> Self {
        LoopHandle {
            shared: Rc::new(LoopShared::default()),
        }
    }
}

impl EventLoop {
    /// Creates a new EventLoop with empty queues.
    pub fn new() -> Self {
        Self::with_config(EventLoopConfig::default())
    }

    /// Creates a new EventLoop with the given configuration.
    pub fn with_config(config: EventLoopConfig) -> Self {
        let handle = LoopHandle::default();
        handle.shared.now_ms.set(config.start_time_ms);
        Self { handle, config }
    }

    /// The loop configuration.
    pub fn config(&self) -> &EventLoopConfig {
        &self.config
    }

    /// A cloneable handle to this loop's queues.
    pub fn handle(&self) -> LoopHandle {
        self.handle.clone()
    }

    /// This loop as a promise scheduler.
    pub fn scheduler(&self) -> SchedulerRef {
        self.handle.scheduler()
    }

    /// Runs the event loop until all tasks, microtasks and timers are processed.
    ///
    /// # Returns
    ///
    /// `Ok(())` if all tasks completed successfully, or an error if any task failed.
    pub fn run_until_done(&mut self) -> Result<(), RuntimeError> {
        loop {
            // Script-level work, or a turn cut short by the microtask budget,
            // leaves microtasks that run before the next task.
            if !self.is_microtask_queue_empty() {
                self.run_all_microtasks()?;
                continue;
            }
            self.promote_due_timers();
            if !self.is_task_queue_empty() {
                self.process_one_cycle()?;
                continue;
            }
            let next = self.handle.shared.timers.borrow().next_deadline();
            match next {
                Some(deadline) => self.advance_clock_to(deadline),
                None => break,
            }
        }

        Ok(())
    }

    /// Adds a task to the task queue.
    ///
    /// The task will be executed in the next available iteration of the event loop.
    pub fn enqueue_task(&mut self, task: Task) {
        self.handle.enqueue_task(task);
    }

    /// Adds a microtask to the microtask queue.
    ///
    /// The microtask will be executed after the current task completes.
    pub fn enqueue_microtask(&mut self, microtask: MicroTask) {
        self.handle.enqueue_microtask(microtask);
    }

    /// Schedules `task` to run once `delay_ms` of virtual time has passed.
    pub fn set_timeout(&mut self, delay_ms: u64, task: Task) -> TimerId {
        self.handle.set_timeout(delay_ms, task)
    }

    /// Cancels a timer that has not fired yet.
    pub fn clear_timeout(&mut self, id: TimerId) -> bool {
        self.handle.clear_timeout(id)
    }

    /// Current virtual time in milliseconds.
    pub fn now_ms(&self) -> u64 {
        self.handle.now_ms()
    }

    /// Returns true if the task queue is empty.
    pub fn is_task_queue_empty(&self) -> bool {
        self.handle.shared.tasks.borrow().is_empty()
    }

    /// Returns true if the microtask queue is empty.
    pub fn is_microtask_queue_empty(&self) -> bool {
        self.handle.shared.microtasks.borrow().is_empty()
    }

    /// Returns the number of timers that have not fired yet.
    pub fn pending_timers(&self) -> usize {
        self.handle.shared.timers.borrow().len()
    }

    /// Runs all microtasks in the queue until empty, then reports unhandled
    /// rejections. This is the end of a turn.
    ///
    /// New microtasks added during execution are also processed before this
    /// method returns, up to `max_microtasks_per_turn`. Microtasks past that
    /// limit stay queued for the next call, and rejections are not reported
    /// until the queue is empty.
    pub fn run_all_microtasks(&mut self) -> Result<(), RuntimeError> {
        let limit = self.config.max_microtasks_per_turn;
        let mut drained = 0usize;
        while limit.map_or(true, |limit| drained < limit.max(1)) {
            let Some(microtask) = self.next_microtask() else {
                break;
            };
            drained += 1;
            microtask.run()?;
        }
        if !self.is_microtask_queue_empty() {
            let remaining = self.handle.shared.microtasks.borrow().len();
            tracing::debug!(drained, remaining, "microtask budget reached, yielding");
            return Ok(());
        }
        if drained > 0 {
            tracing::trace!(drained, "microtask queue drained");
        }
        self.report_unhandled_rejections();
        Ok(())
    }

    /// Processes one complete cycle: one task followed by all microtasks.
    ///
    /// This represents one iteration of the event loop.
    pub fn process_one_cycle(&mut self) -> Result<(), RuntimeError> {
        self.promote_due_timers();
        if let Some(task) = self.next_task() {
            task.run()?;
        }
        self.run_all_microtasks()
    }

    /// Advances the virtual clock by `delta_ms`, running every timer that
    /// becomes due along the way along with the tasks and microtasks it causes.
    pub fn advance_by(&mut self, delta_ms: u64) -> Result<(), RuntimeError> {
        let target = self.now_ms().saturating_add(delta_ms);
        loop {
            if !self.is_microtask_queue_empty() {
                self.run_all_microtasks()?;
                continue;
            }
            self.promote_due_timers();
            if !self.is_task_queue_empty() {
                self.process_one_cycle()?;
                continue;
            }
            let next = self.handle.shared.timers.borrow().next_deadline();
            match next {
                Some(deadline) if deadline <= target => self.advance_clock_to(deadline),
                _ => break,
            }
        }
        self.advance_clock_to(target);
        self.run_all_microtasks()
    }

    fn next_task(&self) -> Option<Task> {
        self.handle.shared.tasks.borrow_mut().dequeue()
    }

    fn next_microtask(&self) -> Option<MicroTask> {
        self.handle.shared.microtasks.borrow_mut().dequeue()
    }

    fn advance_clock_to(&self, deadline_ms: u64) {
        let now = self.handle.shared.now_ms.get();
        if deadline_ms > now {
            tracing::trace!(from = now, to = deadline_ms, "virtual clock advanced");
            self.handle.shared.now_ms.set(deadline_ms);
        }
    }

    fn promote_due_timers(&self) {
        let now = self.now_ms();
        loop {
            let due = self.handle.shared.timers.borrow_mut().pop_due(now);
            match due {
                Some(task) => self.handle.enqueue_task(task),
                None => break,
            }
        }
    }

    fn report_unhandled_rejections(&self) {
        let unhandled = self.handle.shared.rejections.borrow_mut().take_unhandled();
        if !self.config.report_unhandled_rejections {
            return;
        }
        for promise in unhandled {
            let reason = promise.reason().unwrap_or(Value::Undefined);
            tracing::warn!(promise = %promise.id(), %reason, "unhandled promise rejection");
            scheduler::report_unhandled_rejection(&reason, &promise);
        }
    }
}
