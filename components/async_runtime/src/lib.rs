//! Async runtime for JavaScript execution.
//!
//! This crate provides the promise core and the host it runs on:
//! - Promise state machine with adoption of promises and thenables
//! - Scheduler contract for reactions, with unhandled rejection tracking
//! - Combinators (`all`, `race`, `all_settled`, `any`)
//! - A step-function driver for sequential async code
//! - Event loop with task, microtask and timer queues on a virtual clock
//!
//! # Overview
//!
//! - [`Promise`] - single-settlement deferred value
//! - [`Scheduler`] - where promises queue their reactions
//! - [`EventLoop`] - reference host implementing [`Scheduler`]
//! - [`combinators`], [`timers`] and [`driver`] - derived patterns
//!
//! # Examples
//!
//! ## Event Loop Usage
//!
//! ```
//! use async_runtime::{EventLoop, Task};
//! use core_types::Value;
//!
//! let mut event_loop = EventLoop::new();
//! event_loop.enqueue_task(Task::new(|| Ok(Value::Undefined)));
//! event_loop.run_until_done().unwrap();
//! ```
//!
//! ## Promise Usage
//!
//! ```
//! use async_runtime::{combinators, EventLoop, Promise};
//! use core_types::Value;
//!
//! let mut event_loop = EventLoop::new();
//! let scheduler = event_loop.scheduler();
//!
//! let combined = combinators::all(
//!     &scheduler,
//!     vec![Value::Smi(1), Promise::resolve_with(&scheduler, 2).into()],
//! );
//! event_loop.run_until_done().unwrap();
//! assert_eq!(combined.value(), Some(Value::Array(vec![Value::Smi(1), Value::Smi(2)])));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod combinators;
pub mod config;
pub mod driver;
pub mod error;
pub mod event_loop;
pub mod logging;
pub mod promise;
pub mod scheduler;
pub mod task_queue;
pub mod timers;

// Re-export main types at crate root
pub use combinators::{all, all_settled, any, race};
pub use config::EventLoopConfig;
pub use driver::{drive, Step};
pub use error::RuntimeError;
pub use event_loop::{EventLoop, LoopHandle};
pub use promise::{Fail, Handler, Promise, PromiseId, PromiseState, Settle, Settlement};
pub use scheduler::{
    on_unhandled_rejection, remove_unhandled_rejection_hook, report_unhandled_rejection, HookId,
    RejectionTracker, Scheduler, SchedulerRef,
};
pub use task_queue::{MicroTask, MicrotaskQueue, Task, TaskQueue, TimerId, TimerQueue};
