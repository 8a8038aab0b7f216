//! Unit tests for unhandled rejection tracking and reporting

use async_runtime::{
    on_unhandled_rejection, remove_unhandled_rejection_hook, EventLoop, EventLoopConfig, HookId,
    MicroTask, Promise, PromiseId, RejectionTracker, Scheduler, SchedulerRef,
};
use core_types::Value;
use std::rc::Rc;
use std::sync::{Arc, Mutex};

/// Collects reports for the given promise ids only; other tests share the hooks.
fn watch(ids: Vec<PromiseId>) -> (HookId, Arc<Mutex<Vec<(PromiseId, String)>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let s = seen.clone();
    let hook = on_unhandled_rejection(move |reason, promise| {
        if ids.contains(&promise.id()) {
            s.lock().unwrap().push((promise.id(), reason.to_string()));
        }
    });
    (hook, seen)
}

#[test]
fn unhandled_rejection_is_reported_at_end_of_turn() {
    let mut event_loop = EventLoop::new();
    let promise = Promise::reject_with(&event_loop.scheduler(), "nobody listens");
    let (hook, seen) = watch(vec![promise.id()]);

    event_loop.run_until_done().unwrap();
    remove_unhandled_rejection_hook(hook);

    assert_eq!(
        *seen.lock().unwrap(),
        vec![(promise.id(), "nobody listens".to_string())]
    );
}

#[test]
fn handler_attached_in_same_turn_prevents_report() {
    let mut event_loop = EventLoop::new();
    let promise = Promise::reject_with(&event_loop.scheduler(), "caught");
    let (hook, seen) = watch(vec![promise.id()]);
    let _ = promise.catch(Ok);

    event_loop.run_until_done().unwrap();
    remove_unhandled_rejection_hook(hook);
    assert!(seen.lock().unwrap().is_empty());
}

#[test]
fn rejection_passed_down_a_chain_reports_only_the_end() {
    let mut event_loop = EventLoop::new();
    let source = Promise::reject_with(&event_loop.scheduler(), "deep");
    let end = source.then(None, None);
    let (hook, seen) = watch(vec![source.id(), end.id()]);

    event_loop.run_until_done().unwrap();
    remove_unhandled_rejection_hook(hook);

    assert_eq!(*seen.lock().unwrap(), vec![(end.id(), "deep".to_string())]);
}

#[test]
fn reports_are_silenced_by_config() {
    let mut event_loop = EventLoop::with_config(EventLoopConfig {
        report_unhandled_rejections: false,
        ..EventLoopConfig::default()
    });
    let promise = Promise::reject_with(&event_loop.scheduler(), "quiet");
    let (hook, seen) = watch(vec![promise.id()]);

    event_loop.run_until_done().unwrap();
    remove_unhandled_rejection_hook(hook);
    assert!(seen.lock().unwrap().is_empty());
}

#[test]
fn removed_hook_is_not_called() {
    let mut event_loop = EventLoop::new();
    let promise = Promise::reject_with(&event_loop.scheduler(), Value::Null);
    let (hook, seen) = watch(vec![promise.id()]);

    assert!(remove_unhandled_rejection_hook(hook));
    assert!(!remove_unhandled_rejection_hook(hook));

    event_loop.run_until_done().unwrap();
    assert!(seen.lock().unwrap().is_empty());
}

#[test]
fn tracker_skips_promises_handled_before_flush() {
    let event_loop = EventLoop::new();
    let scheduler = event_loop.scheduler();
    let handled = Promise::reject_with(&scheduler, 1);
    let unhandled = Promise::reject_with(&scheduler, 2);

    let mut tracker = RejectionTracker::new();
    tracker.track(&handled);
    tracker.track(&unhandled);
    assert_eq!(tracker.len(), 2);

    let _ = handled.catch(Ok);
    let reported = tracker.take_unhandled();
    assert_eq!(reported, vec![unhandled.clone()]);
    assert!(tracker.is_empty());

    // Handling after the report only forgets it.
    tracker.untrack(&unhandled);
    assert!(tracker.take_unhandled().is_empty());
}

#[test]
fn tracker_forgets_reported_promises_once_dropped() {
    // No host: nothing but this test holds the rejected promises.
    struct Discard;
    impl Scheduler for Discard {
        fn enqueue(&self, _task: MicroTask) {}
    }
    let scheduler: SchedulerRef = Rc::new(Discard);
    let mut tracker = RejectionTracker::new();

    let rejected: Vec<Promise> = (0..100)
        .map(|i| Promise::reject_with(&scheduler, i))
        .collect();
    for promise in &rejected {
        tracker.track(promise);
    }
    let reported = tracker.take_unhandled();
    assert_eq!(reported.len(), 100);
    assert_eq!(tracker.reported_len(), 100);

    let kept = rejected[0].clone();
    drop(reported);
    drop(rejected);

    assert!(tracker.take_unhandled().is_empty());
    assert_eq!(tracker.reported_len(), 1);

    tracker.untrack(&kept);
    assert_eq!(tracker.reported_len(), 0);
}
