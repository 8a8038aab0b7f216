//! Event loop configuration.

/// Configuration for the [`EventLoop`](crate::EventLoop).
#[derive(Debug, Clone)]
pub struct EventLoopConfig {
    /// Maximum microtasks one `run_all_microtasks` call drains before it
    /// returns (`None` = drain until empty). The rest stay queued and still run
    /// before the next task. At least one microtask runs per call.
    pub max_microtasks_per_turn: Option<usize>,
    /// Whether unhandled rejections are reported at the end of each turn
    pub report_unhandled_rejections: bool,
    /// Initial virtual clock reading in milliseconds
    pub start_time_ms: u64,
}

impl Default for EventLoopConfig {
    fn default() -> Self {
        EventLoopConfig {
            max_microtasks_per_turn: None,
            report_unhandled_rejections: true,
            start_time_ms: 0,
        }
    }
}

impl EventLoopConfig {
    /// Config that yields after `limit` microtasks per turn.
    pub fn with_microtask_budget(limit: usize) -> Self {
        EventLoopConfig {
            max_microtasks_per_turn: Some(limit),
            ..Self::default()
        }
    }
}
