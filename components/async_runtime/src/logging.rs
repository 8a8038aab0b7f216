//! Logging setup for hosts embedding the runtime.
//!
//! The runtime only emits `tracing` events: promise transitions at `trace`,
//! adoption and cycle detection at `debug`, unhandled rejections at `warn`.
//! Nothing is printed until a subscriber is installed.
//!
//! ```
//! use async_runtime::logging::{self, LogLevel};
//!
//! logging::init_with_level(LogLevel::Debug);
//! tracing::debug!("runtime ready");
//! ```

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer, Registry};

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Every promise transition
    Trace,
    /// Adoption, cycles, late handling
    Debug,
    /// General information
    Info,
    /// Unhandled rejections
    Warn,
    /// Errors only
    Error,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

/// Initialize logging at WARN, which surfaces unhandled rejections only.
pub fn init() -> bool {
    init_with_level(LogLevel::Warn)
}

/// Initialize logging with a custom level: `LEVEL message`, no time, no target.
///
/// Returns false if a subscriber was already installed; the first one stays.
pub fn init_with_level(level: LogLevel) -> bool {
    let filter = tracing_subscriber::filter::LevelFilter::from_level(level.into());

    let layer = tracing_subscriber::fmt::layer()
        .without_time()
        .with_target(false)
        .with_level(true)
        .with_ansi(false)
        .compact()
        .with_filter(filter);

    install(Registry::default().with(layer))
}

/// Initialize logging for tests: output goes through the test harness capture.
///
/// Same return value as [`init_with_level`].
pub fn init_for_tests(level: LogLevel) -> bool {
    let filter = tracing_subscriber::filter::LevelFilter::from_level(level.into());

    let layer = tracing_subscriber::fmt::layer()
        .with_test_writer()
        .without_time()
        .with_target(false)
        .with_ansi(false)
        .compact()
        .with_filter(filter);

    install(Registry::default().with(layer))
}

fn install<S: SubscriberInitExt>(subscriber: S) -> bool {
    match subscriber.try_init() {
        Ok(()) => true,
        Err(_) => {
            tracing::debug!("logging already initialized");
            false
        }
    }
}
