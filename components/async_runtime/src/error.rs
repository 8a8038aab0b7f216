//! Runtime error taxonomy.
//!
//! Promise failures never escape as Rust errors: they become rejection
//! reasons. `RuntimeError` covers the two places an error is still reported
//! synchronously: cycle detection (converted into a reason right away) and
//! host tasks failing inside the event loop.

use crate::promise::PromiseId;
use core_types::{ErrorKind, JsError, Value};

/// Errors raised by the async runtime.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RuntimeError {
    /// A promise was resolved with itself, directly or through its adoption chain
    #[error("chaining cycle detected for promise {promise}")]
    ChainingCycle {
        /// The promise whose resolution would have closed the cycle
        promise: PromiseId,
    },

    /// A host task or microtask returned an error
    #[error("task failed: {0}")]
    TaskFailed(#[from] JsError),
}

impl From<RuntimeError> for JsError {
    fn from(err: RuntimeError) -> Self {
        match err {
            RuntimeError::ChainingCycle { promise } => JsError::new(
                ErrorKind::TypeError,
                format!("Chaining cycle detected for promise {promise}"),
            ),
            RuntimeError::TaskFailed(inner) => inner,
        }
    }
}

impl From<RuntimeError> for Value {
    fn from(err: RuntimeError) -> Self {
        Value::Error(err.into())
    }
}
