//! The `then` capability.
//!
//! Any value that can register a continuation pair is a thenable. Promise
//! adoption treats a thenable exactly like a promise: the adopting promise
//! hands it a pair of one-shot callbacks and mirrors whichever is called first.

use crate::Value;
use std::any::Any;
use std::fmt;
use std::rc::Rc;

/// A one-shot callback handed to [`Thenable::then`].
pub type SettleCallback = Box<dyn FnOnce(Value)>;

/// A value exposing a continuation-registration capability.
///
/// # Examples
///
/// ```
/// use core_types::{SettleCallback, Thenable, Value};
/// use std::any::Any;
/// use std::rc::Rc;
///
/// #[derive(Debug)]
/// struct Ready(i32);
///
/// impl Thenable for Ready {
///     fn then(&self, on_fulfilled: SettleCallback, _on_rejected: SettleCallback) -> Result<(), Value> {
///         on_fulfilled(Value::Smi(self.0));
///         Ok(())
///     }
///
///     fn into_any(self: Rc<Self>) -> Rc<dyn Any> {
///         self
///     }
/// }
///
/// let value = Value::Thenable(Rc::new(Ready(42)));
/// assert!(value.as_thenable().is_some());
/// ```
pub trait Thenable: fmt::Debug {
    /// Registers a continuation pair.
    ///
    /// Returning `Err` is the equivalent of throwing from `then`; the caller
    /// treats it as a rejection unless one of the callbacks already ran.
    fn then(&self, on_fulfilled: SettleCallback, on_rejected: SettleCallback) -> Result<(), Value>;

    /// Upcasts the shared handle so callers can recover the concrete type.
    fn into_any(self: Rc<Self>) -> Rc<dyn Any>;

    /// Name used when the value is converted to a string.
    fn class_name(&self) -> &'static str {
        "Object"
    }
}
