//! Core JavaScript value types and error handling.
//!
//! This crate provides the foundational types shared by the async runtime:
//! value representation, error objects, and the `then` capability used for
//! promise adoption.
//!
//! # Overview
//!
//! - [`Value`] - Tagged representation of JavaScript values
//! - [`JsError`] - JavaScript errors
//! - [`ErrorKind`] - Types of JavaScript errors
//! - [`Thenable`] - Anything a promise can adopt
//!
//! # Examples
//!
//! ```
//! use core_types::{ErrorKind, JsError, Value};
//!
//! // Create JavaScript values
//! let num = Value::Smi(42);
//! assert!(num.is_truthy());
//! assert_eq!(num.type_of(), "number");
//!
//! // Errors are values too, so they can be rejection reasons
//! let reason = Value::from(JsError::new(ErrorKind::TypeError, "undefined is not a function"));
//! assert_eq!(reason.to_string(), "TypeError: undefined is not a function");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

mod error;
mod thenable;
mod value;

pub use error::{ErrorKind, JsError};
pub use thenable::{SettleCallback, Thenable};
pub use value::Value;
