//! Contract compliance tests for core_types
//!
//! These tests pin the public surface the async runtime relies on.

use core_types::{ErrorKind, JsError, SettleCallback, Thenable, Value};
use std::any::Any;
use std::rc::Rc;

#[cfg(test)]
mod value_contract_tests {
    use super::*;

    /// Contract: Value enum must have all specified variants
    #[test]
    fn test_value_has_primitive_variants() {
        let _: Value = Value::Undefined;
        let _: Value = Value::Null;
        let _: Value = Value::Boolean(true);
        let _: Value = Value::Smi(i32::MIN);
        let _: Value = Value::Double(f64::MAX);
        let _: Value = Value::String(String::new());
    }

    #[test]
    fn test_value_has_compound_variants() {
        let _: Value = Value::Array(Vec::new());
        let _: Value = Value::Object(Vec::new());
        let _: Value = Value::Error(JsError::new(ErrorKind::Error, ""));
    }

    #[test]
    fn test_value_is_clone_and_debug() {
        let val = Value::Array(vec![Value::Smi(1)]);
        let copy = val.clone();
        assert_eq!(format!("{:?}", copy), "Array([Smi(1)])");
    }

    #[test]
    fn test_value_type_of_returns_str() {
        let _: &str = Value::Undefined.type_of();
    }
}

#[cfg(test)]
mod js_error_contract_tests {
    use super::*;

    #[test]
    fn test_js_error_has_public_fields() {
        let error = JsError {
            kind: ErrorKind::TypeError,
            message: "test".to_string(),
            errors: vec![],
        };
        let _: &ErrorKind = &error.kind;
        let _: &String = &error.message;
        let _: &Vec<Value> = &error.errors;
    }

    #[test]
    fn test_js_error_implements_std_error() {
        fn assert_error<E: std::error::Error>() {}
        assert_error::<JsError>();
    }
}

#[cfg(test)]
mod thenable_contract_tests {
    use super::*;

    #[derive(Debug)]
    struct Never;

    impl Thenable for Never {
        fn then(&self, _f: SettleCallback, _r: SettleCallback) -> Result<(), Value> {
            Ok(())
        }

        fn into_any(self: Rc<Self>) -> Rc<dyn Any> {
            self
        }
    }

    #[test]
    fn test_thenable_is_object_safe() {
        let t: Rc<dyn Thenable> = Rc::new(Never);
        let value = Value::Thenable(t);
        assert!(value.as_thenable().is_some());
    }

    #[test]
    fn test_thenable_may_throw() {
        #[derive(Debug)]
        struct Throws;

        impl Thenable for Throws {
            fn then(&self, _f: SettleCallback, _r: SettleCallback) -> Result<(), Value> {
                Err(Value::from("thrown from then"))
            }

            fn into_any(self: Rc<Self>) -> Rc<dyn Any> {
                self
            }
        }

        let result = Throws.then(Box::new(|_| {}), Box::new(|_| {}));
        assert_eq!(result, Err(Value::from("thrown from then")));
    }
}
