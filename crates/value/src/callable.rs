//! Opaque callable values.
//!
//! A [`Callable`] can be invoked with a receiver (the evaluation context) and
//! positional arguments, but never introspected, compared structurally, or
//! serialized. Equality is pointer identity, which is enough to let a context
//! that contains callables be compared against itself.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::value::Value;

/// Error raised by a callable implementation.
#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct CallError {
    pub message: String,
}

impl CallError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

type NativeFn = dyn Fn(&Value, &[Value]) -> Result<Value, CallError> + Send + Sync;

/// An opaque function value.
#[derive(Clone)]
pub struct Callable(Arc<NativeFn>);

impl Callable {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Value, &[Value]) -> Result<Value, CallError> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Invokes the callable with `receiver` as the implicit context argument.
    pub fn invoke(&self, receiver: &Value, args: &[Value]) -> Result<Value, CallError> {
        (self.0)(receiver, args)
    }
}

impl PartialEq for Callable {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Callable(<native>)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invoke_passes_receiver_and_args() {
        let c = Callable::new(|recv, args| {
            assert!(matches!(recv, Value::Null));
            Ok(args.first().cloned().unwrap_or(Value::Undefined))
        });
        let result = c.invoke(&Value::Null, &[Value::Number(7.0)]).unwrap();
        assert_eq!(result, Value::Number(7.0));
    }

    #[test]
    fn test_equality_is_pointer_identity() {
        let a = Callable::new(|_, _| Ok(Value::Null));
        let b = Callable::new(|_, _| Ok(Value::Null));
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }
}
