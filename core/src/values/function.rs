//! Host-provided function implementations.

use std::fmt;
use std::sync::Arc;

use super::Value;
use crate::evaluator::EvalError;

/// Callable bound to a function overload.
///
/// Implemented for any `Fn(&[Value]) -> Result<Value, EvalError>` closure.
pub trait Function: Send + Sync {
    fn call(&self, args: &[Value]) -> Result<Value, EvalError>;
}

impl<F> Function for F
where
    F: Fn(&[Value]) -> Result<Value, EvalError> + Send + Sync,
{
    fn call(&self, args: &[Value]) -> Result<Value, EvalError> {
        self(args)
    }
}

/// Shared handle to a function implementation.
#[derive(Clone)]
pub struct FunctionImpl(Arc<dyn Function>);

impl FunctionImpl {
    pub fn new(f: impl Function + 'static) -> Self {
        FunctionImpl(Arc::new(f))
    }

    pub fn call(&self, args: &[Value]) -> Result<Value, EvalError> {
        self.0.call(args)
    }
}

impl fmt::Debug for FunctionImpl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FunctionImpl")
    }
}
