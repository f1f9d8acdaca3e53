//! Runtime evaluation errors.
//!
//! Errors are values in CEL: `&&`, `||` and the comprehension loop condition
//! absorb them when the other operand decides the result. Anything else
//! propagates to the caller of [`crate::api::Program::eval`].

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    /// Variable missing from the activation.
    #[error("no such attribute(s): {0}")]
    NoSuchAttribute(String),

    /// Map lookup or field selection on an absent key.
    #[error("no such key: {0}")]
    NoSuchKey(String),

    #[error("index out of range: {index}, size: {len}")]
    IndexOutOfRange { index: i64, len: usize },

    #[error("division by zero")]
    DivisionByZero,

    #[error("modulus by zero")]
    ModulusByZero,

    /// Arithmetic result outside the range of its type.
    #[error("{0} overflow")]
    Overflow(&'static str),

    /// No overload accepts the runtime argument types.
    #[error("no such overload: {0}")]
    NoSuchOverload(String),

    /// Failed type conversion, such as `int("abc")`.
    #[error("{0}")]
    Conversion(String),

    /// Error raised by a host-provided function.
    #[error("function call error: {0}")]
    FunctionCall(String),

    /// Expression nesting exceeded the evaluator's depth limit.
    #[error("evaluation depth limit exceeded: {max_depth}")]
    DepthExceeded { max_depth: usize },

    /// Comprehension iterations exceeded the configured budget.
    #[error("iteration budget exceeded: {0}")]
    IterationBudgetExceeded(usize),

    #[error("{0}")]
    Other(String),
}

impl EvalError {
    pub fn no_such_overload(function: &str, arg_types: &[&str]) -> Self {
        EvalError::NoSuchOverload(format!("{}({})", function, arg_types.join(", ")))
    }
}
