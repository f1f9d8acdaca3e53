//! Logical operators.
//!
//! `&&` and `||` are commutative with respect to errors: if either side
//! decides the result, an error on the other side is absorbed.

use crate::evaluator::EvalError;
use crate::parser::operators;
use crate::stdlib::math::overload;
use crate::values::Value;

type Outcome = Result<Value, EvalError>;

/// Combine the operands of `&&`. The right side is only evaluated when the
/// left side does not decide the result.
pub(super) fn logical_and(left: Outcome, right: impl FnOnce() -> Outcome) -> Outcome {
    if let Ok(Value::Bool(false)) = left {
        return Ok(Value::Bool(false));
    }
    let right = right();
    match (left, right) {
        (_, Ok(Value::Bool(false))) => Ok(Value::Bool(false)),
        (Ok(Value::Bool(true)), Ok(Value::Bool(true))) => Ok(Value::Bool(true)),
        (Err(e), _) | (_, Err(e)) => Err(e),
        (Ok(l), Ok(r)) => Err(overload(operators::LOGICAL_AND, &[&l, &r])),
    }
}

pub(super) fn logical_or(left: Outcome, right: impl FnOnce() -> Outcome) -> Outcome {
    if let Ok(Value::Bool(true)) = left {
        return Ok(Value::Bool(true));
    }
    let right = right();
    match (left, right) {
        (_, Ok(Value::Bool(true))) => Ok(Value::Bool(true)),
        (Ok(Value::Bool(false)), Ok(Value::Bool(false))) => Ok(Value::Bool(false)),
        (Err(e), _) | (_, Err(e)) => Err(e),
        (Ok(l), Ok(r)) => Err(overload(operators::LOGICAL_OR, &[&l, &r])),
    }
}

/// Loop condition of `all` and `exists`: only a definite `false` stops.
pub(super) fn not_strictly_false(value: Outcome) -> bool {
    !matches!(value, Ok(Value::Bool(false)))
}
