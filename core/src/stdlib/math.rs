//! Arithmetic and comparison operators.
//!
//! Integer arithmetic is checked: overflow is an evaluation error rather than
//! a wrap-around. Double arithmetic follows IEEE 754.

use std::cmp::Ordering;

use chrono::{DateTime, Datelike, TimeDelta, Utc};

use crate::evaluator::EvalError;
use crate::parser::operators;
use crate::values::Value;

// ============================================================================
// Arithmetic
// ============================================================================

pub fn add(a: &Value, b: &Value) -> Result<Value, EvalError> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => x.checked_add(*y).map(Value::Int).ok_or(EvalError::Overflow("int")),
        (Value::Uint(x), Value::Uint(y)) => {
            x.checked_add(*y).map(Value::Uint).ok_or(EvalError::Overflow("uint"))
        }
        (Value::Double(x), Value::Double(y)) => Ok(Value::Double(x + y)),
        (Value::String(x), Value::String(y)) => {
            let mut s = x.clone();
            s.push_str(y);
            Ok(Value::String(s))
        }
        (Value::Bytes(x), Value::Bytes(y)) => Ok(Value::bytes([&x[..], &y[..]].concat())),
        (Value::List(x), Value::List(y)) => {
            let mut items = Vec::with_capacity(x.len() + y.len());
            items.extend(x.iter().cloned());
            items.extend(y.iter().cloned());
            Ok(Value::list(items))
        }
        (Value::Timestamp(ts), Value::Duration(d)) | (Value::Duration(d), Value::Timestamp(ts)) => {
            shift_timestamp(ts, *d)
        }
        (Value::Duration(x), Value::Duration(y)) => x
            .checked_add(y)
            .map(Value::Duration)
            .ok_or(EvalError::Overflow("duration")),
        _ => Err(overload(operators::ADD, &[a, b])),
    }
}

pub fn subtract(a: &Value, b: &Value) -> Result<Value, EvalError> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => x.checked_sub(*y).map(Value::Int).ok_or(EvalError::Overflow("int")),
        (Value::Uint(x), Value::Uint(y)) => {
            x.checked_sub(*y).map(Value::Uint).ok_or(EvalError::Overflow("uint"))
        }
        (Value::Double(x), Value::Double(y)) => Ok(Value::Double(x - y)),
        (Value::Timestamp(x), Value::Timestamp(y)) => Ok(Value::Duration(x.signed_duration_since(*y))),
        (Value::Timestamp(ts), Value::Duration(d)) => match TimeDelta::zero().checked_sub(d) {
            Some(negated) => shift_timestamp(ts, negated),
            None => Err(EvalError::Overflow("timestamp")),
        },
        (Value::Duration(x), Value::Duration(y)) => x
            .checked_sub(y)
            .map(Value::Duration)
            .ok_or(EvalError::Overflow("duration")),
        _ => Err(overload(operators::SUBTRACT, &[a, b])),
    }
}

pub fn multiply(a: &Value, b: &Value) -> Result<Value, EvalError> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => x.checked_mul(*y).map(Value::Int).ok_or(EvalError::Overflow("int")),
        (Value::Uint(x), Value::Uint(y)) => {
            x.checked_mul(*y).map(Value::Uint).ok_or(EvalError::Overflow("uint"))
        }
        (Value::Double(x), Value::Double(y)) => Ok(Value::Double(x * y)),
        _ => Err(overload(operators::MULTIPLY, &[a, b])),
    }
}

pub fn divide(a: &Value, b: &Value) -> Result<Value, EvalError> {
    match (a, b) {
        (Value::Int(_), Value::Int(0)) | (Value::Uint(_), Value::Uint(0)) => {
            Err(EvalError::DivisionByZero)
        }
        // i64::MIN / -1 is the only overflowing case.
        (Value::Int(x), Value::Int(y)) => x.checked_div(*y).map(Value::Int).ok_or(EvalError::Overflow("int")),
        (Value::Uint(x), Value::Uint(y)) => Ok(Value::Uint(x / y)),
        (Value::Double(x), Value::Double(y)) => Ok(Value::Double(x / y)),
        _ => Err(overload(operators::DIVIDE, &[a, b])),
    }
}

pub fn modulo(a: &Value, b: &Value) -> Result<Value, EvalError> {
    match (a, b) {
        (Value::Int(_), Value::Int(0)) | (Value::Uint(_), Value::Uint(0)) => {
            Err(EvalError::ModulusByZero)
        }
        (Value::Int(x), Value::Int(y)) => x.checked_rem(*y).map(Value::Int).ok_or(EvalError::Overflow("int")),
        (Value::Uint(x), Value::Uint(y)) => Ok(Value::Uint(x % y)),
        _ => Err(overload(operators::MODULO, &[a, b])),
    }
}

pub fn negate(a: &Value) -> Result<Value, EvalError> {
    match a {
        Value::Int(x) => x.checked_neg().map(Value::Int).ok_or(EvalError::Overflow("int")),
        Value::Double(x) => Ok(Value::Double(-x)),
        Value::Duration(d) => TimeDelta::zero()
            .checked_sub(d)
            .map(Value::Duration)
            .ok_or(EvalError::Overflow("duration")),
        _ => Err(overload(operators::NEGATE, &[a])),
    }
}

/// Add a duration to a timestamp, keeping the result within years 1..=9999.
fn shift_timestamp(ts: &DateTime<Utc>, d: TimeDelta) -> Result<Value, EvalError> {
    ts.checked_add_signed(d)
        .filter(|shifted| (1..=9999).contains(&shifted.year()))
        .map(Value::Timestamp)
        .ok_or(EvalError::Overflow("timestamp"))
}

// ============================================================================
// Comparison
// ============================================================================

/// Relational operators. Numbers compare across int, uint and double.
pub fn compare(op: &str, a: &Value, b: &Value) -> Result<Value, EvalError> {
    let ordering = match a.cel_cmp(b) {
        Some(ordering) => ordering,
        // NaN is unordered: every comparison is false.
        None if is_nan(a) || is_nan(b) => return Ok(Value::Bool(false)),
        None => return Err(overload(op, &[a, b])),
    };
    let result = match op {
        operators::LESS => ordering == Ordering::Less,
        operators::LESS_EQUALS => ordering != Ordering::Greater,
        operators::GREATER => ordering == Ordering::Greater,
        operators::GREATER_EQUALS => ordering != Ordering::Less,
        _ => return Err(overload(op, &[a, b])),
    };
    Ok(Value::Bool(result))
}

fn is_nan(v: &Value) -> bool {
    matches!(v, Value::Double(d) if d.is_nan())
}

pub(crate) fn overload(function: &str, args: &[&Value]) -> EvalError {
    let names: Vec<&str> = args.iter().map(|v| v.type_name()).collect();
    EvalError::no_such_overload(function, &names)
}
