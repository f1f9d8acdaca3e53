//! String functions.
//!
//! Design notes:
//! - `size` counts Unicode code points for strings and bytes for bytes
//! - `matches` uses RE2-compatible syntax through the `regex` crate and
//!   succeeds on a match anywhere in the string

use regex::Regex;

use super::math::overload;
use crate::evaluator::EvalError;
use crate::values::Value;

// ============================================================================
// Inspection Functions
// ============================================================================

/// Length of a string, bytes, list or map.
pub fn size(value: &Value) -> Result<Value, EvalError> {
    let len = match value {
        Value::String(s) => s.chars().count(),
        Value::Bytes(b) => b.len(),
        Value::List(items) => items.len(),
        Value::Map(entries) => entries.len(),
        _ => return Err(overload("size", &[value])),
    };
    Ok(Value::Int(len as i64))
}

pub fn contains(s: &Value, needle: &Value) -> Result<Value, EvalError> {
    let (s, needle) = strings("contains", s, needle)?;
    Ok(Value::Bool(s.contains(needle)))
}

pub fn starts_with(s: &Value, prefix: &Value) -> Result<Value, EvalError> {
    let (s, prefix) = strings("startsWith", s, prefix)?;
    Ok(Value::Bool(s.starts_with(prefix)))
}

pub fn ends_with(s: &Value, suffix: &Value) -> Result<Value, EvalError> {
    let (s, suffix) = strings("endsWith", s, suffix)?;
    Ok(Value::Bool(s.ends_with(suffix)))
}

// ============================================================================
// Pattern Matching
// ============================================================================

pub fn matches(s: &Value, pattern: &Value) -> Result<Value, EvalError> {
    let (s, pattern) = strings("matches", s, pattern)?;
    let regex = Regex::new(pattern)
        .map_err(|e| EvalError::Other(format!("invalid regular expression '{}': {}", pattern, e)))?;
    Ok(Value::Bool(regex.is_match(s)))
}

fn strings<'v>(
    function: &str,
    a: &'v Value,
    b: &'v Value,
) -> Result<(&'v str, &'v str), EvalError> {
    match (a, b) {
        (Value::String(a), Value::String(b)) => Ok((a.as_str(), b.as_str())),
        _ => Err(overload(function, &[a, b])),
    }
}
