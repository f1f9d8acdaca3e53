//! Indexing and membership on lists and maps.

use super::math::overload;
use crate::evaluator::EvalError;
use crate::parser::operators;
use crate::values::{MapKey, Value, lookup_key};

/// `container[index]`.
pub fn index(container: &Value, idx: &Value) -> Result<Value, EvalError> {
    match container {
        Value::List(items) => {
            let i = list_position(idx).ok_or_else(|| overload(operators::INDEX, &[container, idx]))?;
            usize::try_from(i)
                .ok()
                .and_then(|pos| items.get(pos))
                .cloned()
                .ok_or(EvalError::IndexOutOfRange {
                    index: i,
                    len: items.len(),
                })
        }
        Value::Map(entries) => {
            let key = MapKey::from_value(idx)
                .ok_or_else(|| overload(operators::INDEX, &[container, idx]))?;
            lookup_key(entries, &key)
                .cloned()
                .ok_or_else(|| EvalError::NoSuchKey(key.to_string()))
        }
        _ => Err(overload(operators::INDEX, &[container, idx])),
    }
}

/// `container[?index]`: `optional.none()` instead of an error when absent.
pub fn optional_index(container: &Value, idx: &Value) -> Result<Value, EvalError> {
    match container {
        Value::Optional(None) => Ok(Value::none()),
        Value::Optional(Some(inner)) => optional_index(inner, idx),
        Value::List(items) => {
            let i = list_position(idx)
                .ok_or_else(|| overload(operators::OPT_INDEX, &[container, idx]))?;
            Ok(usize::try_from(i)
                .ok()
                .and_then(|pos| items.get(pos))
                .cloned()
                .map_or_else(Value::none, Value::some))
        }
        Value::Map(entries) => {
            let key = MapKey::from_value(idx)
                .ok_or_else(|| overload(operators::OPT_INDEX, &[container, idx]))?;
            Ok(lookup_key(entries, &key)
                .cloned()
                .map_or_else(Value::none, Value::some))
        }
        _ => Err(overload(operators::OPT_INDEX, &[container, idx])),
    }
}

/// `elem in container`: list membership or map key presence.
pub fn contains(elem: &Value, container: &Value) -> Result<Value, EvalError> {
    match container {
        Value::List(items) => Ok(Value::Bool(items.iter().any(|item| item.cel_equals(elem)))),
        Value::Map(entries) => Ok(Value::Bool(
            MapKey::from_value(elem).is_some_and(|key| lookup_key(entries, &key).is_some()),
        )),
        _ => Err(overload(operators::IN, &[elem, container])),
    }
}

/// List positions may be given as int, uint or an integral double.
fn list_position(idx: &Value) -> Option<i64> {
    match idx {
        Value::Int(i) => Some(*i),
        Value::Uint(u) => i64::try_from(*u).ok(),
        Value::Double(d) if d.fract() == 0.0 && d.is_finite() => Some(*d as i64),
        _ => None,
    }
}
