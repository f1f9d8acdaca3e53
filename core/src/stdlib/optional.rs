//! Optional values: `optional.of`, `optional.ofNonZeroValue`,
//! `optional.none`, `hasValue`, `value`, `orValue`, `or` and optional field
//! selection.

use super::math::overload;
use crate::evaluator::EvalError;
use crate::parser::operators;
use crate::values::{MapKey, Value, lookup_key};

pub fn call(name: &str, target: Option<&Value>, args: &[Value]) -> Result<Value, EvalError> {
    match (name, target, args) {
        ("optional.of", None, [value]) => Ok(Value::some(value.clone())),
        ("optional.ofNonZeroValue", None, [value]) => Ok(if value.is_zero() {
            Value::none()
        } else {
            Value::some(value.clone())
        }),
        ("optional.none", None, []) => Ok(Value::none()),
        ("hasValue", Some(Value::Optional(inner)), []) => Ok(Value::Bool(inner.is_some())),
        ("value", Some(Value::Optional(Some(inner))), []) => Ok((**inner).clone()),
        ("value", Some(Value::Optional(None)), []) => {
            Err(EvalError::Other("optional.none() dereference".to_string()))
        }
        ("orValue", Some(Value::Optional(inner)), [alternative]) => Ok(inner
            .as_deref()
            .cloned()
            .unwrap_or_else(|| alternative.clone())),
        ("or", Some(Value::Optional(inner)), [alternative @ Value::Optional(_)]) => {
            Ok(match inner {
                Some(_) => Value::Optional(inner.clone()),
                None => alternative.clone(),
            })
        }
        _ => {
            let mut all: Vec<&Value> = target.into_iter().collect();
            all.extend(args);
            Err(overload(name, &all))
        }
    }
}

/// `operand.?field`.
pub fn select(operand: &Value, field: &Value) -> Result<Value, EvalError> {
    match (operand, field) {
        (Value::Optional(None), _) => Ok(Value::none()),
        (Value::Optional(Some(inner)), _) => select(inner, field),
        (Value::Map(entries), Value::String(name)) => Ok(lookup_key(entries, &MapKey::String(name.clone()))
            .cloned()
            .map_or_else(Value::none, Value::some)),
        _ => Err(overload(operators::OPT_SELECT, &[operand, field])),
    }
}
