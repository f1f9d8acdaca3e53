//! Type conversion functions: `int`, `uint`, `double`, `string`, `bytes`,
//! `bool`, `timestamp`, `duration`, `dyn` and `type`.

use chrono::DateTime;

use super::math::overload;
use crate::evaluator::EvalError;
use crate::values::Value;
use crate::values::time::{format_duration, format_timestamp, parse_duration, parse_timestamp};

// Bounds for double to integer conversion; both are exactly representable.
const INT_UPPER: f64 = 9.223_372_036_854_775_808e18;
const UINT_UPPER: f64 = 1.844_674_407_370_955_2e19;

pub fn convert(name: &str, value: &Value) -> Result<Value, EvalError> {
    match name {
        "int" => to_int(value),
        "uint" => to_uint(value),
        "double" => to_double(value),
        "string" => to_string(value),
        "bytes" => to_bytes(value),
        "bool" => to_bool(value),
        "timestamp" => to_timestamp(value),
        "duration" => to_duration(value),
        "dyn" => Ok(value.clone()),
        "type" => Ok(Value::Type(value.type_of())),
        _ => Err(overload(name, &[value])),
    }
}

pub fn is_conversion(name: &str) -> bool {
    matches!(
        name,
        "int" | "uint" | "double" | "string" | "bytes" | "bool" | "timestamp" | "duration" | "dyn" | "type"
    )
}

fn range_error(target: &str) -> EvalError {
    EvalError::Conversion(format!("{} return error: range error", target))
}

fn to_int(value: &Value) -> Result<Value, EvalError> {
    match value {
        Value::Int(i) => Ok(Value::Int(*i)),
        Value::Uint(u) => i64::try_from(*u).map(Value::Int).map_err(|_| range_error("int")),
        Value::Double(d) => {
            if d.is_finite() && *d >= -INT_UPPER && *d < INT_UPPER {
                Ok(Value::Int(d.trunc() as i64))
            } else {
                Err(range_error("int"))
            }
        }
        Value::String(s) => s
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| EvalError::Conversion(format!("cannot convert string '{}' to int", s))),
        Value::Timestamp(ts) => Ok(Value::Int(ts.timestamp())),
        _ => Err(overload("int", &[value])),
    }
}

fn to_uint(value: &Value) -> Result<Value, EvalError> {
    match value {
        Value::Uint(u) => Ok(Value::Uint(*u)),
        Value::Int(i) => u64::try_from(*i).map(Value::Uint).map_err(|_| range_error("uint")),
        Value::Double(d) => {
            if d.is_finite() && *d > -1.0 && *d < UINT_UPPER {
                Ok(Value::Uint(d.trunc() as u64))
            } else {
                Err(range_error("uint"))
            }
        }
        Value::String(s) => s
            .parse::<u64>()
            .map(Value::Uint)
            .map_err(|_| EvalError::Conversion(format!("cannot convert string '{}' to uint", s))),
        _ => Err(overload("uint", &[value])),
    }
}

fn to_double(value: &Value) -> Result<Value, EvalError> {
    match value {
        Value::Double(d) => Ok(Value::Double(*d)),
        Value::Int(i) => Ok(Value::Double(*i as f64)),
        Value::Uint(u) => Ok(Value::Double(*u as f64)),
        Value::String(s) => s
            .parse::<f64>()
            .map(Value::Double)
            .map_err(|_| EvalError::Conversion(format!("cannot convert string '{}' to double", s))),
        _ => Err(overload("double", &[value])),
    }
}

fn to_string(value: &Value) -> Result<Value, EvalError> {
    let text = match value {
        Value::String(s) => return Ok(Value::String(s.clone())),
        Value::Int(i) => i.to_string(),
        Value::Uint(u) => u.to_string(),
        Value::Double(d) => d.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Bytes(b) => std::str::from_utf8(b)
            .map_err(|_| EvalError::Conversion("invalid UTF-8 in bytes, cannot convert to string".to_string()))?
            .to_string(),
        Value::Timestamp(ts) => format_timestamp(ts),
        Value::Duration(d) => format_duration(d),
        _ => return Err(overload("string", &[value])),
    };
    Ok(Value::string(text))
}

fn to_bytes(value: &Value) -> Result<Value, EvalError> {
    match value {
        Value::Bytes(b) => Ok(Value::Bytes(b.clone())),
        Value::String(s) => Ok(Value::bytes(s.as_bytes())),
        _ => Err(overload("bytes", &[value])),
    }
}

fn to_bool(value: &Value) -> Result<Value, EvalError> {
    match value {
        Value::Bool(b) => Ok(Value::Bool(*b)),
        Value::String(s) => match s.as_str() {
            "1" | "t" | "T" | "true" | "TRUE" | "True" => Ok(Value::Bool(true)),
            "0" | "f" | "F" | "false" | "FALSE" | "False" => Ok(Value::Bool(false)),
            _ => Err(EvalError::Conversion(format!(
                "cannot convert string '{}' to bool",
                s
            ))),
        },
        _ => Err(overload("bool", &[value])),
    }
}

fn to_timestamp(value: &Value) -> Result<Value, EvalError> {
    match value {
        Value::Timestamp(ts) => Ok(Value::Timestamp(*ts)),
        Value::String(s) => parse_timestamp(s)
            .map(Value::Timestamp)
            .map_err(EvalError::Conversion),
        Value::Int(secs) => DateTime::from_timestamp(*secs, 0)
            .map(Value::Timestamp)
            .ok_or_else(|| range_error("timestamp")),
        _ => Err(overload("timestamp", &[value])),
    }
}

fn to_duration(value: &Value) -> Result<Value, EvalError> {
    match value {
        Value::Duration(d) => Ok(Value::Duration(*d)),
        Value::String(s) => parse_duration(s)
            .map(Value::Duration)
            .map_err(EvalError::Conversion),
        _ => Err(overload("duration", &[value])),
    }
}
