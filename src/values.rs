//! Conversion between engine values and host-neutral JSON.
//!
//! Going out, every value has a JSON form, although some of them lose
//! information on the way: an empty optional and `null` both become `null`,
//! and map keys become strings. Coming in, the declared type of the receiving
//! variable or function result decides how JSON scalars are read, so `"AQI="`
//! becomes bytes for a `bytes` parameter and stays a string for a `string`
//! one.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use celrt_core::Type;
use celrt_core::values::time::{format_duration, format_timestamp, parse_duration, parse_timestamp};
use celrt_core::values::{MapKey, Value};
use serde_json::{Map, Number, Value as Json};

use crate::error::{Error, Result};

/// Convert an evaluation result to JSON.
pub fn to_json(value: &Value) -> Json {
    match value {
        Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Int(i) => Json::from(*i),
        Value::Uint(u) => Json::from(*u),
        Value::Double(d) => double_to_json(*d),
        Value::String(s) => Json::String(s.to_string()),
        Value::Bytes(b) => Json::String(BASE64.encode(b)),
        Value::List(items) => Json::Array(items.iter().map(to_json).collect()),
        Value::Map(entries) => Json::Object(
            entries
                .iter()
                .map(|(key, value)| (key_to_string(key), to_json(value)))
                .collect(),
        ),
        Value::Optional(Some(inner)) => to_json(inner),
        Value::Optional(None) => Json::Null,
        Value::Timestamp(ts) => Json::String(format_timestamp(ts)),
        Value::Duration(d) => Json::String(format_duration(d)),
        Value::Type(ty) => Json::String(ty.to_string()),
    }
}

fn double_to_json(d: f64) -> Json {
    match Number::from_f64(d) {
        Some(number) => Json::Number(number),
        None if d.is_nan() => Json::String("NaN".to_string()),
        None if d > 0.0 => Json::String("Infinity".to_string()),
        None => Json::String("-Infinity".to_string()),
    }
}

fn key_to_string(key: &MapKey) -> String {
    match key {
        MapKey::String(s) => s.to_string(),
        MapKey::Bool(b) => b.to_string(),
        MapKey::Int(i) => i.to_string(),
        MapKey::Uint(u) => u.to_string(),
    }
}

/// Convert host JSON to an engine value.
///
/// `declared` is the type the value is bound to; `None` or `dyn` reads the
/// JSON as-is, with integral numbers becoming `int`.
pub fn from_json(json: &Json, declared: Option<&Type>) -> Result<Value> {
    let declared = declared.filter(|ty| !ty.is_dyn());
    if let Some(Type::Optional(inner)) = declared {
        return match json {
            Json::Null => Ok(Value::none()),
            other => Ok(Value::some(from_json(other, Some(&**inner))?)),
        };
    }

    match json {
        Json::Null => Ok(Value::Null),
        Json::Bool(b) => Ok(Value::Bool(*b)),
        Json::Number(n) => number_from_json(n, declared),
        Json::String(s) => string_from_json(s, declared),
        Json::Array(items) => {
            let elem = declared.and_then(Type::list_elem);
            let items = items
                .iter()
                .map(|item| from_json(item, elem))
                .collect::<Result<Vec<_>>>()?;
            Ok(Value::list(items))
        }
        Json::Object(entries) => {
            let (key_type, value_type) = match declared {
                Some(Type::Map(key, value)) => (Some(&**key), Some(&**value)),
                _ => (None, None),
            };
            let entries = entries
                .iter()
                .map(|(key, value)| Ok((key_from_string(key, key_type)?, from_json(value, value_type)?)))
                .collect::<Result<Vec<_>>>()?;
            Ok(Value::map(entries))
        }
    }
}

fn number_from_json(n: &Number, declared: Option<&Type>) -> Result<Value> {
    let mismatch = || Error::InvalidInput(format!("cannot convert {} to {}", n, type_label(declared)));
    match declared {
        Some(Type::Uint) => n
            .as_u64()
            .or_else(|| n.as_f64().and_then(integral).and_then(|f| (f >= 0.0).then_some(f as u64)))
            .map(Value::Uint)
            .ok_or_else(mismatch),
        Some(Type::Double) => n.as_f64().map(Value::Double).ok_or_else(mismatch),
        Some(Type::Int) => n
            .as_i64()
            .or_else(|| n.as_f64().and_then(integral).map(|f| f as i64))
            .map(Value::Int)
            .ok_or_else(mismatch),
        Some(Type::Duration) => n
            .as_f64()
            .map(|seconds| Value::Duration(chrono::TimeDelta::nanoseconds((seconds * 1e9) as i64)))
            .ok_or_else(mismatch),
        _ => Ok(match (n.as_i64(), n.as_u64()) {
            (Some(i), _) => Value::Int(i),
            (None, Some(u)) => Value::Uint(u),
            _ => Value::Double(n.as_f64().unwrap_or(f64::NAN)),
        }),
    }
}

/// Whole-number doubles within the `i64` range, as produced by hosts whose
/// numbers are all floating point.
fn integral(f: f64) -> Option<f64> {
    (f.fract() == 0.0 && f.abs() < 9.2e18).then_some(f)
}

fn string_from_json(s: &str, declared: Option<&Type>) -> Result<Value> {
    match declared {
        Some(Type::Bytes) => BASE64
            .decode(s)
            .map(Value::bytes)
            .map_err(|e| Error::InvalidInput(format!("invalid base64 bytes: {}", e))),
        Some(Type::Timestamp) => parse_timestamp(s)
            .map(Value::Timestamp)
            .map_err(Error::InvalidInput),
        Some(Type::Duration) => parse_duration(s)
            .map(Value::Duration)
            .map_err(Error::InvalidInput),
        Some(Type::Double) => match s {
            "NaN" => Ok(Value::Double(f64::NAN)),
            "Infinity" => Ok(Value::Double(f64::INFINITY)),
            "-Infinity" => Ok(Value::Double(f64::NEG_INFINITY)),
            _ => Err(Error::InvalidInput(format!("cannot convert \"{}\" to double", s))),
        },
        _ => Ok(Value::string(s)),
    }
}

fn key_from_string(key: &str, declared: Option<&Type>) -> Result<MapKey> {
    let invalid = || Error::InvalidInput(format!("invalid {} map key \"{}\"", type_label(declared), key));
    match declared {
        Some(Type::Int) => key.parse().map(MapKey::Int).map_err(|_| invalid()),
        Some(Type::Uint) => key.parse().map(MapKey::Uint).map_err(|_| invalid()),
        Some(Type::Bool) => key.parse().map(MapKey::Bool).map_err(|_| invalid()),
        _ => Ok(MapKey::from(key)),
    }
}

fn type_label(declared: Option<&Type>) -> String {
    declared.map_or_else(|| "dyn".to_string(), Type::to_string)
}

/// Declaration type for a variable known only by its value.
///
/// Lists and maps are declared with `dyn` elements so that heterogeneous
/// host data still type-checks.
pub fn infer_type(json: &Json) -> Type {
    match json {
        Json::Bool(_) => Type::Bool,
        Json::Number(n) if n.is_i64() || n.is_u64() => Type::Int,
        Json::Number(_) => Type::Double,
        Json::String(_) => Type::String,
        Json::Array(_) => Type::list(Type::Dyn),
        Json::Object(_) => Type::map(Type::String, Type::Dyn),
        Json::Null => Type::Dyn,
    }
}

/// Convert a JSON object of variable values, guided by declared types.
pub fn vars_from_json<'a>(
    vars: &Map<String, Json>,
    declared: impl Fn(&str) -> Option<&'a Type>,
) -> Result<Vec<(String, Value)>> {
    vars.iter()
        .map(|(name, json)| Ok((name.clone(), from_json(json, declared(name))?)))
        .collect()
}
