use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use ecow::EcoString;
use indexmap::IndexMap;

use super::time::{format_duration, format_timestamp};
use crate::parser::Literal;
use crate::syntax::{escape_bytes, escape_string};
use crate::types::Type;

/// Runtime value produced by evaluation.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Double(f64),
    String(EcoString),
    Bytes(Arc<[u8]>),
    List(Arc<Vec<Value>>),
    Map(Arc<IndexMap<MapKey, Value>>),
    /// `optional.of(v)` is `Optional(Some(v))`, `optional.none()` is `Optional(None)`.
    Optional(Option<Box<Value>>),
    Timestamp(DateTime<Utc>),
    Duration(TimeDelta),
    Type(Type),
}

/// Keys allowed in CEL maps.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MapKey {
    Bool(bool),
    Int(i64),
    Uint(u64),
    String(EcoString),
}

impl Value {
    pub fn string(s: impl Into<EcoString>) -> Self {
        Value::String(s.into())
    }

    pub fn bytes(b: impl Into<Vec<u8>>) -> Self {
        Value::Bytes(Arc::from(b.into()))
    }

    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Arc::new(items))
    }

    pub fn map(entries: impl IntoIterator<Item = (MapKey, Value)>) -> Self {
        Value::Map(Arc::new(entries.into_iter().collect()))
    }

    pub fn some(value: Value) -> Self {
        Value::Optional(Some(Box::new(value)))
    }

    pub fn none() -> Self {
        Value::Optional(None)
    }

    /// Runtime type of the value. Collections report `dyn` element types.
    pub fn type_of(&self) -> Type {
        match self {
            Value::Null => Type::Null,
            Value::Bool(_) => Type::Bool,
            Value::Int(_) => Type::Int,
            Value::Uint(_) => Type::Uint,
            Value::Double(_) => Type::Double,
            Value::String(_) => Type::String,
            Value::Bytes(_) => Type::Bytes,
            Value::List(_) => Type::list(Type::Dyn),
            Value::Map(_) => Type::map(Type::Dyn, Type::Dyn),
            Value::Optional(_) => Type::optional(Type::Dyn),
            Value::Timestamp(_) => Type::Timestamp,
            Value::Duration(_) => Type::Duration,
            Value::Type(_) => Type::type_of(Type::Dyn),
        }
    }

    /// Short type name used in overload error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null_type",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Uint(_) => "uint",
            Value::Double(_) => "double",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Optional(_) => "optional_type",
            Value::Timestamp(_) => "google.protobuf.Timestamp",
            Value::Duration(_) => "google.protobuf.Duration",
            Value::Type(_) => "type",
        }
    }

    /// Whether the value is the zero value of its type.
    pub fn is_zero(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Bool(b) => !b,
            Value::Int(i) => *i == 0,
            Value::Uint(u) => *u == 0,
            Value::Double(d) => *d == 0.0,
            Value::String(s) => s.is_empty(),
            Value::Bytes(b) => b.is_empty(),
            Value::List(items) => items.is_empty(),
            Value::Map(entries) => entries.is_empty(),
            Value::Optional(inner) => inner.is_none(),
            Value::Timestamp(ts) => ts.timestamp() == 0 && ts.timestamp_subsec_nanos() == 0,
            Value::Duration(d) => d.is_zero(),
            Value::Type(_) => false,
        }
    }

    /// Whether the runtime value can inhabit a declared type.
    pub fn matches_type(&self, ty: &Type) -> bool {
        match (ty, self) {
            (Type::Dyn | Type::Error, _) => true,
            (Type::Bool, Value::Bool(_))
            | (Type::Int, Value::Int(_))
            | (Type::Uint, Value::Uint(_))
            | (Type::Double, Value::Double(_))
            | (Type::String, Value::String(_))
            | (Type::Bytes, Value::Bytes(_))
            | (Type::Null, Value::Null)
            | (Type::Timestamp, Value::Timestamp(_))
            | (Type::Duration, Value::Duration(_))
            | (Type::Type(_), Value::Type(_)) => true,
            (Type::List(elem), Value::List(items)) => items.iter().all(|v| v.matches_type(elem)),
            (Type::Map(key, value), Value::Map(entries)) => entries
                .iter()
                .all(|(k, v)| k.matches_type(key) && v.matches_type(value)),
            (Type::Optional(inner), Value::Optional(v)) => {
                v.as_deref().is_none_or(|v| v.matches_type(inner))
            }
            _ => false,
        }
    }

    /// CEL equality: numbers compare across int, uint and double, values of
    /// unrelated types are simply unequal.
    pub fn cel_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Timestamp(a), Value::Timestamp(b)) => a == b,
            (Value::Duration(a), Value::Duration(b)) => a == b,
            (Value::Type(a), Value::Type(b)) => a == b,
            (Value::List(a), Value::List(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.cel_equals(y))
            }
            (Value::Map(a), Value::Map(b)) => {
                a.len() == b.len()
                    && a.iter().all(|(k, v)| {
                        lookup_key(b, k).is_some_and(|other| v.cel_equals(other))
                    })
            }
            (Value::Optional(a), Value::Optional(b)) => match (a, b) {
                (Some(x), Some(y)) => x.cel_equals(y),
                (None, None) => true,
                _ => false,
            },
            _ => self
                .numeric_cmp(other)
                .is_some_and(|ord| ord == Ordering::Equal),
        }
    }

    /// Ordering between numbers of any numeric kind.
    pub fn numeric_cmp(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Uint(a), Value::Uint(b)) => Some(a.cmp(b)),
            (Value::Double(a), Value::Double(b)) => a.partial_cmp(b),
            (Value::Int(a), Value::Uint(b)) => Some(compare_int_uint(*a, *b)),
            (Value::Uint(a), Value::Int(b)) => Some(compare_int_uint(*b, *a).reverse()),
            (Value::Int(a), Value::Double(b)) => compare_int_double(*a, *b),
            (Value::Double(a), Value::Int(b)) => compare_int_double(*b, *a).map(Ordering::reverse),
            (Value::Uint(a), Value::Double(b)) => compare_uint_double(*a, *b),
            (Value::Double(a), Value::Uint(b)) => {
                compare_uint_double(*b, *a).map(Ordering::reverse)
            }
            _ => None,
        }
    }

    /// Ordering for the relational operators, `None` when incomparable.
    pub fn cel_cmp(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Bytes(a), Value::Bytes(b)) => Some(a.cmp(b)),
            (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),
            (Value::Duration(a), Value::Duration(b)) => Some(a.cmp(b)),
            _ => self.numeric_cmp(other),
        }
    }
}

fn compare_int_uint(a: i64, b: u64) -> Ordering {
    if a < 0 {
        Ordering::Less
    } else {
        (a as u64).cmp(&b)
    }
}

fn compare_int_double(a: i64, b: f64) -> Option<Ordering> {
    if b.is_nan() {
        return None;
    }
    if b >= 9.223_372_036_854_775_808e18 {
        return Some(Ordering::Less);
    }
    if b < -9.223_372_036_854_775_808e18 {
        return Some(Ordering::Greater);
    }
    // Both sides fit in the i64 range: compare the integral parts exactly
    // and fall back to the fraction on ties.
    let truncated = b.trunc();
    match a.cmp(&(truncated as i64)) {
        Ordering::Equal => 0.0f64.partial_cmp(&(b - truncated)),
        ord => Some(ord),
    }
}

fn compare_uint_double(a: u64, b: f64) -> Option<Ordering> {
    if b.is_nan() {
        return None;
    }
    if b < 0.0 {
        return Some(Ordering::Greater);
    }
    if b >= 1.844_674_407_370_955_2e19 {
        return Some(Ordering::Less);
    }
    let truncated = b.trunc();
    match a.cmp(&(truncated as u64)) {
        Ordering::Equal => 0.0f64.partial_cmp(&(b - truncated)),
        ord => Some(ord),
    }
}

/// Map lookup that treats numerically equal int, uint and double keys alike.
pub fn lookup_key<'m>(map: &'m IndexMap<MapKey, Value>, key: &MapKey) -> Option<&'m Value> {
    if let Some(value) = map.get(key) {
        return Some(value);
    }
    match key {
        MapKey::Int(i) => u64::try_from(*i).ok().and_then(|u| map.get(&MapKey::Uint(u))),
        MapKey::Uint(u) => i64::try_from(*u).ok().and_then(|i| map.get(&MapKey::Int(i))),
        _ => None,
    }
}

impl MapKey {
    /// Convert a value into a map key. Doubles with an exact integer value are
    /// accepted for lookups.
    pub fn from_value(value: &Value) -> Option<MapKey> {
        match value {
            Value::Bool(b) => Some(MapKey::Bool(*b)),
            Value::Int(i) => Some(MapKey::Int(*i)),
            Value::Uint(u) => Some(MapKey::Uint(*u)),
            Value::String(s) => Some(MapKey::String(s.clone())),
            Value::Double(d) if d.fract() == 0.0 && d.is_finite() => {
                if *d >= 0.0 && *d < 1.844_674_407_370_955_2e19 {
                    Some(MapKey::Uint(*d as u64))
                } else if *d >= -9.223_372_036_854_775_808e18 && *d < 0.0 {
                    Some(MapKey::Int(*d as i64))
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            MapKey::Bool(b) => Value::Bool(*b),
            MapKey::Int(i) => Value::Int(*i),
            MapKey::Uint(u) => Value::Uint(*u),
            MapKey::String(s) => Value::String(s.clone()),
        }
    }

    fn matches_type(&self, ty: &Type) -> bool {
        self.to_value().matches_type(ty)
    }
}

impl fmt::Display for MapKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapKey::Bool(b) => write!(f, "{}", b),
            MapKey::Int(i) => write!(f, "{}", i),
            MapKey::Uint(u) => write!(f, "{}", u),
            MapKey::String(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for MapKey {
    fn from(s: &str) -> Self {
        MapKey::String(s.into())
    }
}

impl From<i64> for MapKey {
    fn from(i: i64) -> Self {
        MapKey::Int(i)
    }
}

/// Structural equality, used by tests and caches. Use [`Value::cel_equals`]
/// for the language's `==`.
impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Uint(a), Value::Uint(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Optional(a), Value::Optional(b)) => a == b,
            (Value::Timestamp(a), Value::Timestamp(b)) => a == b,
            (Value::Duration(a), Value::Duration(b)) => a == b,
            (Value::Type(a), Value::Type(b)) => a == b,
            _ => false,
        }
    }
}

impl From<&Literal> for Value {
    fn from(literal: &Literal) -> Self {
        match literal {
            Literal::Null => Value::Null,
            Literal::Bool(b) => Value::Bool(*b),
            Literal::Int(i) => Value::Int(*i),
            Literal::Uint(u) => Value::Uint(*u),
            Literal::Double(d) => Value::Double(*d),
            Literal::String(s) => Value::String(s.clone()),
            Literal::Bytes(b) => Value::Bytes(b.clone()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<u64> for Value {
    fn from(u: u64) -> Self {
        Value::Uint(u)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Double(d)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s.into())
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::list(items)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Uint(u) => write!(f, "{}u", u),
            Value::Double(d) => write!(f, "{:?}", d),
            Value::String(s) => escape_string(f, s),
            Value::Bytes(b) => escape_bytes(f, b),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Map(entries) => {
                write!(f, "{{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", key.to_value(), value)?;
                }
                write!(f, "}}")
            }
            Value::Optional(Some(inner)) => write!(f, "optional.of({})", inner),
            Value::Optional(None) => write!(f, "optional.none()"),
            Value::Timestamp(ts) => write!(f, "timestamp(\"{}\")", format_timestamp(ts)),
            Value::Duration(d) => write!(f, "duration(\"{}\")", format_duration(d)),
            Value::Type(ty) => write!(f, "{}", ty),
        }
    }
}
