//! Timestamp and duration accessors.
//!
//! Timestamp accessors take an optional time zone argument: `"UTC"`, `"Z"`
//! or a fixed offset such as `"+05:30"`. Without it they use UTC.

use chrono::{DateTime, Datelike, FixedOffset, TimeDelta, Timelike, Utc};

use super::math::overload;
use crate::evaluator::EvalError;
use crate::values::Value;

pub fn accessor(name: &str, target: &Value, args: &[Value]) -> Result<Value, EvalError> {
    match (target, args) {
        (Value::Timestamp(ts), []) => timestamp_field(name, &with_zone(ts, None)?),
        (Value::Timestamp(ts), [Value::String(zone)]) => {
            timestamp_field(name, &with_zone(ts, Some(zone.as_str()))?)
        }
        (Value::Duration(d), []) => duration_field(name, d),
        _ => {
            let mut all = vec![target];
            all.extend(args);
            Err(overload(name, &all))
        }
    }
}

fn with_zone(ts: &DateTime<Utc>, zone: Option<&str>) -> Result<DateTime<FixedOffset>, EvalError> {
    let offset = match zone {
        None | Some("UTC") | Some("Z") => FixedOffset::east_opt(0),
        Some(zone) => parse_offset(zone),
    };
    offset
        .map(|offset| ts.with_timezone(&offset))
        .ok_or_else(|| EvalError::Other(format!("unknown time zone '{}'", zone.unwrap_or(""))))
}

/// `+HH:MM` or `-HH:MM`.
fn parse_offset(zone: &str) -> Option<FixedOffset> {
    let (sign, rest) = match zone.as_bytes().first()? {
        b'+' => (1, &zone[1..]),
        b'-' => (-1, &zone[1..]),
        _ => return None,
    };
    let (hours, minutes) = rest.split_once(':')?;
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if hours > 23 || minutes > 59 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

fn timestamp_field(name: &str, ts: &DateTime<FixedOffset>) -> Result<Value, EvalError> {
    let value = match name {
        "getFullYear" => ts.year() as i64,
        // Month and day-of-month accessors are zero-based; getDate is not.
        "getMonth" => ts.month0() as i64,
        "getDate" => ts.day() as i64,
        "getDayOfMonth" => ts.day0() as i64,
        "getDayOfWeek" => ts.weekday().num_days_from_sunday() as i64,
        "getDayOfYear" => ts.ordinal0() as i64,
        "getHours" => ts.hour() as i64,
        "getMinutes" => ts.minute() as i64,
        "getSeconds" => ts.second() as i64,
        "getMilliseconds" => (ts.nanosecond() / 1_000_000) as i64,
        _ => return Err(EvalError::no_such_overload(name, &["google.protobuf.Timestamp"])),
    };
    Ok(Value::Int(value))
}

fn duration_field(name: &str, d: &TimeDelta) -> Result<Value, EvalError> {
    let value = match name {
        "getHours" => d.num_hours(),
        "getMinutes" => d.num_minutes(),
        "getSeconds" => d.num_seconds(),
        "getMilliseconds" => d.num_milliseconds(),
        _ => return Err(EvalError::no_such_overload(name, &["google.protobuf.Duration"])),
    };
    Ok(Value::Int(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::values::time::{parse_duration, parse_timestamp};

    fn ts(text: &str) -> Value {
        Value::Timestamp(parse_timestamp(text).unwrap())
    }

    #[test]
    fn test_timestamp_accessors() {
        let t = ts("2024-03-05T07:08:09.250Z");
        let get = |name: &str| accessor(name, &t, &[]).unwrap();
        assert_eq!(get("getFullYear"), Value::Int(2024));
        assert_eq!(get("getMonth"), Value::Int(2));
        assert_eq!(get("getDate"), Value::Int(5));
        assert_eq!(get("getDayOfMonth"), Value::Int(4));
        // 2024-03-05 is a Tuesday.
        assert_eq!(get("getDayOfWeek"), Value::Int(2));
        assert_eq!(get("getDayOfYear"), Value::Int(64));
        assert_eq!(get("getHours"), Value::Int(7));
        assert_eq!(get("getMilliseconds"), Value::Int(250));
    }

    #[test]
    fn test_timestamp_accessor_with_offset() {
        let t = ts("2024-03-05T23:30:00Z");
        assert_eq!(
            accessor("getHours", &t, &[Value::from("+02:00")]),
            Ok(Value::Int(1))
        );
        assert_eq!(
            accessor("getDate", &t, &[Value::from("+02:00")]),
            Ok(Value::Int(6))
        );
        assert!(accessor("getHours", &t, &[Value::from("Mars/Olympus")]).is_err());
    }

    #[test]
    fn test_duration_accessors() {
        let d = Value::Duration(parse_duration("1h30m").unwrap());
        assert_eq!(accessor("getHours", &d, &[]), Ok(Value::Int(1)));
        assert_eq!(accessor("getMinutes", &d, &[]), Ok(Value::Int(90)));
        assert_eq!(accessor("getSeconds", &d, &[]), Ok(Value::Int(5400)));
    }
}
