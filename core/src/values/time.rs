//! Text forms of timestamps and durations.
//!
//! Timestamps use RFC 3339. Durations are parsed in the `1h2m3.5s` unit
//! syntax and printed as seconds with a fractional part, e.g. `"90.5s"`.

use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};

const NANOS_PER_SECOND: i128 = 1_000_000_000;

pub fn parse_timestamp(text: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(text)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| format!("invalid timestamp \"{}\": {}", text, e))
}

pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Parse a duration such as `"1.5s"`, `"-2h45m"` or `"300ms"`.
pub fn parse_duration(text: &str) -> Result<TimeDelta, String> {
    let invalid = || format!("invalid duration \"{}\"", text);

    let (negative, mut rest) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    if rest == "0" {
        return Ok(TimeDelta::zero());
    }
    if rest.is_empty() {
        return Err(invalid());
    }

    let mut total: i128 = 0;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(invalid)?;
        let number = &rest[..number_len];
        rest = &rest[number_len..];
        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let unit = &rest[..unit_len];
        rest = &rest[unit_len..];

        let scale: i128 = match unit {
            "ns" => 1,
            "us" | "µs" | "μs" => 1_000,
            "ms" => 1_000_000,
            "s" => NANOS_PER_SECOND,
            "m" => 60 * NANOS_PER_SECOND,
            "h" => 3600 * NANOS_PER_SECOND,
            _ => return Err(invalid()),
        };

        let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid());
        }
        let whole: i128 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| invalid())?
        };
        let mut nanos = whole.checked_mul(scale).ok_or_else(invalid)?;
        let mut divisor: i128 = 1;
        for digit in fraction.chars() {
            let digit = digit.to_digit(10).ok_or_else(invalid)? as i128;
            divisor *= 10;
            if divisor > NANOS_PER_SECOND * 10 {
                break;
            }
            nanos += digit * scale / divisor;
        }
        total = total.checked_add(nanos).ok_or_else(invalid)?;
    }

    if negative {
        total = -total;
    }
    let nanos = i64::try_from(total).map_err(|_| invalid())?;
    Ok(TimeDelta::nanoseconds(nanos))
}

/// Format a duration as seconds, e.g. `"60s"`, `"1.5s"`, `"-0.000000001s"`.
pub fn format_duration(d: &TimeDelta) -> String {
    let nanos = d
        .num_nanoseconds()
        .map(i128::from)
        .unwrap_or_else(|| i128::from(d.num_seconds()) * NANOS_PER_SECOND);
    let sign = if nanos < 0 { "-" } else { "" };
    let abs = nanos.unsigned_abs();
    let seconds = abs / NANOS_PER_SECOND as u128;
    let fraction = abs % NANOS_PER_SECOND as u128;
    if fraction == 0 {
        format!("{}{}s", sign, seconds)
    } else {
        let digits = format!("{:09}", fraction);
        format!("{}{}.{}s", sign, seconds, digits.trim_end_matches('0'))
    }
}
