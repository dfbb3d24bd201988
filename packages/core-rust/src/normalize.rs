//! Normalization of untyped field values into numbers and instants.
//!
//! Remote documents carry amounts as strings or numbers and timestamps as
//! store-native timestamps, RFC 3339 strings, bare dates, epoch milliseconds,
//! or `{seconds, nanoseconds}` maps. Every function here degrades to `None`
//! on malformed input; nothing in this module returns an error.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use num_format::{Locale, ToFormattedString};

use crate::types::Value;

/// Parses a decimal amount the way a lenient form field would: leading
/// whitespace is skipped and the longest numeric prefix is used, so `"12abc"`
/// yields `12.0`. Returns `None` for missing digits and non-finite results.
#[must_use]
pub fn parse_amount(value: &Value) -> Option<f64> {
    let parsed = match value {
        #[allow(clippy::cast_precision_loss)]
        Value::Int(i) => *i as f64,
        Value::Float(f) => *f,
        Value::String(s) => parse_decimal_prefix(s)?,
        _ => return None,
    };
    parsed.is_finite().then_some(parsed)
}

/// Scans `[+-]digits[.digits][(e|E)[+-]digits]` from the start of `input`.
fn parse_decimal_prefix(input: &str) -> Option<f64> {
    let s = input.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end += 1;
    }
    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;

    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        end = frac_end;
    }

    if digits == 0 {
        return None;
    }

    // Exponent only counts when followed by at least one digit.
    if end < bytes.len() && matches!(bytes[end], b'e' | b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && matches!(bytes[exp_end], b'+' | b'-') {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    s[..end].parse::<f64>().ok()
}

/// Normalizes a field value to a UTC instant.
///
/// Accepted shapes: native timestamps; integers/floats as epoch milliseconds;
/// strings as RFC 3339, naive `YYYY-MM-DD[T ]HH:MM:SS[.f]` (read as UTC), or a
/// bare `YYYY-MM-DD` (UTC midnight); maps with `seconds` and optional
/// `nanoseconds`/`nanos`.
#[must_use]
pub fn to_instant(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Timestamp(ts) => Some(*ts),
        Value::Int(millis) => Utc.timestamp_millis_opt(*millis).single(),
        #[allow(clippy::cast_possible_truncation)]
        Value::Float(millis) if millis.is_finite() => {
            Utc.timestamp_millis_opt(millis.round() as i64).single()
        }
        Value::String(s) => parse_instant(s),
        Value::Map(fields) => {
            let seconds = match fields.get("seconds")? {
                Value::Int(s) => *s,
                #[allow(clippy::cast_possible_truncation)]
                Value::Float(s) if s.is_finite() => *s as i64,
                _ => return None,
            };
            let nanos = match fields.get("nanoseconds").or_else(|| fields.get("nanos")) {
                Some(Value::Int(n)) => u32::try_from(*n).ok()?,
                _ => 0,
            };
            Utc.timestamp_opt(seconds, nanos).single()
        }
        _ => None,
    }
}

/// Parses the string forms accepted by [`to_instant`].
#[must_use]
pub fn parse_instant(input: &str) -> Option<DateTime<Utc>> {
    let s = input.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    parse_date(s).map(start_of_day)
}

/// Parses a calendar date in `YYYY-MM-DD` form.
#[must_use]
pub fn parse_date(input: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d").ok()
}

/// First instant of `date` in UTC.
#[must_use]
pub fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

/// First instant after `date` ends, in UTC. An inclusive end bound of `date`
/// accepts every instant strictly before this value.
#[must_use]
pub fn end_of_day_exclusive(date: NaiveDate) -> DateTime<Utc> {
    match date.succ_opt() {
        Some(next) => start_of_day(next),
        None => DateTime::<Utc>::MAX_UTC,
    }
}

/// Formats an amount as US dollars with two fraction digits and thousands
/// separators: `1234.5` becomes `$1,234.50`, `-3.0` becomes `-$3.00`.
#[must_use]
pub fn format_currency(amount: f64) -> String {
    let amount = if amount.is_finite() { amount } else { 0.0 };
    #[allow(clippy::cast_possible_truncation)]
    let cents = (amount.abs() * 100.0).round() as u128;
    let whole = (cents / 100).to_formatted_string(&Locale::en);
    let fraction = cents % 100;

    let sign = if amount < 0.0 && cents > 0 { "-" } else { "" };
    format!("{sign}${whole}.{fraction:02}")
}

/// Formats an instant for report display, e.g. `Jan 05, 2024`.
#[must_use]
pub fn format_date(ts: &DateTime<Utc>) -> String {
    ts.format("%b %d, %Y").to_string()
}
