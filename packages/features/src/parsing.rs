//! Lenient parsing of dates, timestamps, and numeric cells.
//!
//! Source files mix several timestamp layouts (with or without a `T`
//! separator, fractional seconds, or an offset), and satellite metadata
//! sometimes carries epoch milliseconds instead. These helpers accept all of
//! them and return `None` for anything else so callers can count and drop
//! malformed records.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%#z",
    "%Y-%m-%d %H:%M:%S%.f%#z",
    "%Y-%m-%dT%H:%M:%S%#z",
    "%Y-%m-%dT%H:%M:%S%.f%#z",
];

/// Parses a timestamp, converting any offset to UTC. A bare date parses as
/// midnight.
#[must_use]
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, format) {
            return Some(dt.naive_utc());
        }
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive);
        }
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .map(|d| d.and_time(NaiveTime::MIN))
}

/// Parses a calendar date, truncating a full timestamp to its day.
#[must_use]
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| parse_timestamp(s).map(|ts| ts.date()))
}

/// Parses either integer epoch milliseconds or a timestamp string.
#[must_use]
pub fn parse_epoch_millis_or_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if let Ok(millis) = s.parse::<i64>() {
        return DateTime::from_timestamp_millis(millis).map(|dt| dt.naive_utc());
    }
    parse_timestamp(s)
}

/// Parses an optional numeric cell. An empty cell is `Ok(None)`; anything
/// that is not a finite number is an error.
///
/// # Errors
///
/// Returns the offending text if the cell is neither empty nor a finite
/// number.
pub fn parse_optional_f64(s: &str) -> Result<Option<f64>, String> {
    let s = s.trim();
    if s.is_empty() || s.eq_ignore_ascii_case("nan") {
        return Ok(None);
    }
    match s.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(Some(v)),
        _ => Err(s.to_string()),
    }
}

/// Formats a date as ISO 8601 (`YYYY-MM-DD`).
#[must_use]
pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}
