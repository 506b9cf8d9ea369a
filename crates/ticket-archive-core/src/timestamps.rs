//! Timestamp parsing and conversion.
//!
//! The archive stores every timestamp as `i64` microseconds since the Unix
//! epoch. Source exports carry naive wall-clock strings in several shapes
//! (the legacy US `03/14/2019 02:05 PM` form, ISO-8601 with `T` or a space,
//! RFC 3339 with an offset, bare dates); naive values are interpreted as UTC.

#![allow(clippy::missing_const_for_fn)]

use chrono::{NaiveDate, NaiveDateTime, TimeZone, Utc};

/// Microseconds per second
const MICROS_PER_SECOND: i64 = 1_000_000;

/// Default display format for dates shown to readers (`01/05/24 10:00 AM`).
pub const DISPLAY_FORMAT: &str = "%m/%d/%y %I:%M %p";

/// Placeholder rendered for a missing timestamp.
pub const MISSING_DISPLAY: &str = "N/A";

/// Naive date-time formats accepted from source exports, in priority order.
const DATETIME_FORMATS: &[&str] = &[
    "%m/%d/%Y %I:%M %p",    // "01/05/2024 10:00 AM" (export default)
    "%m/%d/%Y %I:%M:%S %p", // "01/05/2024 10:00:30 AM"
    "%m/%d/%Y %H:%M",       // "01/05/2024 22:00"
    "%m/%d/%Y %H:%M:%S",    // "01/05/2024 22:00:30"
    "%Y-%m-%d %H:%M:%S%.f", // "2024-01-05 10:00:00.123456"
    "%Y-%m-%dT%H:%M:%S%.f", // "2024-01-05T10:00:00.123456"
    "%Y-%m-%d %H:%M:%S",    // "2024-01-05 10:00:00"
    "%Y-%m-%dT%H:%M:%S",    // "2024-01-05T10:00:00"
    "%Y-%m-%d %H:%M",       // "2024-01-05 10:00"
    "%Y-%m-%dT%H:%M",       // "2024-01-05T10:00"
];

/// Date-only formats (midnight is assumed).
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y"];

/// Convert chrono `NaiveDateTime` to microseconds since Unix epoch.
#[inline]
#[must_use]
pub fn naive_to_micros(dt: NaiveDateTime) -> i64 {
    dt.and_utc().timestamp_micros()
}

/// Convert microseconds since Unix epoch to chrono `NaiveDateTime`.
///
/// Values outside chrono's representable range clamp to the nearest bound
/// instead of panicking.
#[must_use]
pub fn micros_to_naive(micros: i64) -> NaiveDateTime {
    let secs = micros.div_euclid(MICROS_PER_SECOND);
    let sub_micros = micros.rem_euclid(MICROS_PER_SECOND);
    let nsecs = u32::try_from(sub_micros * 1000).unwrap_or(0);
    Utc.timestamp_opt(secs, nsecs)
        .single()
        .unwrap_or(if micros < 0 {
            chrono::DateTime::<Utc>::MIN_UTC
        } else {
            chrono::DateTime::<Utc>::MAX_UTC
        })
        .naive_utc()
}

/// Convert microseconds to an ISO-8601 string (`2024-01-05T10:00:00Z`).
#[must_use]
pub fn micros_to_iso(micros: i64) -> String {
    micros_to_naive(micros)
        .format("%Y-%m-%dT%H:%M:%SZ")
        .to_string()
}

/// Parse a source timestamp into microseconds.
///
/// Returns `None` for blank input and for anything no known format accepts;
/// callers keep the row and store NULL for the field.
#[must_use]
pub fn parse_source_timestamp(text: &str) -> Option<i64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.timestamp_micros());
    }

    let without_tz = trimmed.strip_suffix('Z').unwrap_or(trimmed);
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(without_tz, fmt) {
            return Some(naive_to_micros(dt));
        }
    }

    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(without_tz, fmt) {
            return date.and_hms_opt(0, 0, 0).map(naive_to_micros);
        }
    }

    None
}

/// Format an optional timestamp for display, `N/A` when missing.
#[must_use]
pub fn format_display(micros: Option<i64>, format: &str) -> String {
    micros.map_or_else(
        || MISSING_DISPLAY.to_string(),
        |m| micros_to_naive(m).format(format).to_string(),
    )
}
