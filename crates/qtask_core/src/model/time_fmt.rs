//! Clock and human-readable time formatting helpers.
//!
//! All timestamps handled by core are UTC with millisecond precision, so a
//! value survives an ISO-8601 round-trip through the wire record unchanged.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Current UTC time truncated to millisecond precision.
pub fn now_millis() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Formats a timestamp as ISO-8601 with millisecond precision (`...T..:..:..mmmZ`).
pub fn to_iso_string(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parses an ISO-8601/RFC 3339 timestamp into UTC.
pub fn parse_iso_string(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .ok()
        .map(|parsed| parsed.with_timezone(&Utc).trunc_subsecs(3))
}

/// Absolute display format, e.g. `Mar 7, 2025, 09:05 PM` (UTC).
pub fn format_date(value: DateTime<Utc>) -> String {
    value.format("%b %-d, %Y, %I:%M %p").to_string()
}

/// Relative phrase for `value` as seen from `now`.
///
/// Falls back to [`format_date`] once the distance reaches seven days.
/// Timestamps in the future read as "Just now".
pub fn relative_time_at(value: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let minutes = (now - value).num_minutes();
    let hours = minutes / 60;
    let days = hours / 24;

    if minutes < 1 {
        return "Just now".to_string();
    }
    if minutes < 60 {
        return format!("{minutes} {} ago", plural(minutes, "minute"));
    }
    if hours < 24 {
        return format!("{hours} {} ago", plural(hours, "hour"));
    }
    if days < 7 {
        return format!("{days} {} ago", plural(days, "day"));
    }

    format_date(value)
}

/// Whole days between `since` and `now`, rounded up, ignoring direction.
pub fn age_in_days_at(since: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    let elapsed_ms = (now - since).num_milliseconds().unsigned_abs();
    elapsed_ms.div_ceil(MILLIS_PER_DAY.unsigned_abs())
}

fn plural(count: i64, unit: &'static str) -> String {
    if count == 1 {
        unit.to_string()
    } else {
        format!("{unit}s")
    }
}
