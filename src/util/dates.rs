//! Date window parsing for extraction runs

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SinceError {
    #[error("Since value cannot be empty")]
    Empty,

    #[error("Invalid since value: '{0}' - no number found")]
    NoNumber(String),

    #[error("Invalid since value: '{0}' - unknown unit '{1}'")]
    UnknownUnit(String, String),

    #[error("Invalid since value: '{0}' - value out of range")]
    OutOfRange(String),
}

/// Parses `2024-01-01`, `2024-01-01T00:00:00[Z]` or a relative `7d`/`12h`/`2w`/`45m`/`30s`.
///
/// A bare number is read as days. Relative values are subtracted from `now`.
pub fn parse_since_at(value: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, SinceError> {
    let v = value.trim();
    if v.is_empty() {
        return Err(SinceError::Empty);
    }

    if let Some(parsed) = parse_iso(v) {
        return Ok(parsed);
    }

    let split = v.find(|c: char| !c.is_ascii_digit()).unwrap_or(v.len());
    let (number, unit) = v.split_at(split);
    if number.is_empty() {
        return Err(SinceError::NoNumber(value.to_string()));
    }
    let n: i64 = number
        .parse()
        .map_err(|_| SinceError::OutOfRange(value.to_string()))?;
    let unit = unit.trim().to_lowercase();

    let delta = match unit.as_str() {
        "" | "d" | "day" | "days" => Duration::try_days(n),
        "w" | "week" | "weeks" => Duration::try_weeks(n),
        "h" | "hour" | "hours" => Duration::try_hours(n),
        "m" | "min" | "mins" | "minute" | "minutes" => Duration::try_minutes(n),
        "s" | "sec" | "secs" | "second" | "seconds" => Duration::try_seconds(n),
        _ => return Err(SinceError::UnknownUnit(value.to_string(), unit)),
    }
    .ok_or_else(|| SinceError::OutOfRange(value.to_string()))?;

    now.checked_sub_signed(delta)
        .ok_or_else(|| SinceError::OutOfRange(value.to_string()))
}

pub fn parse_since(value: &str) -> Result<DateTime<Utc>, SinceError> {
    parse_since_at(value, Utc::now())
}

fn parse_iso(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    let trimmed = value.strip_suffix('Z').unwrap_or(value);
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}
