//! Conversions between Slack timestamps (`"seconds.micros"`) and wall-clock time.

use std::cmp::Ordering;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};

use crate::error::{AppError, Result};

/// Parse a Slack timestamp into whole seconds and nanoseconds.
///
/// Only plain non-negative decimal notation is accepted; the fraction may have up to
/// nine digits.
pub fn parse_slack_ts(ts: &str) -> Option<(i64, u32)> {
    let (secs, frac) = match ts.split_once('.') {
        Some((secs, frac)) => (secs, frac),
        None => (ts, ""),
    };

    if secs.is_empty() || !secs.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if frac.len() > 9 || !frac.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let secs: i64 = secs.parse().ok()?;
    let nanos = if frac.is_empty() {
        0
    } else {
        let scale = 10u32.pow(9 - frac.len() as u32);
        frac.parse::<u32>().ok()? * scale
    };

    Some((secs, nanos))
}

/// Convert a Slack timestamp to ISO 8601 UTC, truncated to whole seconds.
///
/// An empty timestamp converts to an empty string.
pub fn slack_ts_to_iso8601(ts: &str) -> Result<String> {
    if ts.is_empty() {
        return Ok(String::new());
    }

    let (secs, _) = parse_slack_ts(ts).ok_or_else(|| AppError::InvalidDate(ts.to_string()))?;
    let dt = DateTime::<Utc>::from_timestamp(secs, 0)
        .ok_or_else(|| AppError::InvalidDate(ts.to_string()))?;

    Ok(format_iso8601(dt))
}

pub fn format_iso8601(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Compare two Slack timestamps numerically.
///
/// Unparseable timestamps sort after every valid one and among themselves by raw string.
pub fn compare_slack_ts(a: &str, b: &str) -> Ordering {
    match (parse_slack_ts(a), parse_slack_ts(b)) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

/// Format a point in time as a Slack timestamp bound for history requests.
pub fn to_slack_ts(dt: DateTime<Utc>) -> String {
    format!("{}.000000", dt.timestamp())
}

/// Parse a command-line time: RFC 3339, or `YYYY-MM-DDTHH:MM:SS` taken as UTC.
pub fn parse_cli_time(s: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
        .map(|naive| naive.and_utc())
        .map_err(|_| AppError::InvalidDate(s.to_string()))
}
