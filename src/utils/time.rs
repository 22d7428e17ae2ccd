//! Timestamp utilities: DB text format and lenient parsing of source data.

use crate::errors::{AppError, AppResult};
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};

/// RFC 3339, microseconds, `Z` suffix. Fixed width, so it sorts
/// lexicographically.
pub fn to_db(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn from_db(s: &str) -> AppResult<DateTime<Utc>> {
    parse_timestamp(s)
}

/// Accepts RFC 3339 or a naive `YYYY-MM-DD HH:MM[:SS]` / `YYYY-MM-DDTHH:MM[:SS]`,
/// the latter read as UTC.
pub fn parse_timestamp(s: &str) -> AppResult<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    const NAIVE_FORMATS: [&str; 4] = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
    ];
    NAIVE_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| AppError::InvalidTime(s.to_string()))
}

