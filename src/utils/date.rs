use crate::errors::{AppError, AppResult};
use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

pub fn parse_date_arg(s: &str) -> AppResult<NaiveDate> {
    parse_date(s).ok_or_else(|| AppError::InvalidDate(s.to_string()))
}

/// Inclusive range of calendar days. Bounds are interpreted in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> AppResult<Self> {
        if end < start {
            return Err(AppError::InvalidDate(format!(
                "range end {end} is before start {start}"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn single(day: NaiveDate) -> Self {
        Self {
            start: day,
            end: day,
        }
    }

    /// `today - behind ..= today + ahead`.
    pub fn around_today(days_behind: u64, days_ahead: u64) -> Self {
        let t = today();
        Self {
            start: t.checked_sub_days(Days::new(days_behind)).unwrap_or(t),
            end: t.checked_add_days(Days::new(days_ahead)).unwrap_or(t),
        }
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }

    pub fn contains_time(&self, ts: &DateTime<Utc>) -> bool {
        self.contains(ts.date_naive())
    }

    /// First instant of the range.
    pub fn lower_bound(&self) -> DateTime<Utc> {
        self.start.and_time(NaiveTime::MIN).and_utc()
    }

    /// First instant after the range.
    pub fn upper_bound(&self) -> DateTime<Utc> {
        let next = self.end.succ_opt().unwrap_or(self.end);
        next.and_time(NaiveTime::MIN).and_utc()
    }

    pub fn days(&self) -> Vec<NaiveDate> {
        self.start.iter_days().take_while(|d| *d <= self.end).collect()
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} : {}", self.start, self.end)
    }
}
