//! Collaborator interfaces for the external systems of record.
//!
//! Adapters only move raw records in and out; parsing into local entities and
//! all reconciliation decisions live in `core::sync`.

pub mod booking;
pub mod correlated;
pub mod hr;
pub mod snapshot;

use crate::errors::AppResult;
use crate::models::Roster;
use crate::utils::date::DateRange;
use chrono::NaiveDate;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AdapterError {
    #[error("network error: {0}")]
    Network(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("operation not supported by {0}")]
    Unsupported(String),

    #[error("snapshot error: {0}")]
    Snapshot(String),
}

pub type AdapterResult<T> = Result<T, AdapterError>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchFilter {
    pub range: Option<DateRange>,
}

impl FetchFilter {
    pub fn all() -> Self {
        Self { range: None }
    }

    pub fn range(range: DateRange) -> Self {
        Self { range: Some(range) }
    }

    pub fn accepts(&self, day: Option<NaiveDate>) -> bool {
        match (self.range, day) {
            (Some(range), Some(day)) => range.contains(day),
            _ => true,
        }
    }
}

/// A raw record as the external source describes it.
pub trait SourceRecord {
    /// Day the record belongs to, for range filtering. `None` for undated records.
    fn record_date(&self) -> Option<NaiveDate>;
}

/// One successful remote create. `scratch` echoes the scratch field the
/// remote stored, when the API returns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Created {
    pub id: String,
    pub scratch: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub succeeded: Vec<String>,
    pub failed: Vec<String>,
}

/// Read/write client for one external system.
///
/// Every call may block on the network; timeouts are the adapter's concern.
/// Push operations default to `Unsupported` for read-only sources.
pub trait SourceAdapter {
    type Record: SourceRecord + Clone;

    fn name(&self) -> &str;

    fn fetch_collection(&mut self, filter: &FetchFilter) -> AdapterResult<Vec<Self::Record>>;

    /// One entry per submitted record. Implementations that document ordered
    /// results return them in submission order.
    fn push_create(&mut self, records: &[Self::Record]) -> AdapterResult<Vec<Result<Created, String>>> {
        let _ = records;
        Err(AdapterError::Unsupported(format!("{} push_create", self.name())))
    }

    fn push_update(&mut self, records: &[Self::Record]) -> AdapterResult<UpdateOutcome> {
        let _ = records;
        Err(AdapterError::Unsupported(format!("{} push_update", self.name())))
    }

    /// Returns the ids that were deleted.
    fn push_delete(&mut self, ids: &[String]) -> AdapterResult<Vec<String>> {
        let _ = ids;
        Err(AdapterError::Unsupported(format!("{} push_delete", self.name())))
    }
}

/// Produces the desired rosters for a date range from the tour schedule.
pub trait ScheduleBuilder {
    fn desired_rosters(&self, range: &DateRange) -> AppResult<Vec<Roster>>;
}
