use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Origin of a record or of a single field write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChangeSource {
    HrSystem,
    BookingA,
    BookingB,
    User,
    System,
    #[default]
    #[serde(rename = "")]
    Unset,
}

impl ChangeSource {
    /// Automatic sources may only overwrite fields that still hold their last
    /// automatic value. `User` writes always go through.
    pub fn is_automatic(&self) -> bool {
        match self {
            ChangeSource::HrSystem => true,
            ChangeSource::BookingA => true,
            ChangeSource::BookingB => true,
            ChangeSource::System => true,
            ChangeSource::Unset => true,
            ChangeSource::User => false,
        }
    }

    /// Convert enum → DB string
    pub fn to_db_str(&self) -> &'static str {
        match self {
            ChangeSource::HrSystem => "hr_system",
            ChangeSource::BookingA => "booking_a",
            ChangeSource::BookingB => "booking_b",
            ChangeSource::User => "user",
            ChangeSource::System => "system",
            ChangeSource::Unset => "",
        }
    }

    /// Convert DB string → enum
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "hr_system" => Some(ChangeSource::HrSystem),
            "booking_a" => Some(ChangeSource::BookingA),
            "booking_b" => Some(ChangeSource::BookingB),
            "user" => Some(ChangeSource::User),
            "system" => Some(ChangeSource::System),
            "" => Some(ChangeSource::Unset),
            _ => None,
        }
    }
}

impl fmt::Display for ChangeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeSource::Unset => f.write_str("unset"),
            other => f.write_str(other.to_db_str()),
        }
    }
}

/// Last known state of the external row linked through `source_row_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceRowState {
    /// Last observed to exist remotely.
    Live,
    /// Not found on the last check.
    Deleted,
    /// Matched, but changes are never propagated.
    #[serde(rename = "none")]
    Unlinked,
    /// Created locally, waiting for the remote create.
    Pending,
}

impl SourceRowState {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            SourceRowState::Live => "live",
            SourceRowState::Deleted => "deleted",
            SourceRowState::Unlinked => "none",
            SourceRowState::Pending => "pending",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "live" => Some(SourceRowState::Live),
            "deleted" => Some(SourceRowState::Deleted),
            "none" => Some(SourceRowState::Unlinked),
            "pending" => Some(SourceRowState::Pending),
            _ => None,
        }
    }
}

impl fmt::Display for SourceRowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_str())
    }
}

impl ToSql for ChangeSource {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.to_db_str()))
    }
}

impl FromSql for ChangeSource {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        ChangeSource::from_db_str(s).ok_or_else(|| {
            FromSqlError::Other(Box::new(crate::errors::AppError::InvalidSource(
                s.to_string(),
            )))
        })
    }
}

impl ToSql for SourceRowState {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.to_db_str()))
    }
}

impl FromSql for SourceRowState {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        SourceRowState::from_db_str(s).ok_or_else(|| {
            FromSqlError::Other(Box::new(crate::errors::AppError::InvalidRowState(
                s.to_string(),
            )))
        })
    }
}
