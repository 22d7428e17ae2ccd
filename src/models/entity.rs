use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Entity families carrying provenance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Area,
    Person,
    Roster,
    Tour,
    Session,
}

impl EntityKind {
    pub const ALL: [EntityKind; 5] = [
        EntityKind::Area,
        EntityKind::Person,
        EntityKind::Roster,
        EntityKind::Tour,
        EntityKind::Session,
    ];

    pub fn to_db_str(&self) -> &'static str {
        match self {
            EntityKind::Area => "area",
            EntityKind::Person => "person",
            EntityKind::Roster => "roster",
            EntityKind::Tour => "tour",
            EntityKind::Session => "session",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "area" => Some(EntityKind::Area),
            "person" => Some(EntityKind::Person),
            "roster" => Some(EntityKind::Roster),
            "tour" => Some(EntityKind::Tour),
            "session" => Some(EntityKind::Session),
            _ => None,
        }
    }

    /// Backing table name.
    pub fn table(&self) -> &'static str {
        match self {
            EntityKind::Area => "areas",
            EntityKind::Person => "people",
            EntityKind::Roster => "rosters",
            EntityKind::Tour => "tours",
            EntityKind::Session => "sessions",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_str())
    }
}

impl ToSql for EntityKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.to_db_str()))
    }
}

impl FromSql for EntityKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        EntityKind::from_db_str(s).ok_or_else(|| {
            FromSqlError::Other(Box::new(crate::errors::AppError::Other(format!(
                "Invalid model type: {s}"
            ))))
        })
    }
}
