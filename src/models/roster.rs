use crate::core::provenance::{Provenance, RecordMeta, mutable_record};
use crate::models::entity::EntityKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakSlot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub meal: bool,
}

/// Set on a roster whose last push to the HR system failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PushError {
    CreateFailed,
    UpdateFailed,
    DeleteFailed,
}

impl PushError {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            PushError::CreateFailed => "create_failed",
            PushError::UpdateFailed => "update_failed",
            PushError::DeleteFailed => "delete_failed",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "create_failed" => Some(PushError::CreateFailed),
            "update_failed" => Some(PushError::UpdateFailed),
            "delete_failed" => Some(PushError::DeleteFailed),
            _ => None,
        }
    }
}

/// A shift: a period where a person is expected to work in an area.
#[derive(Debug, Clone, PartialEq)]
pub struct Roster {
    pub meta: RecordMeta,
    pub person_id: Provenance<Option<i64>>,
    pub area_id: Provenance<Option<i64>>,
    pub time_start: Provenance<DateTime<Utc>>,
    pub time_end: Provenance<DateTime<Utc>>,
    pub breaks: Provenance<Vec<BreakSlot>>,
    pub meal_break_mins: Provenance<i64>,
    pub open_shift: Provenance<bool>,
    pub published: Provenance<bool>,
    pub shift_notes: Provenance<String>,
    pub shift_confirmed: Provenance<bool>,
    pub warning: Provenance<String>,
    pub push_error: Option<PushError>,
    /// External id of the rostered person, resolved on load.
    pub rider_srid: Option<String>,
}

mutable_record!(
    Roster,
    EntityKind::Roster,
    [
        person_id,
        area_id,
        time_start,
        time_end,
        breaks,
        meal_break_mins,
        open_shift,
        published,
        shift_notes,
        shift_confirmed,
        warning,
    ]
);

impl Roster {
    pub fn new(
        meta: RecordMeta,
        person_id: Option<i64>,
        area_id: Option<i64>,
        time_start: DateTime<Utc>,
        time_end: DateTime<Utc>,
    ) -> Self {
        let s = meta.source;
        Self {
            meta,
            person_id: Provenance::observed(person_id, s),
            area_id: Provenance::observed(area_id, s),
            time_start: Provenance::observed(time_start, s),
            time_end: Provenance::observed(time_end, s),
            breaks: Provenance::observed(Vec::new(), s),
            meal_break_mins: Provenance::observed(0, s),
            open_shift: Provenance::observed(false, s),
            published: Provenance::observed(false, s),
            shift_notes: Provenance::observed(String::new(), s),
            shift_confirmed: Provenance::observed(true, s),
            warning: Provenance::observed(String::new(), s),
            push_error: None,
            rider_srid: None,
        }
    }

    pub fn key(&self) -> RosterKey {
        RosterKey::of(self)
    }
}

impl fmt::Display for Roster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Roster {} {} - {}",
            self.rider_srid.as_deref().unwrap_or("open"),
            self.time_start.get().format("%Y-%m-%d %H:%M"),
            self.time_end.get().format("%H:%M"),
        )
    }
}

/// Identity of a shift: rider, start, end and sorted break boundaries.
/// Moving a break or swapping riders yields a different key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RosterKey {
    pub rider: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub breaks: Vec<(DateTime<Utc>, DateTime<Utc>)>,
}

impl RosterKey {
    pub fn of(roster: &Roster) -> Self {
        let mut breaks: Vec<_> = roster
            .breaks
            .get()
            .iter()
            .map(|b| (b.start, b.end))
            .collect();
        breaks.sort();
        Self {
            rider: roster.rider_srid.clone(),
            start: *roster.time_start.get(),
            end: *roster.time_end.get(),
            breaks,
        }
    }
}
