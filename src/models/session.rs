use crate::core::provenance::{Provenance, RecordMeta, mutable_record};
use crate::models::entity::EntityKind;
use chrono::{DateTime, Utc};
use std::fmt;

/// A bookable time slot grouping one or more tours.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub meta: RecordMeta,
    pub session_type: Provenance<String>,
    pub time_start: Provenance<DateTime<Utc>>,
    pub time_end: Provenance<DateTime<Utc>>,
    pub title: Provenance<String>,
    pub session_note: Provenance<String>,
}

mutable_record!(
    Session,
    EntityKind::Session,
    [session_type, time_start, time_end, title, session_note]
);

impl Session {
    pub fn new(
        meta: RecordMeta,
        session_type: &str,
        time_start: DateTime<Utc>,
        time_end: DateTime<Utc>,
    ) -> Self {
        let s = meta.source;
        Self {
            meta,
            session_type: Provenance::observed(session_type.to_string(), s),
            time_start: Provenance::observed(time_start, s),
            time_end: Provenance::observed(time_end, s),
            title: Provenance::observed(String::new(), s),
            session_note: Provenance::observed(String::new(), s),
        }
    }

    /// Composite key used by rows imported before sources exposed a session id.
    pub fn legacy_key(&self) -> String {
        legacy_session_key(
            self.time_start.get(),
            self.time_end.get(),
            self.session_type.get(),
        )
    }
}

pub fn legacy_session_key(start: &DateTime<Utc>, end: &DateTime<Utc>, session_type: &str) -> String {
    format!("{}_{}:{}", start.to_rfc3339(), end.to_rfc3339(), session_type)
}

/// True when `source_row_id` is a `<start>_<end>:<type>` composite key.
pub fn is_legacy_session_key(source_row_id: &str) -> bool {
    match source_row_id.split_once('_') {
        Some((start, rest)) => {
            rest.contains(':') && DateTime::parse_from_rfc3339(start).is_ok()
        }
        None => false,
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {} {}",
            self.time_start.get().format("%Y-%m-%d %H:%M"),
            self.time_end.get().format("%H:%M"),
            self.session_type.get()
        )
    }
}
