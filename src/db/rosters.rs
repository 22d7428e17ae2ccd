use crate::core::provenance::{MutableRecord, Provenance};
use crate::db::record::{
    get_json, get_time, query_rows, read_meta, require_id, stamp_created, stamp_updated, to_json,
};
use crate::errors::{AppError, AppResult};
use crate::models::{PushError, Roster};
use crate::utils::date::DateRange;
use crate::utils::time;
use rusqlite::{Connection, Row, params};

const SELECT: &str = "SELECT r.*, p.source_row_id AS rider_srid
     FROM rosters r LEFT JOIN people p ON p.id = r.person_id";

fn map_row(row: &Row) -> rusqlite::Result<Roster> {
    let (meta, auto) = read_meta(row)?;

    let push_error = match row.get::<_, Option<String>>("push_error")? {
        Some(s) if !s.is_empty() => Some(PushError::from_db_str(&s).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                Box::new(AppError::Other(format!("Invalid push_error: {s}"))),
            )
        })?),
        _ => None,
    };

    let mut roster = Roster {
        meta,
        person_id: Provenance::new(row.get("person_id")?),
        area_id: Provenance::new(row.get("area_id")?),
        time_start: Provenance::new(get_time(row, "time_start")?),
        time_end: Provenance::new(get_time(row, "time_end")?),
        breaks: Provenance::new(get_json(row, "breaks")?),
        meal_break_mins: Provenance::new(row.get("meal_break_mins")?),
        open_shift: Provenance::new(row.get("open_shift")?),
        published: Provenance::new(row.get("published")?),
        shift_notes: Provenance::new(row.get("shift_notes")?),
        shift_confirmed: Provenance::new(row.get("shift_confirmed")?),
        warning: Provenance::new(row.get("warning")?),
        push_error,
        rider_srid: row.get("rider_srid")?,
    };
    roster.restore_auto_values(&auto);
    Ok(roster)
}

/// Rosters starting inside `range`, any state.
pub fn load_range(conn: &Connection, range: &DateRange) -> AppResult<Vec<Roster>> {
    query_rows(
        conn,
        &format!(
            "{SELECT} WHERE r.time_start >= ?1 AND r.time_start < ?2 ORDER BY r.time_start, r.id"
        ),
        params![time::to_db(&range.lower_bound()), time::to_db(&range.upper_bound())],
        map_row,
    )
}

pub fn load_all(conn: &Connection) -> AppResult<Vec<Roster>> {
    query_rows(conn, &format!("{SELECT} ORDER BY r.time_start, r.id"), [], map_row)
}

pub fn insert(conn: &Connection, roster: &mut Roster) -> AppResult<i64> {
    let now = stamp_created(roster);
    conn.execute(
        "INSERT INTO rosters (
            source, source_row_id, source_row_state, field_auto_values, created, updated,
            person_id, area_id, time_start, time_end, breaks, meal_break_mins, open_shift,
            published, shift_notes, shift_confirmed, warning, push_error
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
        params![
            roster.meta.source,
            roster.meta.source_row_id,
            roster.meta.source_row_state,
            roster.auto_values().to_json_string(),
            now,
            roster.person_id.get(),
            roster.area_id.get(),
            time::to_db(roster.time_start.get()),
            time::to_db(roster.time_end.get()),
            to_json(roster.breaks.get())?,
            roster.meal_break_mins.get(),
            roster.open_shift.get(),
            roster.published.get(),
            roster.shift_notes.get(),
            roster.shift_confirmed.get(),
            roster.warning.get(),
            roster.push_error.map(|e| e.to_db_str()),
        ],
    )?;
    let id = conn.last_insert_rowid();
    roster.meta.id = Some(id);
    Ok(id)
}

pub fn update(conn: &Connection, roster: &mut Roster) -> AppResult<()> {
    let id = require_id(roster)?;
    let now = stamp_updated(roster);
    conn.execute(
        "UPDATE rosters SET
            source = ?1, source_row_id = ?2, source_row_state = ?3, field_auto_values = ?4,
            updated = ?5, person_id = ?6, area_id = ?7, time_start = ?8, time_end = ?9,
            breaks = ?10, meal_break_mins = ?11, open_shift = ?12, published = ?13,
            shift_notes = ?14, shift_confirmed = ?15, warning = ?16, push_error = ?17
         WHERE id = ?18",
        params![
            roster.meta.source,
            roster.meta.source_row_id,
            roster.meta.source_row_state,
            roster.auto_values().to_json_string(),
            now,
            roster.person_id.get(),
            roster.area_id.get(),
            time::to_db(roster.time_start.get()),
            time::to_db(roster.time_end.get()),
            to_json(roster.breaks.get())?,
            roster.meal_break_mins.get(),
            roster.open_shift.get(),
            roster.published.get(),
            roster.shift_notes.get(),
            roster.shift_confirmed.get(),
            roster.warning.get(),
            roster.push_error.map(|e| e.to_db_str()),
            id,
        ],
    )?;
    Ok(())
}
