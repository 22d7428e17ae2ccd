use crate::core::provenance::{MutableRecord, Provenance};
use crate::db::record::{get_time, query_rows, read_meta, require_id, stamp_created, stamp_updated};
use crate::errors::AppResult;
use crate::models::{ChangeSource, Session};
use crate::utils::date::DateRange;
use crate::utils::time;
use rusqlite::types::ToSql;
use rusqlite::{Connection, Row, params};

fn map_row(row: &Row) -> rusqlite::Result<Session> {
    let (meta, auto) = read_meta(row)?;
    let mut session = Session {
        meta,
        session_type: Provenance::new(row.get("session_type")?),
        time_start: Provenance::new(get_time(row, "time_start")?),
        time_end: Provenance::new(get_time(row, "time_end")?),
        title: Provenance::new(row.get("title")?),
        session_note: Provenance::new(row.get("session_note")?),
    };
    session.restore_auto_values(&auto);
    Ok(session)
}

/// Sessions from `source` starting inside `range`, any state, plus any
/// session of that source whose `source_row_id` is in `extra_ids`.
pub fn load_for_sync(
    conn: &Connection,
    source: ChangeSource,
    range: &DateRange,
    extra_ids: &[String],
) -> AppResult<Vec<Session>> {
    let lower = time::to_db(&range.lower_bound());
    let upper = time::to_db(&range.upper_bound());

    let mut sql = String::from(
        "SELECT * FROM sessions
         WHERE source = ?1 AND ((time_start >= ?2 AND time_start < ?3)",
    );
    if !extra_ids.is_empty() {
        let placeholders = (0..extra_ids.len())
            .map(|i| format!("?{}", i + 4))
            .collect::<Vec<_>>()
            .join(",");
        sql.push_str(&format!(" OR source_row_id IN ({placeholders})"));
    }
    sql.push_str(") ORDER BY time_start, id");

    let mut values: Vec<&dyn ToSql> = vec![&source, &lower, &upper];
    values.extend(extra_ids.iter().map(|s| s as &dyn ToSql));

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(rusqlite::params_from_iter(values), map_row)?;

    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

pub fn load_all(conn: &Connection) -> AppResult<Vec<Session>> {
    query_rows(conn, "SELECT * FROM sessions ORDER BY time_start, id", [], map_row)
}

pub fn insert(conn: &Connection, session: &mut Session) -> AppResult<i64> {
    let now = stamp_created(session);
    conn.execute(
        "INSERT INTO sessions (
            source, source_row_id, source_row_state, field_auto_values, created, updated,
            session_type, time_start, time_end, title, session_note
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            session.meta.source,
            session.meta.source_row_id,
            session.meta.source_row_state,
            session.auto_values().to_json_string(),
            now,
            session.session_type.get(),
            time::to_db(session.time_start.get()),
            time::to_db(session.time_end.get()),
            session.title.get(),
            session.session_note.get(),
        ],
    )?;
    let id = conn.last_insert_rowid();
    session.meta.id = Some(id);
    Ok(id)
}

pub fn update(conn: &Connection, session: &mut Session) -> AppResult<()> {
    let id = require_id(session)?;
    let now = stamp_updated(session);
    conn.execute(
        "UPDATE sessions SET
            source = ?1, source_row_id = ?2, source_row_state = ?3, field_auto_values = ?4,
            updated = ?5, session_type = ?6, time_start = ?7, time_end = ?8, title = ?9,
            session_note = ?10
         WHERE id = ?11",
        params![
            session.meta.source,
            session.meta.source_row_id,
            session.meta.source_row_state,
            session.auto_values().to_json_string(),
            now,
            session.session_type.get(),
            time::to_db(session.time_start.get()),
            time::to_db(session.time_end.get()),
            session.title.get(),
            session.session_note.get(),
            id,
        ],
    )?;
    Ok(())
}
