//! Append-only sink for [`ChangeLog`] entries.

use crate::errors::AppResult;
use crate::models::{ChangeLog, EntityKind};
use crate::utils::time;
use rusqlite::{Connection, Row, params};

use super::record::{get_time, query_rows};

/// Insert every entry and fill in its `id`. Entries are never updated.
pub fn append_all(conn: &Connection, entries: &mut [ChangeLog]) -> AppResult<()> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO change_log (
            model_type, record_id, source_row_id, model_description, source,
            change_type, description, data, timestamp
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    )?;

    for entry in entries.iter_mut() {
        let data = entry.data.as_ref().map(|d| d.to_string());
        stmt.execute(params![
            entry.model_type,
            entry.record_id,
            entry.source_row_id,
            entry.model_description,
            entry.source,
            entry.change_type,
            entry.description,
            data,
            time::to_db(&entry.timestamp),
        ])?;
        entry.id = Some(conn.last_insert_rowid());
    }
    Ok(())
}

fn map_row(row: &Row) -> rusqlite::Result<ChangeLog> {
    let data = row
        .get::<_, Option<String>>("data")?
        .and_then(|raw| serde_json::from_str(&raw).ok());

    Ok(ChangeLog {
        id: row.get("id")?,
        model_type: row.get("model_type")?,
        record_id: row.get("record_id")?,
        source_row_id: row.get("source_row_id")?,
        model_description: row.get("model_description")?,
        source: row.get("source")?,
        change_type: row.get("change_type")?,
        description: row.get("description")?,
        data,
        timestamp: get_time(row, "timestamp")?,
    })
}

/// Most recent `limit` entries, oldest first, optionally for one entity kind.
pub fn load_recent(
    conn: &Connection,
    limit: usize,
    kind: Option<EntityKind>,
) -> AppResult<Vec<ChangeLog>> {
    match kind {
        Some(kind) => query_rows(
            conn,
            "SELECT * FROM
                (SELECT * FROM change_log WHERE model_type = ?1 ORDER BY id DESC LIMIT ?2)
             ORDER BY id ASC",
            params![kind, limit as i64],
            map_row,
        ),
        None => query_rows(
            conn,
            "SELECT * FROM
                (SELECT * FROM change_log ORDER BY id DESC LIMIT ?1)
             ORDER BY id ASC",
            params![limit as i64],
            map_row,
        ),
    }
}

pub fn count(conn: &Connection) -> AppResult<i64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM change_log", [], |row| row.get(0))?)
}
