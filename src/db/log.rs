use crate::errors::AppResult;
use chrono::Utc;
use rusqlite::Connection;
use rusqlite::params;
use serde::Serialize;

/// Write an internal log line into the `log` table.
pub fn ttlog(conn: &Connection, operation: &str, target: &str, message: &str) -> AppResult<()> {
    let now = Utc::now().to_rfc3339();

    let mut stmt = conn.prepare_cached(
        "INSERT INTO log (date, operation, target, message)
         VALUES (?1, ?2, ?3, ?4)",
    )?;

    stmt.execute(params![now, operation, target, message])?;

    Ok(())
}

#[derive(Debug, Clone, Serialize)]
pub struct LogLine {
    pub id: i64,
    pub date: String,
    pub operation: String,
    pub target: String,
    pub message: String,
}

/// Most recent `limit` lines of the internal log, oldest first.
pub fn load_recent(conn: &Connection, limit: usize) -> AppResult<Vec<LogLine>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, date, operation, target, message FROM
            (SELECT * FROM log ORDER BY id DESC LIMIT ?1)
         ORDER BY id ASC",
    )?;

    let rows = stmt.query_map([limit as i64], |row| {
        Ok(LogLine {
            id: row.get("id")?,
            date: row.get("date")?,
            operation: row.get("operation")?,
            target: row.get::<_, Option<String>>("target")?.unwrap_or_default(),
            message: row.get("message")?,
        })
    })?;

    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}
