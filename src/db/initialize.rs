use crate::db::migrate::{pending_migrations, run_pending_migrations};
use crate::errors::AppResult;
use rusqlite::Connection;
use tracing::debug;

/// Bring the schema of `conn` up to date. Safe to call on every open.
pub fn init_db(conn: &Connection) -> AppResult<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;

    let pending = pending_migrations(conn)?;
    if pending.is_empty() {
        return Ok(());
    }
    debug!(count = pending.len(), "applying schema migrations");
    run_pending_migrations(conn)
}
