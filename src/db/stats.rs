use crate::db::pool::DbPool;
use crate::errors::AppResult;
use crate::models::{EntityKind, SourceRowState};
use crate::utils::colors::{CYAN, GREEN, GREY, RESET, YELLOW};
use rusqlite::Connection;
use std::fs;

/// Row counts of one entity table, split by `source_row_state`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableCounts {
    pub total: i64,
    pub live: i64,
    pub deleted: i64,
    pub unlinked: i64,
    pub pending: i64,
}

pub fn table_counts(conn: &Connection, kind: EntityKind) -> AppResult<TableCounts> {
    let mut stmt = conn.prepare(&format!(
        "SELECT source_row_state, COUNT(*) FROM {} GROUP BY source_row_state",
        kind.table()
    ))?;

    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, Option<SourceRowState>>(0)?, row.get::<_, i64>(1)?))
    })?;

    let mut counts = TableCounts::default();
    for r in rows {
        let (state, n) = r?;
        counts.total += n;
        match state {
            Some(SourceRowState::Live) => counts.live += n,
            Some(SourceRowState::Deleted) => counts.deleted += n,
            Some(SourceRowState::Unlinked) => counts.unlinked += n,
            Some(SourceRowState::Pending) => counts.pending += n,
            None => {}
        }
    }
    Ok(counts)
}

pub fn print_db_info(pool: &mut DbPool, db_path: &str) -> AppResult<()> {
    println!();

    //
    // 1) FILE SIZE
    //
    let file_size = fs::metadata(db_path).map(|m| m.len()).unwrap_or(0);
    let file_mb = (file_size as f64) / (1024.0 * 1024.0);

    println!("{}• File:{} {}{}{}", CYAN, RESET, YELLOW, db_path, RESET);
    println!("{}• Size:{} {:.2} MB", CYAN, RESET, file_mb);

    //
    // 2) ENTITY TABLES
    //
    println!("{}• Records:{}", CYAN, RESET);
    for kind in EntityKind::ALL {
        let c = table_counts(&pool.conn, kind)?;
        println!(
            "    {:<9} {}{:>6}{}  {}live {} / deleted {} / none {} / pending {}{}",
            kind.table(),
            GREEN,
            c.total,
            RESET,
            GREY,
            c.live,
            c.deleted,
            c.unlinked,
            c.pending,
            RESET
        );
    }

    //
    // 3) CHANGE LOG
    //
    let entries = crate::db::change_log::count(&pool.conn)?;
    println!(
        "{}• Change log entries:{} {}{}{}",
        CYAN, RESET, GREEN, entries, RESET
    );

    println!();
    Ok(())
}
