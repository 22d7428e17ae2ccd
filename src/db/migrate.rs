use crate::errors::{AppError, AppResult};
use crate::ui::messages::success;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};

struct Migration {
    version: &'static str,
    description: &'static str,
    sql: &'static str,
}

/// Applied in order, each exactly once, and recorded in `log` as
/// `migration_applied`.
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: "20250301_0001_create_entities",
        description: "Created areas, people, rosters, sessions and tours tables",
        sql: r#"
        CREATE TABLE IF NOT EXISTS areas (
            id                INTEGER PRIMARY KEY AUTOINCREMENT,
            source            TEXT NOT NULL DEFAULT '',
            source_row_id     TEXT,
            source_row_state  TEXT CHECK(source_row_state IN ('live','deleted','none','pending')),
            field_auto_values TEXT NOT NULL DEFAULT '{}',
            created           TEXT NOT NULL,
            updated           TEXT NOT NULL,
            area_name         TEXT NOT NULL DEFAULT '',
            display_name      TEXT NOT NULL DEFAULT '',
            colour            TEXT,
            tour_locations    TEXT NOT NULL DEFAULT '{}',
            sort_order        INTEGER NOT NULL DEFAULT 0,
            active            INTEGER NOT NULL DEFAULT 1,
            sync_enabled      INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS people (
            id                INTEGER PRIMARY KEY AUTOINCREMENT,
            source            TEXT NOT NULL DEFAULT '',
            source_row_id     TEXT,
            source_row_state  TEXT CHECK(source_row_state IN ('live','deleted','none','pending')),
            field_auto_values TEXT NOT NULL DEFAULT '{}',
            created           TEXT NOT NULL,
            updated           TEXT NOT NULL,
            first_name        TEXT NOT NULL DEFAULT '',
            last_name         TEXT NOT NULL DEFAULT '',
            display_name      TEXT,
            active            INTEGER NOT NULL DEFAULT 1,
            phone             TEXT,
            email             TEXT
        );

        CREATE TABLE IF NOT EXISTS sessions (
            id                INTEGER PRIMARY KEY AUTOINCREMENT,
            source            TEXT NOT NULL DEFAULT '',
            source_row_id     TEXT,
            source_row_state  TEXT CHECK(source_row_state IN ('live','deleted','none','pending')),
            field_auto_values TEXT NOT NULL DEFAULT '{}',
            created           TEXT NOT NULL,
            updated           TEXT NOT NULL,
            session_type      TEXT NOT NULL DEFAULT '',
            time_start        TEXT NOT NULL,
            time_end          TEXT NOT NULL,
            title             TEXT NOT NULL DEFAULT '',
            session_note      TEXT NOT NULL DEFAULT ''
        );

        CREATE TABLE IF NOT EXISTS tours (
            id                INTEGER PRIMARY KEY AUTOINCREMENT,
            source            TEXT NOT NULL DEFAULT '',
            source_row_id     TEXT,
            source_row_state  TEXT CHECK(source_row_state IN ('live','deleted','none','pending')),
            field_auto_values TEXT NOT NULL DEFAULT '{}',
            created           TEXT NOT NULL,
            updated           TEXT NOT NULL,
            session_id        INTEGER REFERENCES sessions(id) ON DELETE SET NULL,
            tour_area_id      INTEGER REFERENCES areas(id) ON DELETE SET NULL,
            time_start        TEXT NOT NULL,
            time_end          TEXT NOT NULL,
            tour_type         TEXT NOT NULL DEFAULT '',
            pickup_location   TEXT NOT NULL DEFAULT '',
            customer_name     TEXT NOT NULL DEFAULT '',
            customer_contact  TEXT NOT NULL DEFAULT '',
            quantity          TEXT NOT NULL DEFAULT '',
            bikes             TEXT NOT NULL DEFAULT '{}',
            pax               INTEGER,
            notes             TEXT NOT NULL DEFAULT ''
        );

        CREATE TABLE IF NOT EXISTS rosters (
            id                INTEGER PRIMARY KEY AUTOINCREMENT,
            source            TEXT NOT NULL DEFAULT '',
            source_row_id     TEXT,
            source_row_state  TEXT CHECK(source_row_state IN ('live','deleted','none','pending')),
            field_auto_values TEXT NOT NULL DEFAULT '{}',
            created           TEXT NOT NULL,
            updated           TEXT NOT NULL,
            person_id         INTEGER REFERENCES people(id) ON DELETE SET NULL,
            area_id           INTEGER REFERENCES areas(id) ON DELETE SET NULL,
            time_start        TEXT NOT NULL,
            time_end          TEXT NOT NULL,
            breaks            TEXT NOT NULL DEFAULT '[]',
            meal_break_mins   INTEGER NOT NULL DEFAULT 0,
            open_shift        INTEGER NOT NULL DEFAULT 0,
            published         INTEGER NOT NULL DEFAULT 0,
            shift_notes       TEXT NOT NULL DEFAULT '',
            shift_confirmed   INTEGER NOT NULL DEFAULT 1,
            warning           TEXT NOT NULL DEFAULT '',
            push_error        TEXT
        );
        "#,
    },
    Migration {
        version: "20250301_0002_create_change_log",
        description: "Created append-only change_log table",
        sql: r#"
        CREATE TABLE IF NOT EXISTS change_log (
            id                INTEGER PRIMARY KEY AUTOINCREMENT,
            model_type        TEXT NOT NULL,
            record_id         INTEGER,
            source_row_id     TEXT,
            model_description TEXT NOT NULL DEFAULT '',
            source            TEXT NOT NULL DEFAULT '',
            change_type       TEXT NOT NULL CHECK(change_type IN (
                'created','changed','deleted','undeleted',
                'push_create','push_change','push_delete','push_recreate')),
            description       TEXT NOT NULL DEFAULT '',
            data              TEXT,
            timestamp         TEXT NOT NULL
        );
        "#,
    },
    Migration {
        version: "20250315_0003_add_sync_indexes",
        description: "Added source/source_row_id and time indexes",
        sql: r#"
        CREATE INDEX IF NOT EXISTS idx_areas_source    ON areas(source, source_row_id);
        CREATE INDEX IF NOT EXISTS idx_people_source   ON people(source, source_row_id);
        CREATE INDEX IF NOT EXISTS idx_sessions_source ON sessions(source, source_row_id);
        CREATE INDEX IF NOT EXISTS idx_sessions_start  ON sessions(source, time_start);
        CREATE INDEX IF NOT EXISTS idx_tours_source    ON tours(source, source_row_id);
        CREATE INDEX IF NOT EXISTS idx_tours_start     ON tours(source, time_start);
        CREATE INDEX IF NOT EXISTS idx_rosters_start   ON rosters(time_start);
        CREATE INDEX IF NOT EXISTS idx_change_log_model ON change_log(model_type, record_id);
        "#,
    },
];

/// Ensure that the `log` table exists.
fn ensure_log_table(conn: &Connection) -> AppResult<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS log (
            id        INTEGER PRIMARY KEY AUTOINCREMENT,
            date      TEXT NOT NULL,
            operation TEXT NOT NULL,
            target    TEXT DEFAULT '',
            message   TEXT NOT NULL
        );
        "#,
    )?;
    Ok(())
}

fn is_applied(conn: &Connection, version: &str) -> AppResult<bool> {
    let mut chk = conn.prepare(
        "SELECT 1 FROM log
         WHERE operation = 'migration_applied' AND target = ?1
         LIMIT 1",
    )?;
    Ok(chk.query_row([version], |_| Ok(())).optional()?.is_some())
}

/// Versions not yet recorded in `log`.
pub fn pending_migrations(conn: &Connection) -> AppResult<Vec<&'static str>> {
    ensure_log_table(conn)?;
    let mut out = Vec::new();
    for m in MIGRATIONS {
        if !is_applied(conn, m.version)? {
            out.push(m.version);
        }
    }
    Ok(out)
}

/// Public entry point: run all pending migrations.
///
/// Invoked by db::initialize::init_db().
pub fn run_pending_migrations(conn: &Connection) -> AppResult<()> {
    ensure_log_table(conn)?;

    for m in MIGRATIONS {
        if is_applied(conn, m.version)? {
            continue;
        }

        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(m.sql)
            .map_err(|e| AppError::Migration(format!("{}: {}", m.version, e)))?;
        tx.execute(
            "INSERT INTO log (date, operation, target, message)
             VALUES (?1, 'migration_applied', ?2, ?3)",
            params![Utc::now().to_rfc3339(), m.version, m.description],
        )?;
        tx.commit()?;

        success(format!("Migration applied: {} → {}", m.version, m.description));
    }

    Ok(())
}
