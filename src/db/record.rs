//! Row mapping helpers shared by the per-entity query modules.

use crate::core::provenance::{AutoValues, MutableRecord, RecordMeta};
use crate::errors::{AppError, AppResult};
use crate::utils::time;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, Params, Row};
use serde::Serialize;
use serde::de::DeserializeOwned;

fn conversion_err(e: AppError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
}

pub fn get_time(row: &Row, col: &str) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(col)?;
    time::from_db(&raw).map_err(conversion_err)
}

pub fn get_opt_time(row: &Row, col: &str) -> rusqlite::Result<Option<DateTime<Utc>>> {
    match row.get::<_, Option<String>>(col)? {
        Some(raw) if !raw.is_empty() => time::from_db(&raw).map(Some).map_err(conversion_err),
        _ => Ok(None),
    }
}

/// JSON text column; empty or NULL reads as `T::default()`.
pub fn get_json<T: DeserializeOwned + Default>(row: &Row, col: &str) -> rusqlite::Result<T> {
    match row.get::<_, Option<String>>(col)? {
        Some(raw) if !raw.trim().is_empty() => {
            serde_json::from_str(&raw).map_err(|e| conversion_err(AppError::Json(e)))
        }
        _ => Ok(T::default()),
    }
}

pub fn to_json<T: Serialize>(value: &T) -> AppResult<String> {
    Ok(serde_json::to_string(value)?)
}

/// Read the structural columns and the raw `field_auto_values`.
pub fn read_meta(row: &Row) -> rusqlite::Result<(RecordMeta, AutoValues)> {
    let raw_auto: Option<String> = row.get("field_auto_values")?;
    let auto = AutoValues::parse(raw_auto.as_deref().unwrap_or("")).map_err(conversion_err)?;

    let meta = RecordMeta {
        id: row.get("id")?,
        source: row.get("source")?,
        source_row_id: row.get("source_row_id")?,
        source_row_state: row.get("source_row_state")?,
        created: get_opt_time(row, "created")?,
        updated: get_opt_time(row, "updated")?,
    };
    Ok((meta, auto))
}

pub fn query_rows<T, P: Params>(
    conn: &Connection,
    sql: &str,
    params: P,
    map: fn(&Row) -> rusqlite::Result<T>,
) -> AppResult<Vec<T>> {
    let mut stmt = conn.prepare_cached(sql)?;
    let rows = stmt.query_map(params, map)?;

    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

/// Stamp `created`/`updated` before an insert. Returns the DB text for both.
pub fn stamp_created<R: MutableRecord>(record: &mut R) -> String {
    let now = Utc::now();
    let meta = record.meta_mut();
    meta.created = Some(now);
    meta.updated = Some(now);
    time::to_db(&now)
}

/// Stamp `updated` before an update. Returns the DB text.
pub fn stamp_updated<R: MutableRecord>(record: &mut R) -> String {
    let now = Utc::now();
    record.meta_mut().updated = Some(now);
    time::to_db(&now)
}

pub fn require_id<R: MutableRecord>(record: &R) -> AppResult<i64> {
    record.meta().id.ok_or_else(|| {
        AppError::StateViolation(format!("cannot update unsaved {}", record.describe()))
    })
}

/// Rewrite only `field_auto_values`, leaving `updated` alone.
pub fn write_auto_values<R: MutableRecord>(conn: &Connection, record: &R) -> AppResult<()> {
    let id = require_id(record)?;
    conn.execute(
        &format!(
            "UPDATE {} SET field_auto_values = ?1 WHERE id = ?2",
            R::KIND.table()
        ),
        rusqlite::params![record.auto_values().to_json_string(), id],
    )?;
    Ok(())
}
