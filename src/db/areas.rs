use crate::core::provenance::{MutableRecord, Provenance};
use crate::db::record::{get_json, query_rows, read_meta, require_id, stamp_created, stamp_updated, to_json};
use crate::errors::AppResult;
use crate::models::Area;
use rusqlite::{Connection, OptionalExtension, Row, params};

fn map_row(row: &Row) -> rusqlite::Result<Area> {
    let (meta, auto) = read_meta(row)?;
    let mut area = Area {
        meta,
        area_name: Provenance::new(row.get("area_name")?),
        colour: Provenance::new(row.get("colour")?),
        sort_order: Provenance::new(row.get("sort_order")?),
        display_name: row.get("display_name")?,
        tour_locations: get_json(row, "tour_locations")?,
        active: row.get("active")?,
        sync_enabled: row.get("sync_enabled")?,
    };
    area.restore_auto_values(&auto);
    Ok(area)
}

pub fn load_all(conn: &Connection) -> AppResult<Vec<Area>> {
    query_rows(conn, "SELECT * FROM areas ORDER BY sort_order, id", [], map_row)
}

pub fn get(conn: &Connection, id: i64) -> AppResult<Option<Area>> {
    let mut stmt = conn.prepare_cached("SELECT * FROM areas WHERE id = ?1")?;
    Ok(stmt.query_row([id], map_row).optional()?)
}

pub fn insert(conn: &Connection, area: &mut Area) -> AppResult<i64> {
    let now = stamp_created(area);
    conn.execute(
        "INSERT INTO areas (
            source, source_row_id, source_row_state, field_auto_values, created, updated,
            area_name, display_name, colour, tour_locations, sort_order, active, sync_enabled
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            area.meta.source,
            area.meta.source_row_id,
            area.meta.source_row_state,
            area.auto_values().to_json_string(),
            now,
            area.area_name.get(),
            area.display_name,
            area.colour.get(),
            to_json(&area.tour_locations)?,
            area.sort_order.get(),
            area.active,
            area.sync_enabled,
        ],
    )?;
    let id = conn.last_insert_rowid();
    area.meta.id = Some(id);
    Ok(id)
}

pub fn update(conn: &Connection, area: &mut Area) -> AppResult<()> {
    let id = require_id(area)?;
    let now = stamp_updated(area);
    conn.execute(
        "UPDATE areas SET
            source = ?1, source_row_id = ?2, source_row_state = ?3, field_auto_values = ?4,
            updated = ?5, area_name = ?6, display_name = ?7, colour = ?8, tour_locations = ?9,
            sort_order = ?10, active = ?11, sync_enabled = ?12
         WHERE id = ?13",
        params![
            area.meta.source,
            area.meta.source_row_id,
            area.meta.source_row_state,
            area.auto_values().to_json_string(),
            now,
            area.area_name.get(),
            area.display_name,
            area.colour.get(),
            to_json(&area.tour_locations)?,
            area.sort_order.get(),
            area.active,
            area.sync_enabled,
            id,
        ],
    )?;
    Ok(())
}

/// Rewrite only `tour_locations`, leaving `updated` alone.
pub fn write_tour_locations(conn: &Connection, area: &Area) -> AppResult<()> {
    let id = require_id(area)?;
    conn.execute(
        "UPDATE areas SET tour_locations = ?1 WHERE id = ?2",
        params![to_json(&area.tour_locations)?, id],
    )?;
    Ok(())
}
