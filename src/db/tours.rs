use crate::core::provenance::{MutableRecord, Provenance};
use crate::db::record::{
    get_json, get_time, query_rows, read_meta, require_id, stamp_created, stamp_updated, to_json,
};
use crate::errors::AppResult;
use crate::models::{ChangeSource, Tour};
use crate::utils::date::DateRange;
use crate::utils::time;
use rusqlite::types::ToSql;
use rusqlite::{Connection, Row, params};

fn map_row(row: &Row) -> rusqlite::Result<Tour> {
    let (meta, auto) = read_meta(row)?;
    let mut tour = Tour {
        meta,
        time_start: Provenance::new(get_time(row, "time_start")?),
        time_end: Provenance::new(get_time(row, "time_end")?),
        tour_type: Provenance::new(row.get("tour_type")?),
        pickup_location: Provenance::new(row.get("pickup_location")?),
        customer_name: Provenance::new(row.get("customer_name")?),
        customer_contact: Provenance::new(row.get("customer_contact")?),
        quantity: Provenance::new(row.get("quantity")?),
        bikes: Provenance::new(get_json(row, "bikes")?),
        pax: Provenance::new(row.get("pax")?),
        notes: Provenance::new(row.get("notes")?),
        tour_area_id: Provenance::new(row.get("tour_area_id")?),
        session_id: Provenance::new(row.get("session_id")?),
    };
    tour.restore_auto_values(&auto);
    Ok(tour)
}

/// Tours from `source` starting inside `range`, plus any tour of that source
/// whose `source_row_id` is in `extra_ids` (rescheduled bookings). Ordered
/// by start time.
pub fn load_for_sync(
    conn: &Connection,
    source: ChangeSource,
    range: &DateRange,
    extra_ids: &[String],
) -> AppResult<Vec<Tour>> {
    let lower = time::to_db(&range.lower_bound());
    let upper = time::to_db(&range.upper_bound());

    let mut sql = String::from(
        "SELECT * FROM tours
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

/// Live tours from `source` starting inside `range`.
pub fn count_live(conn: &Connection, source: ChangeSource, range: &DateRange) -> AppResult<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM tours
         WHERE source = ?1 AND source_row_state = 'live'
           AND time_start >= ?2 AND time_start < ?3",
        params![
            source,
            time::to_db(&range.lower_bound()),
            time::to_db(&range.upper_bound())
        ],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn load_all(conn: &Connection) -> AppResult<Vec<Tour>> {
    query_rows(conn, "SELECT * FROM tours ORDER BY time_start, id", [], map_row)
}

pub fn insert(conn: &Connection, tour: &mut Tour) -> AppResult<i64> {
    let now = stamp_created(tour);
    conn.execute(
        "INSERT INTO tours (
            source, source_row_id, source_row_state, field_auto_values, created, updated,
            session_id, tour_area_id, time_start, time_end, tour_type, pickup_location,
            customer_name, customer_contact, quantity, bikes, pax, notes
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
        params![
            tour.meta.source,
            tour.meta.source_row_id,
            tour.meta.source_row_state,
            tour.auto_values().to_json_string(),
            now,
            tour.session_id.get(),
            tour.tour_area_id.get(),
            time::to_db(tour.time_start.get()),
            time::to_db(tour.time_end.get()),
            tour.tour_type.get(),
            tour.pickup_location.get(),
            tour.customer_name.get(),
            tour.customer_contact.get(),
            tour.quantity.get(),
            to_json(tour.bikes.get())?,
            tour.pax.get(),
            tour.notes.get(),
        ],
    )?;
    let id = conn.last_insert_rowid();
    tour.meta.id = Some(id);
    Ok(id)
}

pub fn update(conn: &Connection, tour: &mut Tour) -> AppResult<()> {
    let id = require_id(tour)?;
    let now = stamp_updated(tour);
    conn.execute(
        "UPDATE tours SET
            source = ?1, source_row_id = ?2, source_row_state = ?3, field_auto_values = ?4,
            updated = ?5, session_id = ?6, tour_area_id = ?7, time_start = ?8, time_end = ?9,
            tour_type = ?10, pickup_location = ?11, customer_name = ?12, customer_contact = ?13,
            quantity = ?14, bikes = ?15, pax = ?16, notes = ?17
         WHERE id = ?18",
        params![
            tour.meta.source,
            tour.meta.source_row_id,
            tour.meta.source_row_state,
            tour.auto_values().to_json_string(),
            now,
            tour.session_id.get(),
            tour.tour_area_id.get(),
            time::to_db(tour.time_start.get()),
            time::to_db(tour.time_end.get()),
            tour.tour_type.get(),
            tour.pickup_location.get(),
            tour.customer_name.get(),
            tour.customer_contact.get(),
            tour.quantity.get(),
            to_json(tour.bikes.get())?,
            tour.pax.get(),
            tour.notes.get(),
            id,
        ],
    )?;
    Ok(())
}
