use crate::core::provenance::{MutableRecord, Provenance};
use crate::db::record::{query_rows, read_meta, require_id, stamp_created, stamp_updated};
use crate::errors::AppResult;
use crate::models::Person;
use rusqlite::{Connection, OptionalExtension, Row, params};

fn map_row(row: &Row) -> rusqlite::Result<Person> {
    let (meta, auto) = read_meta(row)?;
    let mut person = Person {
        meta,
        first_name: Provenance::new(row.get("first_name")?),
        last_name: Provenance::new(row.get("last_name")?),
        active: Provenance::new(row.get("active")?),
        phone: Provenance::new(row.get("phone")?),
        email: Provenance::new(row.get("email")?),
        display_name: row.get("display_name")?,
    };
    person.restore_auto_values(&auto);
    Ok(person)
}

pub fn load_all(conn: &Connection) -> AppResult<Vec<Person>> {
    query_rows(conn, "SELECT * FROM people ORDER BY id", [], map_row)
}

pub fn get(conn: &Connection, id: i64) -> AppResult<Option<Person>> {
    let mut stmt = conn.prepare_cached("SELECT * FROM people WHERE id = ?1")?;
    Ok(stmt.query_row([id], map_row).optional()?)
}

pub fn insert(conn: &Connection, person: &mut Person) -> AppResult<i64> {
    let now = stamp_created(person);
    conn.execute(
        "INSERT INTO people (
            source, source_row_id, source_row_state, field_auto_values, created, updated,
            first_name, last_name, display_name, active, phone, email
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            person.meta.source,
            person.meta.source_row_id,
            person.meta.source_row_state,
            person.auto_values().to_json_string(),
            now,
            person.first_name.get(),
            person.last_name.get(),
            person.display_name,
            person.active.get(),
            person.phone.get(),
            person.email.get(),
        ],
    )?;
    let id = conn.last_insert_rowid();
    person.meta.id = Some(id);
    Ok(id)
}

pub fn update(conn: &Connection, person: &mut Person) -> AppResult<()> {
    let id = require_id(person)?;
    let now = stamp_updated(person);
    conn.execute(
        "UPDATE people SET
            source = ?1, source_row_id = ?2, source_row_state = ?3, field_auto_values = ?4,
            updated = ?5, first_name = ?6, last_name = ?7, display_name = ?8, active = ?9,
            phone = ?10, email = ?11
         WHERE id = ?12",
        params![
            person.meta.source,
            person.meta.source_row_id,
            person.meta.source_row_state,
            person.auto_values().to_json_string(),
            now,
            person.first_name.get(),
            person.last_name.get(),
            person.display_name,
            person.active.get(),
            person.phone.get(),
            person.email.get(),
            id,
        ],
    )?;
    Ok(())
}
