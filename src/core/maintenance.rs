//! One-off maintenance over the synced tables.

use crate::core::provenance::MutableRecord;
use crate::core::sync::AreaIndex;
use crate::db;
use crate::db::record::write_auto_values;
use crate::errors::AppResult;
use crate::models::{ChangeSource, EntityKind};
use rusqlite::Connection;
use tracing::info;

/// Record every field's current value as its automatic value, so that
/// automatic sources may overwrite it again. Without `overwrite` only fields
/// with no automatic value yet are touched.
///
/// Returns the number of rows changed per table.
pub fn reset_auto_values(conn: &mut Connection, overwrite: bool) -> AppResult<Vec<(EntityKind, usize)>> {
    let tx = conn.transaction()?;
    let counts = vec![
        (EntityKind::Area, pin_all(&tx, db::areas::load_all(&tx)?, overwrite)?),
        (EntityKind::Person, pin_all(&tx, db::people::load_all(&tx)?, overwrite)?),
        (EntityKind::Roster, pin_all(&tx, db::rosters::load_all(&tx)?, overwrite)?),
        (EntityKind::Tour, pin_all(&tx, db::tours::load_all(&tx)?, overwrite)?),
        (EntityKind::Session, pin_all(&tx, db::sessions::load_all(&tx)?, overwrite)?),
    ];
    tx.commit()?;

    for (kind, n) in &counts {
        info!(table = kind.table(), rows = n, overwrite, "auto values reset");
    }
    Ok(counts)
}

fn pin_all<R: MutableRecord>(conn: &Connection, rows: Vec<R>, overwrite: bool) -> AppResult<usize> {
    let mut changed = 0;
    for mut row in rows {
        if row.pin_auto_values(overwrite) > 0 {
            write_auto_values(conn, &row)?;
            changed += 1;
        }
    }
    Ok(changed)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RerouteSummary {
    pub considered: usize,
    pub changed: usize,
    /// Areas whose learned pickup locations were saved.
    pub areas_saved: usize,
}

/// Route tours to areas from their pickup location again. Only tours with no
/// area are considered unless `update_existing` is set. With `save_areas`
/// the locations learned through keywords are added to each area's exact
/// list. Runs in one transaction.
pub fn reroute_tour_areas(
    conn: &mut Connection,
    update_existing: bool,
    save_areas: bool,
) -> AppResult<RerouteSummary> {
    let tx = conn.transaction()?;
    let mut areas = db::areas::load_all(&tx)?;
    let mut index = AreaIndex::build(&areas);
    let mut summary = RerouteSummary::default();

    for mut tour in db::tours::load_all(&tx)? {
        if !update_existing && tour.tour_area_id.get().is_some() {
            continue;
        }
        summary.considered += 1;

        let area_id = index.resolve(tour.pickup_location.get());
        if tour.tour_area_id.force(area_id, ChangeSource::System) {
            db::tours::update(&tx, &mut tour)?;
            summary.changed += 1;
        }
    }

    if save_areas {
        for id in index.apply_learned(&mut areas) {
            if let Some(area) = areas.iter().find(|a| a.meta.id == Some(id)) {
                db::areas::write_tour_locations(&tx, area)?;
                summary.areas_saved += 1;
            }
        }
    }
    tx.commit()?;

    info!(
        changed = summary.changed,
        considered = summary.considered,
        areas_saved = summary.areas_saved,
        "tour areas rerouted"
    );
    Ok(summary)
}
