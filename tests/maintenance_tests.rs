use rostersync::core::maintenance::{reroute_tour_areas, reset_auto_values};
use rostersync::core::provenance::{MutableRecord, RecordMeta};
use rostersync::db;
use rostersync::models::{Area, ChangeSource, EntityKind, Tour};
use rusqlite::Connection;

mod common;
use common::{memory_db, ts};

fn rows_for(counts: &[(EntityKind, usize)], kind: EntityKind) -> usize {
    counts
        .iter()
        .find(|(k, _)| *k == kind)
        .map(|(_, n)| *n)
        .unwrap_or(0)
}

fn hand_made_tour() -> Tour {
    let start = ts(2030, 5, 10, 9, 0);
    let meta = RecordMeta {
        source: ChangeSource::User,
        ..RecordMeta::default()
    };
    Tour::new(meta, "City Tour", start, start + chrono::Duration::hours(2))
}

#[test]
fn missing_auto_values_are_filled_once() {
    let mut pool = memory_db();
    let mut tour = hand_made_tour();
    assert!(tour.auto_values().is_empty());
    db::tours::insert(&pool.conn, &mut tour).unwrap();

    let counts = reset_auto_values(&mut pool.conn, false).unwrap();
    assert_eq!(rows_for(&counts, EntityKind::Tour), 1);

    let stored = db::tours::load_all(&pool.conn).unwrap().remove(0);
    assert_eq!(stored.auto_values().len(), Tour::MUTABLE_FIELDS.len());

    let again = reset_auto_values(&mut pool.conn, false).unwrap();
    assert_eq!(rows_for(&again, EntityKind::Tour), 0);
}

#[test]
fn overwrite_releases_user_edits() {
    let mut pool = memory_db();
    let mut tour = hand_made_tour();
    db::tours::insert(&pool.conn, &mut tour).unwrap();
    reset_auto_values(&mut pool.conn, false).unwrap();

    let mut stored = db::tours::load_all(&pool.conn).unwrap().remove(0);
    stored.notes.update("call ahead".to_string(), ChangeSource::User);
    assert!(stored.notes.is_user_edited());
    db::tours::update(&pool.conn, &mut stored).unwrap();

    let kept = reset_auto_values(&mut pool.conn, false).unwrap();
    assert_eq!(rows_for(&kept, EntityKind::Tour), 0);

    let released = reset_auto_values(&mut pool.conn, true).unwrap();
    assert_eq!(rows_for(&released, EntityKind::Tour), 1);

    let stored = db::tours::load_all(&pool.conn).unwrap().remove(0);
    assert!(!stored.notes.is_user_edited());
    assert_eq!(stored.notes.get(), "call ahead");
}

#[test]
fn empty_database_reports_every_table() {
    let mut pool = memory_db();
    let counts = reset_auto_values(&mut pool.conn, true).unwrap();
    assert_eq!(counts.len(), 5);
    assert!(counts.iter().all(|(_, n)| *n == 0));
}

fn area(conn: &Connection, srid: &str, sort_order: i64, exact: &[&str], keywords: &[&str]) -> i64 {
    let mut area = Area::new(RecordMeta::observed(ChangeSource::HrSystem, srid), srid, None, sort_order);
    area.tour_locations.exact = exact.iter().map(|s| s.to_string()).collect();
    area.tour_locations.keywords = keywords.iter().map(|s| s.to_string()).collect();
    db::areas::insert(conn, &mut area).unwrap()
}

fn tour_at(conn: &Connection, pickup: &str, area_id: Option<i64>) -> i64 {
    let mut tour = hand_made_tour();
    tour.pickup_location.update(pickup.to_string(), ChangeSource::User);
    tour.tour_area_id.update(area_id, ChangeSource::User);
    db::tours::insert(conn, &mut tour).unwrap()
}

fn area_of(conn: &Connection, tour_id: i64) -> Option<i64> {
    db::tours::load_all(conn)
        .unwrap()
        .into_iter()
        .find(|t| t.meta.id == Some(tour_id))
        .and_then(|t| *t.tour_area_id.get())
}

#[test]
fn reroute_fills_missing_areas_and_optionally_the_rest() {
    let mut pool = memory_db();
    let centre = area(&pool.conn, "Centre", 1, &[], &["Station"]);
    let harbour = area(&pool.conn, "Harbour", 2, &["Pier 1"], &[]);

    let by_keyword = tour_at(&pool.conn, "Central Station", None);
    let misrouted = tour_at(&pool.conn, "Pier 1", Some(centre));
    let by_exact = tour_at(&pool.conn, "pier 1 ", None);

    let first = reroute_tour_areas(&mut pool.conn, false, false).unwrap();
    assert_eq!((first.considered, first.changed, first.areas_saved), (2, 2, 0));
    assert_eq!(area_of(&pool.conn, by_keyword), Some(centre));
    assert_eq!(area_of(&pool.conn, by_exact), Some(harbour));
    assert_eq!(area_of(&pool.conn, misrouted), Some(centre));
    let stored = db::areas::get(&pool.conn, centre).unwrap().unwrap();
    assert!(stored.tour_locations.exact.is_empty());

    let second = reroute_tour_areas(&mut pool.conn, true, true).unwrap();
    assert_eq!((second.considered, second.changed, second.areas_saved), (3, 1, 1));
    assert_eq!(area_of(&pool.conn, misrouted), Some(harbour));

    let stored = db::areas::get(&pool.conn, centre).unwrap().unwrap();
    assert_eq!(stored.tour_locations.exact, vec!["central station".to_string()]);
}

#[test]
fn reroute_without_areas_leaves_tours_unrouted() {
    let mut pool = memory_db();
    let tour = tour_at(&pool.conn, "Central Station", None);

    let summary = reroute_tour_areas(&mut pool.conn, false, true).unwrap();
    assert_eq!((summary.considered, summary.changed), (1, 0));
    assert_eq!(area_of(&pool.conn, tour), None);
}
