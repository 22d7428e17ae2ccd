use chrono::{Duration, SubsecRound, Utc};
use rostersync::core::provenance::RecordMeta;
use rostersync::core::sync::{
    AreaSyncOptions, BookingSyncOptions, SyncOutcome, sync_areas, sync_bookings_a,
};
use rostersync::db;
use rostersync::models::{Area, ChangeSource, ChangeType, SourceRowState};

mod common;
use common::{FakeHr, FixedSource, day, manifest_line, memory_db, range, remote_area, ts};

const PULL: AreaSyncOptions = AreaSyncOptions {
    dry_run: false,
    push: false,
};

fn by_srid(areas: &[Area], srid: &str) -> Area {
    areas
        .iter()
        .find(|a| a.meta.source_row_id.as_deref() == Some(srid))
        .cloned()
        .expect("area present")
}

#[test]
fn new_remote_areas_are_added_once() {
    let mut pool = memory_db();
    let earlier = Utc::now() - Duration::days(1);
    let mut hr = FakeHr::new(vec![
        remote_area("a1", "North", 1, earlier),
        remote_area("a2", "South", 2, earlier),
    ]);

    let report = sync_areas(&mut pool.conn, &mut hr, &PULL);
    assert_eq!(report.outcome, SyncOutcome::Completed);
    assert_eq!(report.counts.added, 2);
    assert!(report.change_logs.iter().all(|l| l.change_type == ChangeType::Created));
    assert!(report.change_logs.iter().all(|l| l.record_id.is_some()));

    let areas = db::areas::load_all(&pool.conn).unwrap();
    assert_eq!(areas.len(), 2);
    assert!(areas.iter().all(|a| a.meta.state_is(SourceRowState::Live)));

    let again = sync_areas(&mut pool.conn, &mut hr, &PULL);
    assert_eq!(again.counts.added, 0);
    assert_eq!(again.counts.unchanged, 2);
    assert!(again.change_logs.is_empty());
    assert_eq!(db::change_log::count(&pool.conn).unwrap(), 2);
}

#[test]
fn newer_remote_change_is_applied() {
    let mut pool = memory_db();
    let mut hr = FakeHr::new(vec![remote_area("a1", "North", 1, Utc::now() - Duration::days(1))]);
    sync_areas(&mut pool.conn, &mut hr, &PULL);

    hr.rows[0].name = "North Shore".into();
    hr.rows[0].modified = Utc::now() + Duration::hours(1);

    let report = sync_areas(&mut pool.conn, &mut hr, &PULL);
    assert_eq!(report.counts.changed, 1);

    let area = by_srid(&db::areas::load_all(&pool.conn).unwrap(), "a1");
    assert_eq!(area.area_name.get(), "North Shore");
}

#[test]
fn newer_local_change_without_push_only_warns() {
    let mut pool = memory_db();
    let mut hr = FakeHr::new(vec![remote_area("a1", "North", 1, Utc::now() - Duration::days(1))]);
    sync_areas(&mut pool.conn, &mut hr, &PULL);

    let mut area = by_srid(&db::areas::load_all(&pool.conn).unwrap(), "a1");
    area.area_name.update("Northern".into(), ChangeSource::User);
    db::areas::update(&pool.conn, &mut area).unwrap();

    let report = sync_areas(&mut pool.conn, &mut hr, &PULL);
    assert_eq!(report.warnings.len(), 1);
    assert_eq!(hr.pushes(), 0);
    let area = by_srid(&db::areas::load_all(&pool.conn).unwrap(), "a1");
    assert_eq!(area.area_name.get(), "Northern");
}

#[test]
fn newer_local_change_is_pushed_when_enabled() {
    let mut pool = memory_db();
    let mut hr = FakeHr::new(vec![remote_area("a1", "North", 1, Utc::now() - Duration::days(1))]);
    sync_areas(&mut pool.conn, &mut hr, &PULL);

    let mut area = by_srid(&db::areas::load_all(&pool.conn).unwrap(), "a1");
    area.area_name.update("Northern".into(), ChangeSource::User);
    db::areas::update(&pool.conn, &mut area).unwrap();

    let opts = AreaSyncOptions {
        dry_run: false,
        push: true,
    };
    let report = sync_areas(&mut pool.conn, &mut hr, &opts);
    assert_eq!(report.counts.pushed, 1);
    assert_eq!(hr.updated.len(), 1);
    assert_eq!(hr.rows[0].name, "Northern");
    assert!(report
        .change_logs
        .iter()
        .any(|l| l.change_type == ChangeType::PushChange));
}

#[test]
fn pending_area_is_created_remotely_and_adopts_the_id() {
    let mut pool = memory_db();
    let mut local = Area::new(RecordMeta::pending(ChangeSource::User), "Harbour", None, 7);
    db::areas::insert(&pool.conn, &mut local).unwrap();

    let mut hr = FakeHr::new(Vec::new());
    let opts = AreaSyncOptions {
        dry_run: false,
        push: true,
    };
    let report = sync_areas(&mut pool.conn, &mut hr, &opts);
    assert!(report.is_completed());
    assert_eq!(hr.created.len(), 1);
    assert_eq!(hr.created[0].name, "Harbour");

    let saved = db::areas::get(&pool.conn, local.meta.id.unwrap()).unwrap().unwrap();
    assert_eq!(saved.meta.source_row_id.as_deref(), Some("new-1"));
    assert!(saved.meta.state_is(SourceRowState::Live));
    assert_eq!(saved.meta.source, ChangeSource::HrSystem);
    assert!(report
        .change_logs
        .iter()
        .any(|l| l.change_type == ChangeType::PushCreate));

    // next pull sees it as an ordinary linked row
    let again = sync_areas(&mut pool.conn, &mut hr, &opts);
    assert_eq!(again.counts.added, 0);
    assert_eq!(hr.created.len(), 1);
}

#[test]
fn vanished_area_is_marked_deleted_and_restored_on_return() {
    let mut pool = memory_db();
    let earlier = Utc::now() - Duration::days(1);
    let mut hr = FakeHr::new(vec![
        remote_area("a1", "North", 1, earlier),
        remote_area("a2", "South", 2, earlier),
    ]);
    sync_areas(&mut pool.conn, &mut hr, &PULL);

    let south = hr.rows.remove(1);
    let report = sync_areas(&mut pool.conn, &mut hr, &PULL);
    assert_eq!(report.counts.deleted, 1);
    let area = by_srid(&db::areas::load_all(&pool.conn).unwrap(), "a2");
    assert!(area.meta.state_is(SourceRowState::Deleted));

    hr.rows.push(south);
    let report = sync_areas(&mut pool.conn, &mut hr, &PULL);
    assert!(report
        .change_logs
        .iter()
        .any(|l| l.change_type == ChangeType::Undeleted));
    let area = by_srid(&db::areas::load_all(&pool.conn).unwrap(), "a2");
    assert!(area.meta.state_is(SourceRowState::Live));
}

#[test]
fn dry_run_leaves_no_trace() {
    let mut pool = memory_db();
    let mut hr = FakeHr::new(vec![remote_area("a1", "North", 1, Utc::now())]);
    let opts = AreaSyncOptions {
        dry_run: true,
        push: true,
    };

    let report = sync_areas(&mut pool.conn, &mut hr, &opts);
    assert!(report.dry_run);
    assert_eq!(report.counts.added, 1);
    assert_eq!(report.change_logs.len(), 1);
    assert!(db::areas::load_all(&pool.conn).unwrap().is_empty());
    assert_eq!(db::change_log::count(&pool.conn).unwrap(), 0);
}

#[test]
fn fetch_failure_is_reported_not_raised() {
    let mut pool = memory_db();
    let mut hr = FakeHr::new(vec![remote_area("a1", "North", 1, Utc::now())]);
    hr.fail_fetch = true;

    let report = sync_areas(&mut pool.conn, &mut hr, &PULL);
    assert!(matches!(report.outcome, SyncOutcome::Failed(_)));
    assert!(db::areas::load_all(&pool.conn).unwrap().is_empty());

    let runs = db::log::load_recent(&pool.conn, 10).unwrap();
    assert!(runs.iter().any(|l| l.operation == "sync" && l.target == "areas"));
}

#[test]
fn remote_area_without_id_is_skipped_with_warning() {
    let mut pool = memory_db();
    let mut nameless = remote_area("x", "Ghost", 1, Utc::now());
    nameless.id = None;
    let mut hr = FakeHr::new(vec![nameless]);

    let report = sync_areas(&mut pool.conn, &mut hr, &PULL);
    assert_eq!(report.counts.added, 0);
    assert_eq!(report.warnings.len(), 1);
}

#[test]
fn suppressed_remote_write_still_records_the_auto_value() {
    let mut pool = memory_db();
    let mut hr = FakeHr::new(vec![remote_area("a1", "North", 1, Utc::now() - Duration::days(1))]);
    sync_areas(&mut pool.conn, &mut hr, &PULL);

    let mut area = by_srid(&db::areas::load_all(&pool.conn).unwrap(), "a1");
    area.area_name.update("Northern".into(), ChangeSource::User);
    db::areas::update(&pool.conn, &mut area).unwrap();
    let edited_at = by_srid(&db::areas::load_all(&pool.conn).unwrap(), "a1").meta.updated;

    hr.rows[0].name = "C".into();
    hr.rows[0].modified = Utc::now() + Duration::hours(1);
    let report = sync_areas(&mut pool.conn, &mut hr, &PULL);
    assert_eq!(report.outcome, SyncOutcome::Completed);
    assert!(report.change_logs.is_empty());

    let area = by_srid(&db::areas::load_all(&pool.conn).unwrap(), "a1");
    assert_eq!(area.area_name.get(), "Northern");
    assert_eq!(area.area_name.auto_value().map(String::as_str), Some("C"));
    assert_eq!(area.meta.updated, edited_at);
}

#[test]
fn learned_pickup_locations_do_not_outrank_a_newer_remote_edit() {
    let mut pool = memory_db();
    let mut hr = FakeHr::new(vec![remote_area("a1", "North", 1, ts(2020, 1, 1, 0, 0))]);
    sync_areas(&mut pool.conn, &mut hr, &PULL);

    let mut area = by_srid(&db::areas::load_all(&pool.conn).unwrap(), "a1");
    area.tour_locations.keywords = vec!["Station".into()];
    db::areas::update(&pool.conn, &mut area).unwrap();
    pool.conn
        .execute("UPDATE areas SET updated = '2020-06-01T00:00:00.000000Z'", [])
        .unwrap();

    hr.rows[0].name = "North Shore".into();
    hr.rows[0].modified = ts(2021, 1, 1, 0, 0);

    let bookings = BookingSyncOptions {
        dry_run: false,
        range: range(day(2030, 5, 1), day(2030, 5, 31)),
    };
    let mut source = FixedSource::new(vec![manifest_line("1001", Some("1"), "S1", ts(2030, 5, 10, 9, 0))]);
    let booked = sync_bookings_a(&mut pool.conn, &mut source, &bookings);
    assert_eq!(booked.outcome, SyncOutcome::Completed);

    let push = AreaSyncOptions {
        dry_run: false,
        push: true,
    };
    let report = sync_areas(&mut pool.conn, &mut hr, &push);
    assert_eq!(report.counts.changed, 1);
    assert_eq!(hr.pushes(), 0);

    let area = by_srid(&db::areas::load_all(&pool.conn).unwrap(), "a1");
    assert_eq!(area.area_name.get(), "North Shore");
    assert_eq!(area.tour_locations.exact, vec!["central station".to_string()]);
}

#[test]
fn stored_timestamps_keep_sub_second_precision() {
    let pool = memory_db();
    let mut area = Area::new(RecordMeta::observed(ChangeSource::HrSystem, "a1"), "North", None, 1);
    let id = db::areas::insert(&pool.conn, &mut area).unwrap();
    let stamped = area.meta.updated.unwrap();

    let stored = db::areas::get(&pool.conn, id).unwrap().unwrap();
    assert_eq!(stored.meta.updated, Some(stamped.trunc_subsecs(6)));
    assert_eq!(stored.meta.created, Some(stamped.trunc_subsecs(6)));
}
