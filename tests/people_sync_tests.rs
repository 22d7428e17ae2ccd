use rostersync::core::provenance::RecordMeta;
use rostersync::core::sync::{PeopleSyncOptions, sync_people};
use rostersync::db;
use rostersync::models::{ChangeSource, ChangeType, Person, SourceRowState};
use serde_json::json;

mod common;
use common::{FakeHr, employee, memory_db};

fn opts() -> PeopleSyncOptions {
    PeopleSyncOptions {
        allow_add: true,
        ..PeopleSyncOptions::default()
    }
}

/// A person typed in by hand, never linked to the HR system.
fn manual_person(first: &str, last: &str) -> Person {
    let meta = RecordMeta {
        source: ChangeSource::User,
        ..RecordMeta::default()
    };
    Person::new(meta, first, last, true)
}

fn find(conn: &rusqlite::Connection, srid: &str) -> Person {
    db::people::load_all(conn)
        .unwrap()
        .into_iter()
        .find(|p| p.meta.source_row_id.as_deref() == Some(srid))
        .expect("person present")
}

#[test]
fn active_remote_people_are_added() {
    let mut pool = memory_db();
    let mut mobile = employee("e1", "Ann", "Lee", true);
    mobile.mobile = Some("+1 555 0101".into());
    let mut hr = FakeHr::new(vec![mobile, employee("e2", "Bob", "Ray", false)]);

    let report = sync_people(&mut pool.conn, &mut hr, &opts());
    assert!(report.is_completed());
    assert_eq!(report.counts.added, 1);
    // inactive people with no local match are never created
    assert_eq!(report.warnings.len(), 1);

    let ann = find(&pool.conn, "e1");
    assert_eq!(ann.phone.get().as_deref(), Some("+1 555 0101"));
    assert!(ann.meta.state_is(SourceRowState::Live));
}

#[test]
fn adding_is_refused_without_allow_add() {
    let mut pool = memory_db();
    let mut hr = FakeHr::new(vec![employee("e1", "Ann", "Lee", true)]);

    let report = sync_people(&mut pool.conn, &mut hr, &PeopleSyncOptions::default());
    assert_eq!(report.counts.added, 0);
    assert_eq!(report.warnings.len(), 1);
    assert!(db::people::load_all(&pool.conn).unwrap().is_empty());
}

#[test]
fn user_edits_survive_remote_changes() {
    let mut pool = memory_db();
    let mut hr = FakeHr::new(vec![employee("e1", "Jon", "Smith", true)]);
    sync_people(&mut pool.conn, &mut hr, &opts());

    let mut jon = find(&pool.conn, "e1");
    jon.first_name.update("Jonathan".into(), ChangeSource::User);
    db::people::update(&pool.conn, &mut jon).unwrap();

    hr.rows[0].first_name = "Johnny".into();
    hr.rows[0].last_name = "Smyth".into();
    let report = sync_people(&mut pool.conn, &mut hr, &opts());
    assert_eq!(report.counts.changed, 1);

    let jon = find(&pool.conn, "e1");
    assert_eq!(jon.first_name.get(), "Jonathan");
    assert_eq!(jon.first_name.auto_value().map(String::as_str), Some("Johnny"));
    assert_eq!(jon.last_name.get(), "Smyth");
}

#[test]
fn remote_catching_up_with_a_user_edit_releases_the_field() {
    let mut pool = memory_db();
    let mut hr = FakeHr::new(vec![employee("e1", "Jon", "Smith", true)]);
    sync_people(&mut pool.conn, &mut hr, &opts());

    let mut jon = find(&pool.conn, "e1");
    jon.email.update(Some("b@x".into()), ChangeSource::User);
    db::people::update(&pool.conn, &mut jon).unwrap();
    let edited_at = find(&pool.conn, "e1").meta.updated;

    hr.rows[0].email = Some("b@x".into());
    let report = sync_people(&mut pool.conn, &mut hr, &opts());
    assert_eq!(report.counts.unchanged, 1);
    assert_eq!(report.counts.changed, 0);
    assert!(report.change_logs.is_empty());

    let jon = find(&pool.conn, "e1");
    assert_eq!(jon.email.auto_value(), Some(&Some("b@x".to_string())));
    assert!(!jon.email.is_user_edited());
    assert_eq!(jon.meta.updated, edited_at);

    hr.rows[0].email = Some("c@x".into());
    let report = sync_people(&mut pool.conn, &mut hr, &opts());
    assert_eq!(report.counts.changed, 1);
    assert_eq!(find(&pool.conn, "e1").email.get().as_deref(), Some("c@x"));
}

#[test]
fn unlinked_person_is_matched_by_name_key() {
    let mut pool = memory_db();
    let mut local = manual_person("John Paul", "van Smith");
    db::people::insert(&pool.conn, &mut local).unwrap();

    let mut remote = employee("e9", "John", "Smith", true);
    remote.email = Some("john@example.com".into());
    let mut hr = FakeHr::new(vec![remote]);

    let report = sync_people(&mut pool.conn, &mut hr, &PeopleSyncOptions::default());
    assert_eq!(report.counts.added, 0);
    assert_eq!(report.counts.matched, 1);

    let linked = find(&pool.conn, "e9");
    assert_eq!(linked.meta.id, local.meta.id);
    assert_eq!(linked.meta.source, ChangeSource::HrSystem);
    assert!(linked.meta.state_is(SourceRowState::Live));
    assert_eq!(linked.email.get().as_deref(), Some("john@example.com"));

    let link_log = report
        .change_logs
        .iter()
        .find(|l| l.data == Some(json!({ "source_row_id": [null, "e9"] })));
    assert!(link_log.is_some());

    // later runs match by id
    let again = sync_people(&mut pool.conn, &mut hr, &PeopleSyncOptions::default());
    assert_eq!(again.counts.unchanged, 1);
    assert!(again.change_logs.is_empty());
}

#[test]
fn match_only_links_without_merging() {
    let mut pool = memory_db();
    let mut local = manual_person("Ann", "Lee");
    db::people::insert(&pool.conn, &mut local).unwrap();

    let mut remote = employee("e1", "Ann", "Lee", true);
    remote.mobile = Some("555".into());
    let mut hr = FakeHr::new(vec![remote]);

    let match_only = PeopleSyncOptions {
        match_only: true,
        ..PeopleSyncOptions::default()
    };
    sync_people(&mut pool.conn, &mut hr, &match_only);

    let ann = find(&pool.conn, "e1");
    assert_eq!(ann.phone.get(), &None);
}

#[test]
fn ambiguous_name_keys_are_reported_not_linked() {
    let mut pool = memory_db();
    for (first, last) in [("John", "Smith"), ("John A", "Smith")] {
        let mut p = manual_person(first, last);
        db::people::insert(&pool.conn, &mut p).unwrap();
    }
    let mut hr = FakeHr::new(vec![employee("e1", "John", "Smith", true)]);

    let report = sync_people(&mut pool.conn, &mut hr, &PeopleSyncOptions::default());
    assert_eq!(report.duplicates.len(), 1);
    assert!(report.duplicates[0].contains("john_smith"));
    assert!(
        db::people::load_all(&pool.conn)
            .unwrap()
            .iter()
            .all(|p| p.meta.source_row_id.is_none())
    );
}

#[test]
fn vanished_person_is_deactivated_and_marked_deleted() {
    let mut pool = memory_db();
    let mut hr = FakeHr::new(vec![employee("e1", "Ann", "Lee", true)]);
    sync_people(&mut pool.conn, &mut hr, &opts());

    hr.rows.clear();
    let report = sync_people(&mut pool.conn, &mut hr, &opts());
    assert_eq!(report.counts.deleted, 1);

    let log = &report.change_logs[0];
    assert_eq!(log.change_type, ChangeType::Deleted);
    assert_eq!(log.data, Some(json!({ "active": [true, false] })));

    let ann = find(&pool.conn, "e1");
    assert!(!*ann.active.get());
    assert!(ann.meta.state_is(SourceRowState::Deleted));

    // returning restores the row
    hr.rows.push(employee("e1", "Ann", "Lee", true));
    let report = sync_people(&mut pool.conn, &mut hr, &opts());
    assert!(report.change_logs.iter().any(|l| l.change_type == ChangeType::Undeleted));
    let ann = find(&pool.conn, "e1");
    assert!(*ann.active.get());
    assert!(ann.meta.state_is(SourceRowState::Live));
}

#[test]
fn disable_unlinked_deactivates_unmatched_manual_rows() {
    let mut pool = memory_db();
    let mut stray = manual_person("Old", "Timer");
    db::people::insert(&pool.conn, &mut stray).unwrap();
    let mut hr = FakeHr::new(vec![employee("e1", "Ann", "Lee", true)]);

    let keep = sync_people(&mut pool.conn, &mut hr, &opts());
    assert_eq!(keep.counts.added, 1);
    let still = db::people::get(&pool.conn, stray.meta.id.unwrap()).unwrap().unwrap();
    assert!(*still.active.get());

    let disable = PeopleSyncOptions {
        disable_unlinked: true,
        ..opts()
    };
    let report = sync_people(&mut pool.conn, &mut hr, &disable);
    assert_eq!(report.counts.changed, 1);
    let gone = db::people::get(&pool.conn, stray.meta.id.unwrap()).unwrap().unwrap();
    assert!(!*gone.active.get());
    assert!(gone.meta.state_is(SourceRowState::Deleted));
}

#[test]
fn unlinked_state_rows_are_never_merged() {
    let mut pool = memory_db();
    let mut hr = FakeHr::new(vec![employee("e1", "Ann", "Lee", true)]);
    sync_people(&mut pool.conn, &mut hr, &opts());

    let mut ann = find(&pool.conn, "e1");
    ann.meta.source_row_state = Some(SourceRowState::Unlinked);
    db::people::update(&pool.conn, &mut ann).unwrap();

    hr.rows[0].last_name = "Leigh".into();
    let report = sync_people(&mut pool.conn, &mut hr, &opts());
    assert_eq!(report.counts.unchanged, 1);
    assert_eq!(find(&pool.conn, "e1").last_name.get(), "Lee");
}
