use rostersync::core::provenance::{AutoValues, MutableRecord, Provenance, RecordMeta};
use rostersync::models::{ChangeSource, ChangeType, Person, SourceRowState};
use serde_json::json;

mod common;
use common::memory_db;

fn hr_person(id: &str, first: &str, last: &str) -> Person {
    Person::new(RecordMeta::observed(ChangeSource::HrSystem, id), first, last, true)
}

#[test]
fn automatic_source_updates_untouched_field() {
    let mut name = Provenance::observed("Jon".to_string(), ChangeSource::HrSystem);
    assert!(name.update("John".to_string(), ChangeSource::HrSystem));
    assert_eq!(name.get(), "John");
    assert_eq!(name.auto_value().map(String::as_str), Some("John"));
    assert!(name.can_auto_update());
}

#[test]
fn user_edit_blocks_automatic_overwrite_but_refreshes_auto_value() {
    let mut name = Provenance::observed("Jon".to_string(), ChangeSource::HrSystem);
    assert!(name.update("Jonathan".to_string(), ChangeSource::User));
    assert!(name.is_user_edited());

    assert!(!name.update("Johnny".to_string(), ChangeSource::HrSystem));
    assert_eq!(name.get(), "Jonathan");
    assert_eq!(name.auto_value().map(String::as_str), Some("Johnny"));
}

#[test]
fn automatic_value_matching_user_value_reopens_the_field() {
    let mut name = Provenance::observed("Jon".to_string(), ChangeSource::HrSystem);
    name.update("Jonathan".to_string(), ChangeSource::User);

    // the source catches up with the user edit
    name.update("Jonathan".to_string(), ChangeSource::HrSystem);
    assert!(name.can_auto_update());

    assert!(name.update("Jonathan B".to_string(), ChangeSource::HrSystem));
    assert_eq!(name.get(), "Jonathan B");
}

#[test]
fn field_without_history_accepts_any_source() {
    let mut phone: Provenance<Option<String>> = Provenance::new(None);
    assert!(phone.can_auto_update());
    assert!(phone.update(Some("555".into()), ChangeSource::BookingA));
    assert_eq!(phone.get().as_deref(), Some("555"));
}

#[test]
fn pin_auto_without_overwrite_only_fills_missing_values() {
    let mut a = Provenance::new(3_i64);
    assert!(a.pin_auto(false));
    assert_eq!(a.auto_value(), Some(&3));

    let mut b = Provenance::restore(5_i64, Some(4));
    assert!(!b.pin_auto(false));
    assert_eq!(b.auto_value(), Some(&4));
    assert!(b.pin_auto(true));
    assert_eq!(b.auto_value(), Some(&5));
}

#[test]
fn update_from_instance_logs_changed_fields_with_data() {
    let mut local = hr_person("e1", "Jon", "Smith");
    local.meta.id = Some(7);
    let remote = hr_person("e1", "Jon", "Smyth");

    let log = local.update_from_instance(&remote).expect("a change");
    assert_eq!(log.change_type, ChangeType::Changed);
    assert_eq!(log.record_id, Some(7));
    assert_eq!(log.source_row_id.as_deref(), Some("e1"));
    assert_eq!(log.data, Some(json!({ "last_name": ["Smith", "Smyth"] })));
    assert!(log.description.contains("last_name"));
}

#[test]
fn update_from_instance_without_changes_is_silent() {
    let mut local = hr_person("e1", "Jon", "Smith");
    let remote = hr_person("e1", "Jon", "Smith");
    assert!(local.update_from_instance(&remote).is_none());
}

#[test]
fn update_from_instance_forces_row_live() {
    let mut local = hr_person("e1", "Jon", "Smith");
    local.meta.source_row_state = Some(SourceRowState::Deleted);
    let remote = hr_person("e1", "Jon", "Smith");

    let log = local.update_from_instance(&remote).expect("state change");
    assert!(local.meta.state_is(SourceRowState::Live));
    assert_eq!(log.data, Some(json!({ "source_row_state": ["deleted", "live"] })));
}

#[test]
fn mark_source_added_distinguishes_new_and_reappeared_rows() {
    let mut fresh = hr_person("e1", "Jon", "Smith");
    fresh.meta.source_row_state = None;
    let log = fresh.mark_source_added(false).expect("created");
    assert_eq!(log.change_type, ChangeType::Created);
    assert!(fresh.meta.state_is(SourceRowState::Live));

    let mut gone = hr_person("e2", "Ann", "Lee");
    gone.meta.id = Some(3);
    gone.meta.source_row_state = Some(SourceRowState::Deleted);
    assert_eq!(gone.mark_source_added(false).unwrap().change_type, ChangeType::Undeleted);

    gone.meta.source_row_state = Some(SourceRowState::Deleted);
    assert_eq!(gone.mark_source_added(true).unwrap().change_type, ChangeType::PushRecreate);

    // already live and saved
    assert!(gone.mark_source_added(false).is_none());
}

#[test]
fn mark_source_deleted_is_idempotent() {
    let mut p = hr_person("e1", "Jon", "Smith");
    let log = p.mark_source_deleted(false).expect("deleted");
    assert_eq!(log.change_type, ChangeType::Deleted);
    assert!(p.mark_source_deleted(false).is_none());
}

#[test]
fn mark_update_pushed_reports_push_change() {
    let mut local = hr_person("e1", "Jon", "Smith");
    local.meta.id = Some(9);
    local.last_name.update("Smythe".into(), ChangeSource::User);
    let mut remote = hr_person("e1", "Jon", "Smith");

    let log = local.mark_update_pushed(&mut remote).expect("push");
    assert_eq!(log.change_type, ChangeType::PushChange);
    assert_eq!(log.record_id, Some(9));
    assert_eq!(remote.last_name.get(), "Smythe");
}

#[test]
fn auto_values_survive_a_database_round_trip() {
    let mut pool = memory_db();
    let mut p = hr_person("e1", "Jon", "Smith");
    p.first_name.update("Jonathan".into(), ChangeSource::User);

    let id = rostersync::db::people::insert(&pool.conn, &mut p).unwrap();
    let loaded = rostersync::db::people::get(&pool.conn, id).unwrap().unwrap();

    assert_eq!(loaded.first_name.get(), "Jonathan");
    assert_eq!(loaded.first_name.auto_value().map(String::as_str), Some("Jon"));
    assert!(loaded.first_name.is_user_edited());
    assert!(!loaded.last_name.is_user_edited());

    let stored: String = pool
        .with_conn(|c| {
            Ok(c.query_row("SELECT field_auto_values FROM people WHERE id = ?1", [id], |r| r.get(0))?)
        })
        .unwrap();
    let auto = AutoValues::parse(&stored).unwrap();
    assert!(auto.contains("first_name"));
    assert_eq!(auto.get::<String>("first_name").as_deref(), Some("Jon"));
}

#[test]
fn unreadable_auto_values_are_rejected() {
    assert!(AutoValues::parse("[1, 2]").is_err());
    assert!(AutoValues::parse("").unwrap().is_empty());
}
