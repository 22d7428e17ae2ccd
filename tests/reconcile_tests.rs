use rostersync::core::provenance::RecordMeta;
use rostersync::core::reconcile::{diff_records, reconcile};
use rostersync::models::{Area, ChangeSource};
use serde_json::json;

fn area(id: &str, name: &str, sort_order: i64) -> Area {
    Area::new(RecordMeta::observed(ChangeSource::HrSystem, id), name, None, sort_order)
}

fn srid(a: &Area) -> String {
    a.meta.source_row_id.clone().unwrap_or_default()
}

#[test]
fn classifies_every_key_exactly_once() {
    let new = vec![area("1", "North", 1), area("2", "South", 2), area("4", "West", 4)];
    let old = vec![area("1", "North", 1), area("2", "South", 9), area("3", "East", 3)];

    let rec = reconcile(&new, &old, srid, None, &[]);

    assert_eq!(rec.unchanged.keys().collect::<Vec<_>>(), vec!["1"]);
    assert_eq!(rec.changed.keys().collect::<Vec<_>>(), vec!["2"]);
    assert_eq!(rec.added.keys().collect::<Vec<_>>(), vec!["4"]);
    assert_eq!(rec.deleted.keys().collect::<Vec<_>>(), vec!["3"]);
    assert!(rec.changes_ignored.is_empty());
    assert_eq!(rec.matched_len(), 2);

    let diff = &rec.changed["2"].diff;
    assert_eq!(diff.len(), 1);
    assert_eq!(diff[0].field, "sort_order");
    assert_eq!(diff[0].before, json!(9));
    assert_eq!(diff[0].after, json!(2));
}

#[test]
fn ignored_fields_move_pairs_to_changes_ignored() {
    let new = vec![area("1", "North", 5)];
    let old = vec![area("1", "North", 1)];

    let rec = reconcile(&new, &old, srid, None, &["sort_order"]);
    assert!(rec.changed.is_empty());
    assert_eq!(rec.changes_ignored.len(), 1);
    assert_eq!(rec.candidate_keys().len(), 1);
}

#[test]
fn field_restriction_limits_the_diff() {
    let a = area("1", "North", 1);
    let b = area("1", "Nord", 2);

    let only_name = diff_records(&a, &b, Some(&["area_name"]));
    assert_eq!(only_name.len(), 1);
    assert_eq!(only_name[0].field, "area_name");

    assert_eq!(diff_records(&a, &b, None).len(), 2);
}

#[test]
fn later_row_wins_on_duplicate_keys() {
    let new = vec![area("1", "First", 1), area("1", "Second", 1)];
    let old = vec![area("1", "Second", 1)];

    let rec = reconcile(&new, &old, srid, None, &[]);
    assert_eq!(rec.unchanged.len(), 1);
    assert!(rec.changed.is_empty());
}

#[test]
fn empty_sides() {
    let rows = vec![area("1", "North", 1)];
    let none: Vec<Area> = Vec::new();

    let rec = reconcile(&rows, &none, srid, None, &[]);
    assert_eq!(rec.added.len(), 1);
    assert_eq!(rec.summary(), "changed=0 added=1 deleted=0 unchanged=0 ignored=0");

    let rec = reconcile(&none, &rows, srid, None, &[]);
    assert_eq!(rec.deleted.len(), 1);
}
