//! Set reconciliation of two keyed record collections.

use crate::models::change_log::FieldChange;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Fields taking part in a diff. Foreign keys are exposed as the referenced
/// id, never as a loaded object.
pub trait Comparable {
    fn comparable_fields(&self) -> Vec<(&'static str, Value)>;
}

#[derive(Debug, Clone)]
pub struct ChangedPair<'a, R> {
    pub old: &'a R,
    pub new: &'a R,
    pub diff: Vec<FieldChange>,
}

#[derive(Debug, Clone)]
pub struct Reconciliation<'a, K, R> {
    pub changed: BTreeMap<K, ChangedPair<'a, R>>,
    pub added: BTreeMap<K, &'a R>,
    pub deleted: BTreeMap<K, &'a R>,
    /// `(old, new)` pairs with an empty diff.
    pub unchanged: BTreeMap<K, (&'a R, &'a R)>,
    /// Pairs whose only differences are in ignored fields.
    pub changes_ignored: BTreeMap<K, ChangedPair<'a, R>>,
}

impl<K: Ord + Clone, R> Reconciliation<'_, K, R> {
    /// Keys present on both sides with a non-empty diff, ignored or not.
    pub fn candidate_keys(&self) -> BTreeSet<K> {
        self.changed
            .keys()
            .chain(self.changes_ignored.keys())
            .cloned()
            .collect()
    }

    /// Keys present on both sides.
    pub fn matched_len(&self) -> usize {
        self.changed.len() + self.changes_ignored.len() + self.unchanged.len()
    }

    pub fn summary(&self) -> String {
        format!(
            "changed={} added={} deleted={} unchanged={} ignored={}",
            self.changed.len(),
            self.added.len(),
            self.deleted.len(),
            self.unchanged.len(),
            self.changes_ignored.len(),
        )
    }
}

/// Field-level diff of two records, optionally restricted to `fields`.
pub fn diff_records<R: Comparable>(old: &R, new: &R, fields: Option<&[&str]>) -> Vec<FieldChange> {
    let new_fields: BTreeMap<&'static str, Value> = new.comparable_fields().into_iter().collect();

    old.comparable_fields()
        .into_iter()
        .filter(|(name, _)| fields.is_none_or(|f| f.contains(name)))
        .filter_map(|(name, before)| {
            let after = new_fields.get(name).cloned().unwrap_or(Value::Null);
            (before != after).then(|| FieldChange::new(name, before, after))
        })
        .collect()
}

/// Classify `new_rows` against `old_rows` by `key_fn`.
///
/// When a key repeats within one side the later row wins; callers that care
/// about duplicates detect them before reconciling.
pub fn reconcile<'a, K, R, F>(
    new_rows: &'a [R],
    old_rows: &'a [R],
    key_fn: F,
    fields: Option<&[&str]>,
    ignore_fields: &[&str],
) -> Reconciliation<'a, K, R>
where
    K: Ord + Clone,
    R: Comparable,
    F: Fn(&R) -> K,
{
    let new_by_key: BTreeMap<K, &R> = new_rows.iter().map(|r| (key_fn(r), r)).collect();
    let mut old_by_key: BTreeMap<K, &R> = old_rows.iter().map(|r| (key_fn(r), r)).collect();

    let mut out = Reconciliation {
        changed: BTreeMap::new(),
        added: BTreeMap::new(),
        deleted: BTreeMap::new(),
        unchanged: BTreeMap::new(),
        changes_ignored: BTreeMap::new(),
    };

    for (key, new) in new_by_key {
        let Some(old) = old_by_key.remove(&key) else {
            out.added.insert(key, new);
            continue;
        };

        let diff = diff_records(old, new, fields);
        if diff.is_empty() {
            out.unchanged.insert(key, (old, new));
        } else if diff.iter().all(|c| ignore_fields.contains(&c.field)) {
            out.changes_ignored.insert(key, ChangedPair { old, new, diff });
        } else {
            out.changed.insert(key, ChangedPair { old, new, diff });
        }
    }

    out.deleted = old_by_key;
    out
}
