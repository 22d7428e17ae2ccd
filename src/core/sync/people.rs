//! Person sync: pull from the HR system, matching by external id and, for
//! rows never linked, by a normalized name key.

use super::{Merged, SyncReport, close_tx, finish, merge_observed};
use crate::adapters::hr::RemoteEmployee;
use crate::adapters::{FetchFilter, SourceAdapter};
use crate::core::provenance::{MutableRecord, RecordMeta};
use crate::core::reconcile::reconcile;
use crate::db;
use crate::db::record::write_auto_values;
use crate::errors::AppResult;
use crate::models::{ChangeLog, ChangeSource, ChangeType, Person, SourceRowState};
use rusqlite::Connection;
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, Default)]
pub struct PeopleSyncOptions {
    pub dry_run: bool,
    /// Create local rows for active remote people with no local match.
    pub allow_add: bool,
    /// Link external ids but do not merge field values.
    pub match_only: bool,
    /// Deactivate name-only local rows that no remote person matched.
    pub disable_unlinked: bool,
}

fn to_local(remote: &RemoteEmployee) -> Person {
    let source = ChangeSource::HrSystem;
    let mut meta = RecordMeta::observed(source, remote.id.as_str());
    meta.updated = remote.modified;

    let mut person = Person::new(meta, &remote.first_name, &remote.last_name, remote.active);
    person.phone.force(remote.mobile.clone(), source);
    person.email.force(remote.email.clone(), source);
    person.display_name = remote.display_name.clone();
    person
}

fn srid(person: &Person) -> String {
    person.meta.source_row_id.clone().unwrap_or_default()
}

pub fn sync_people<A>(conn: &mut Connection, adapter: &mut A, opts: &PeopleSyncOptions) -> SyncReport
where
    A: SourceAdapter<Record = RemoteEmployee>,
{
    let mut report = SyncReport::new("people", opts.dry_run);
    let result = run(conn, adapter, opts, &mut report);
    finish(conn, report, result)
}

fn run<A>(
    conn: &mut Connection,
    adapter: &mut A,
    opts: &PeopleSyncOptions,
    report: &mut SyncReport,
) -> AppResult<()>
where
    A: SourceAdapter<Record = RemoteEmployee>,
{
    let remote_rows = adapter.fetch_collection(&FetchFilter::all())?;
    info!(adapter = adapter.name(), rows = remote_rows.len(), "fetched people");
    let candidates: Vec<Person> = remote_rows.iter().map(to_local).collect();

    let tx = conn.transaction()?;
    let (mut linked, mut unlinked): (Vec<Person>, Vec<Person>) = db::people::load_all(&tx)?
        .into_iter()
        .partition(|p| p.meta.source_row_id.is_some());

    // name key -> unlinked local rows; ambiguous keys never match
    let mut by_name: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (i, p) in unlinked.iter().enumerate() {
        by_name.entry(p.name_key()).or_default().push(i);
    }
    let mut fallback: HashMap<String, usize> = HashMap::new();
    for (key, rows) in &by_name {
        if rows.len() > 1 {
            let names: Vec<String> = rows.iter().map(|&i| unlinked[i].describe()).collect();
            report.duplicate(format!("name key '{key}' shared by {}", names.join(", ")));
        } else {
            fallback.insert(key.clone(), rows[0]);
        }
    }

    let rec = reconcile(&candidates, &linked, srid, None, &[]);
    debug!(summary = %rec.summary(), "reconciled people");
    report.counts.matched = rec.matched_len();

    let matched: Vec<String> = rec
        .unchanged
        .keys()
        .cloned()
        .chain(rec.candidate_keys())
        .collect();
    let added_keys: Vec<String> = rec.added.keys().cloned().collect();
    let deleted_keys: Vec<String> = rec.deleted.keys().cloned().collect();
    drop(rec);

    let local_idx: HashMap<String, usize> =
        linked.iter().enumerate().map(|(i, p)| (srid(p), i)).collect();
    let cand_idx: HashMap<String, usize> = candidates
        .iter()
        .enumerate()
        .map(|(i, p)| (srid(p), i))
        .collect();

    let mut logs: Vec<ChangeLog> = Vec::new();

    // 1) matched by external id; every pair is merged so auto values advance
    for key in &matched {
        let local = &mut linked[local_idx[key]];
        let remote = &candidates[cand_idx[key]];

        if local.meta.state_is(SourceRowState::Unlinked) {
            report.counts.unchanged += 1;
            continue;
        }

        let mut entries = Vec::new();
        let mut auto_only = false;
        if local.meta.state_is(SourceRowState::Deleted) {
            entries.extend(local.mark_source_added(false));
        }
        if !opts.match_only {
            match merge_observed(local, remote) {
                Merged::Changed(log) => entries.push(log),
                Merged::AutoOnly => auto_only = true,
                Merged::Same => {}
            }
        }

        if entries.is_empty() {
            if auto_only {
                write_auto_values(&tx, local)?;
            }
            report.counts.unchanged += 1;
            continue;
        }
        db::people::update(&tx, local)?;
        report.counts.changed += 1;
        logs.extend(entries);
    }

    // 2) remote-only by id: name fallback, then add
    let mut claimed = vec![false; unlinked.len()];
    for key in &added_keys {
        let remote = &candidates[cand_idx[key]];
        let name_key = remote.name_key();

        if let Some(&li) = fallback.get(&name_key) {
            if claimed[li] {
                report.duplicate(format!(
                    "name key '{name_key}' claimed by more than one remote person, {} not linked",
                    remote.describe()
                ));
                continue;
            }
            claimed[li] = true;
            let local = &mut unlinked[li];
            logs.extend(link_by_name(local, remote, opts, &name_key));
            db::people::update(&tx, local)?;
            report.counts.matched += 1;
            report.counts.changed += 1;
            continue;
        }

        if !*remote.active.get() {
            report.warn(format!("inactive remote {} has no local match, skipped", remote.describe()));
            continue;
        }
        if !opts.allow_add || opts.match_only {
            report.warn(format!("remote {} has no local match, not added", remote.describe()));
            continue;
        }

        let mut person = remote.clone();
        let log = person.mark_source_added(false);
        let id = db::people::insert(&tx, &mut person)?;
        if let Some(mut log) = log {
            log.attach_record_id(id);
            logs.push(log);
        }
        report.counts.added += 1;
    }

    // 3) linked rows that vanished remotely: deactivate and mark deleted
    for key in &deleted_keys {
        let local = &mut linked[local_idx[key]];
        if local.meta.state_is(SourceRowState::Deleted)
            || local.meta.state_is(SourceRowState::Unlinked)
        {
            continue;
        }
        let was_active = *local.active.get();
        local.active.force(false, ChangeSource::HrSystem);

        if let Some(mut log) = local.mark_source_deleted(false) {
            if was_active {
                log = log.with_data(json!({ "active": [true, false] }));
            }
            db::people::update(&tx, local)?;
            logs.push(log);
            report.counts.deleted += 1;
        }
    }

    // 4) name-only rows nobody matched: deactivate and mark deleted
    if opts.disable_unlinked {
        for (i, local) in unlinked.iter_mut().enumerate() {
            if claimed[i] {
                continue;
            }
            let mut entries = Vec::new();
            if *local.active.get() {
                local.active.force(false, ChangeSource::System);
                entries.push(
                    local
                        .change_log(
                            ChangeType::Changed,
                            format!("deactivated: no HR system match for {}", local.name_key()),
                        )
                        .with_data(json!({ "active": [true, false] })),
                );
            }
            entries.extend(local.mark_source_deleted(false));
            if entries.is_empty() {
                continue;
            }
            db::people::update(&tx, local)?;
            logs.extend(entries);
            report.counts.changed += 1;
        }
    }

    db::change_log::append_all(&tx, &mut logs)?;
    close_tx(tx, opts.dry_run)?;
    report.change_logs.extend(logs);
    Ok(())
}

/// Adopt the remote id onto a row matched by name key. The row is matched by
/// id from then on.
fn link_by_name(
    local: &mut Person,
    remote: &Person,
    opts: &PeopleSyncOptions,
    name_key: &str,
) -> Vec<ChangeLog> {
    let remote_id = srid(remote);
    let mut logs = Vec::new();

    local.meta.source_row_id = Some(remote_id.clone());
    logs.push(
        local
            .change_log(
                ChangeType::Changed,
                format!("matched by name key '{name_key}', linked to source_row_id={remote_id}"),
            )
            .with_data(json!({ "source_row_id": [null, remote_id] })),
    );

    if local.meta.state_is(SourceRowState::Unlinked) {
        return logs;
    }
    local.meta.source = ChangeSource::HrSystem;
    local.meta.source_row_state = Some(SourceRowState::Live);
    if !opts.match_only {
        logs.extend(local.update_from_instance(remote));
    }
    logs
}
