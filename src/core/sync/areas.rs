//! Area sync: bidirectional, resolved by `updated` timestamps.

use super::{Merged, SyncReport, close_tx, finish, merge_observed};
use crate::adapters::hr::RemoteArea;
use crate::adapters::{FetchFilter, SourceAdapter};
use crate::core::provenance::{MutableRecord, RecordMeta};
use crate::core::reconcile::reconcile;
use crate::db;
use crate::db::record::write_auto_values;
use crate::errors::AppResult;
use crate::models::{Area, ChangeLog, ChangeSource, SourceRowState};
use chrono::Utc;
use rusqlite::Connection;
use std::collections::HashMap;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, Default)]
pub struct AreaSyncOptions {
    pub dry_run: bool,
    /// Send locally authoritative rows back to the HR system.
    pub push: bool,
}

fn to_local(remote: &RemoteArea) -> Option<Area> {
    let id = remote.id.as_deref()?;
    let mut meta = RecordMeta::observed(ChangeSource::HrSystem, id);
    meta.updated = Some(remote.modified);
    Some(Area::new(
        meta,
        &remote.name,
        remote.colour.clone(),
        remote.sort_order,
    ))
}

fn to_remote(area: &Area) -> RemoteArea {
    RemoteArea {
        id: area.meta.source_row_id.clone(),
        name: area.area_name.get().clone(),
        colour: area.colour.get().clone(),
        sort_order: *area.sort_order.get(),
        modified: area.meta.updated.unwrap_or_else(Utc::now),
    }
}

fn srid(area: &Area) -> String {
    area.meta.source_row_id.clone().unwrap_or_default()
}

pub fn sync_areas<A>(conn: &mut Connection, adapter: &mut A, opts: &AreaSyncOptions) -> SyncReport
where
    A: SourceAdapter<Record = RemoteArea>,
{
    let mut report = SyncReport::new("areas", opts.dry_run);
    let result = run(conn, adapter, opts, &mut report);
    finish(conn, report, result)
}

fn run<A>(
    conn: &mut Connection,
    adapter: &mut A,
    opts: &AreaSyncOptions,
    report: &mut SyncReport,
) -> AppResult<()>
where
    A: SourceAdapter<Record = RemoteArea>,
{
    let remote_rows = adapter.fetch_collection(&FetchFilter::all())?;
    info!(adapter = adapter.name(), rows = remote_rows.len(), "fetched areas");

    let mut candidates = Vec::with_capacity(remote_rows.len());
    for r in &remote_rows {
        match to_local(r) {
            Some(area) => candidates.push(area),
            None => report.warn(format!("remote area '{}' has no id, skipped", r.name)),
        }
    }

    let tx = conn.transaction()?;
    let (mut linked, mut pending): (Vec<Area>, Vec<Area>) = db::areas::load_all(&tx)?
        .into_iter()
        .filter(|a| {
            a.meta.source_row_id.is_some() || a.meta.state_is(SourceRowState::Pending)
        })
        .partition(|a| a.meta.source_row_id.is_some());

    let rec = reconcile(&candidates, &linked, srid, None, &[]);
    debug!(summary = %rec.summary(), "reconciled areas");
    report.counts.matched = rec.matched_len();
    report.counts.unchanged = rec.unchanged.len();

    let matched: Vec<String> = rec
        .unchanged
        .keys()
        .chain(rec.candidate_keys().iter())
        .cloned()
        .collect();
    let changed_keys = rec.candidate_keys();
    let added_keys: Vec<String> = rec.added.keys().cloned().collect();
    let deleted_keys: Vec<String> = rec.deleted.keys().cloned().collect();
    drop(rec);

    let local_idx: HashMap<String, usize> =
        linked.iter().enumerate().map(|(i, a)| (srid(a), i)).collect();
    let cand_idx: HashMap<String, usize> = candidates
        .iter()
        .enumerate()
        .map(|(i, a)| (srid(a), i))
        .collect();

    let mut logs: Vec<ChangeLog> = Vec::new();
    let mut dirty = vec![false; linked.len()];
    let mut auto_only = vec![false; linked.len()];
    let mut to_push: Vec<RemoteArea> = Vec::new();

    // 1) rows that reappeared after being marked deleted
    for key in &matched {
        let local = &mut linked[local_idx[key]];
        if local.meta.state_is(SourceRowState::Deleted)
            && let Some(log) = local.mark_source_added(false)
        {
            logs.push(log);
            dirty[local_idx[key]] = true;
        }
    }

    // 2) matched pairs: the later `updated` wins. Remote wins merge every
    // pair so auto values advance even when a write is suppressed.
    for key in &matched {
        let li = local_idx[key];
        let remote = &candidates[cand_idx[key]];
        let local = &mut linked[li];

        if changed_keys.contains(key) && local.meta.updated > remote.meta.updated {
            if !opts.push {
                report.warn(format!(
                    "{} is newer locally, push disabled",
                    local.describe()
                ));
                continue;
            }
            let mut remote_copy = remote.clone();
            if let Some(log) = local.mark_update_pushed(&mut remote_copy) {
                logs.push(log);
                to_push.push(to_remote(local));
                report.counts.changed += 1;
            }
            continue;
        }

        match merge_observed(local, remote) {
            Merged::Changed(log) => {
                logs.push(log);
                dirty[li] = true;
                report.counts.changed += 1;
            }
            Merged::AutoOnly => auto_only[li] = true,
            Merged::Same => {}
        }
    }

    for (i, area) in linked.iter_mut().enumerate() {
        if dirty[i] {
            db::areas::update(&tx, area)?;
        } else if auto_only[i] {
            write_auto_values(&tx, area)?;
        }
    }

    // 3) remote-only rows
    for key in &added_keys {
        let mut area = candidates[cand_idx[key]].clone();
        let log = area.mark_source_added(false);
        let id = db::areas::insert(&tx, &mut area)?;
        if let Some(mut log) = log {
            log.attach_record_id(id);
            logs.push(log);
        }
        report.counts.added += 1;
    }

    // 4) local-only rows
    for key in &deleted_keys {
        let local = &mut linked[local_idx[key]];
        if !local.meta.state_is(SourceRowState::Live) {
            continue;
        }
        if let Some(log) = local.mark_source_deleted(false) {
            db::areas::update(&tx, local)?;
            logs.push(log);
            report.counts.deleted += 1;
        }
    }

    db::change_log::append_all(&tx, &mut logs)?;
    close_tx(tx, opts.dry_run)?;
    report.change_logs.extend(logs);

    if opts.dry_run {
        return Ok(());
    }

    // 5) after commit: push
    if opts.push {
        push_updates(adapter, &to_push, report);
        push_creates(conn, adapter, &mut pending, report)?;
    } else if !pending.is_empty() {
        info!(count = pending.len(), "pending areas left for a push-enabled run");
    }
    Ok(())
}

fn push_updates<A>(adapter: &mut A, rows: &[RemoteArea], report: &mut SyncReport)
where
    A: SourceAdapter<Record = RemoteArea>,
{
    if rows.is_empty() {
        return;
    }
    match adapter.push_update(rows) {
        Ok(outcome) => {
            report.counts.pushed += outcome.succeeded.len();
            for id in outcome.failed {
                report.error(format!("push_update failed for area source_row_id={id}"));
            }
        }
        Err(e) => report.error(format!("push_update failed: {e}")),
    }
}

fn push_creates<A>(
    conn: &mut Connection,
    adapter: &mut A,
    pending: &mut [Area],
    report: &mut SyncReport,
) -> AppResult<()>
where
    A: SourceAdapter<Record = RemoteArea>,
{
    if pending.is_empty() {
        return Ok(());
    }

    let records: Vec<RemoteArea> = pending.iter().map(to_remote).collect();
    let results = match adapter.push_create(&records) {
        Ok(results) => results,
        Err(e) => {
            report.error(format!("push_create failed: {e}"));
            return Ok(());
        }
    };
    if results.len() != pending.len() {
        report.error(format!(
            "push_create returned {} results for {} areas, ids not adopted",
            results.len(),
            pending.len()
        ));
        return Ok(());
    }

    let tx = conn.transaction()?;
    let mut logs = Vec::new();
    for (area, result) in pending.iter_mut().zip(results) {
        match result {
            Ok(created) => {
                area.meta.source_row_id = Some(created.id);
                area.meta.source = ChangeSource::HrSystem;
                if let Some(log) = area.mark_source_added(true) {
                    logs.push(log);
                }
                db::areas::update(&tx, area)?;
                report.counts.pushed += 1;
            }
            Err(reason) => report.error(format!("push_create failed for {}: {reason}", area.describe())),
        }
    }
    db::change_log::append_all(&tx, &mut logs)?;
    tx.commit()?;
    report.change_logs.extend(logs);
    Ok(())
}
