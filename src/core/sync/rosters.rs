//! Roster sync.
//!
//! Two passes inside one transaction: the desired schedule is reconciled
//! into the local table, then the local table is reconciled against the HR
//! system. Remote writes run after commit and their outcomes are recorded in
//! a second transaction.

use super::{SyncReport, close_tx, finish};
use crate::adapters::correlated::{CreateOutcome, create_correlated};
use crate::adapters::hr::{RemoteBreak, RemoteRoster};
use crate::adapters::{FetchFilter, ScheduleBuilder, SourceAdapter};
use crate::core::provenance::{MutableRecord, Provenance, RecordMeta};
use crate::core::reconcile::reconcile;
use crate::db;
use crate::errors::AppResult;
use crate::models::{
    BreakSlot, ChangeLog, ChangeSource, ChangeType, EntityKind, PushError, Roster, RosterKey,
    SourceRowState,
};
use crate::utils::date::DateRange;
use rusqlite::Connection;
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

/// Fields that the HR system recalculates on its own.
const IGNORED_FIELDS: &[&str] = &["warning"];

#[derive(Debug, Clone)]
pub struct RosterSyncOptions {
    pub dry_run: bool,
    pub push: bool,
    pub range: DateRange,
    /// Creator id of shifts made by this integration. `None` considers every
    /// remote shift for matching, but only shifts linked to a local row are
    /// ever deleted remotely.
    pub integration_creator_id: Option<String>,
}

/// External id ↔ local id lookups for people and areas.
struct Links {
    person_by_srid: HashMap<String, i64>,
    person_srid: HashMap<i64, String>,
    area_by_srid: HashMap<String, i64>,
    area_srid: HashMap<i64, String>,
}

impl Links {
    fn load(conn: &Connection) -> AppResult<Self> {
        let mut links = Links {
            person_by_srid: HashMap::new(),
            person_srid: HashMap::new(),
            area_by_srid: HashMap::new(),
            area_srid: HashMap::new(),
        };
        for p in db::people::load_all(conn)? {
            if let (Some(id), Some(srid)) = (p.meta.id, p.meta.source_row_id) {
                links.person_by_srid.insert(srid.clone(), id);
                links.person_srid.insert(id, srid);
            }
        }
        for a in db::areas::load_all(conn)? {
            if let (Some(id), Some(srid)) = (a.meta.id, a.meta.source_row_id) {
                links.area_by_srid.insert(srid.clone(), id);
                links.area_srid.insert(id, srid);
            }
        }
        Ok(links)
    }

    fn to_local(&self, remote: &RemoteRoster) -> Roster {
        let source = ChangeSource::HrSystem;
        let meta = RecordMeta::observed(source, remote.id.clone().unwrap_or_default());
        let person_id = remote
            .employee_id
            .as_ref()
            .and_then(|e| self.person_by_srid.get(e).copied());
        let area_id = remote
            .area_id
            .as_ref()
            .and_then(|a| self.area_by_srid.get(a).copied());

        let mut roster = Roster::new(meta, person_id, area_id, remote.start, remote.end);
        roster.breaks = Provenance::observed(
            remote
                .breaks
                .iter()
                .map(|b| BreakSlot {
                    start: b.start,
                    end: b.end,
                    meal: b.meal,
                })
                .collect(),
            source,
        );
        roster.meal_break_mins = Provenance::observed(remote.meal_break_mins, source);
        roster.open_shift = Provenance::observed(remote.open_shift, source);
        roster.published = Provenance::observed(remote.published, source);
        roster.shift_notes = Provenance::observed(remote.comment.clone(), source);
        roster.shift_confirmed = Provenance::observed(remote.confirmed, source);
        roster.warning = Provenance::observed(remote.warning.clone(), source);
        roster.rider_srid = remote.employee_id.clone();
        roster
    }

    fn to_remote(&self, roster: &Roster, creator_id: Option<&str>) -> RemoteRoster {
        RemoteRoster {
            id: roster.meta.source_row_id.clone(),
            employee_id: roster
                .person_id
                .get()
                .and_then(|id| self.person_srid.get(&id).cloned())
                .or_else(|| roster.rider_srid.clone()),
            area_id: roster
                .area_id
                .get()
                .and_then(|id| self.area_srid.get(&id).cloned()),
            start: *roster.time_start.get(),
            end: *roster.time_end.get(),
            breaks: roster
                .breaks
                .get()
                .iter()
                .map(|b| RemoteBreak {
                    start: b.start,
                    end: b.end,
                    meal: b.meal,
                })
                .collect(),
            meal_break_mins: *roster.meal_break_mins.get(),
            open_shift: *roster.open_shift.get(),
            published: *roster.published.get(),
            comment: roster.shift_notes.get().clone(),
            confirmed: *roster.shift_confirmed.get(),
            warning: roster.warning.get().clone(),
            creator_id: creator_id.map(str::to_string),
            modified: None,
        }
    }
}

/// Remote work decided inside the transaction, carried out after commit.
#[derive(Default)]
struct PushPlan {
    /// Local rows to create remotely.
    create: Vec<Roster>,
    /// Local rows whose remote copy must be brought in line.
    update: Vec<Roster>,
    /// Remote ids to delete, with the local row they belonged to if known.
    delete: Vec<(String, Option<Roster>)>,
}

impl PushPlan {
    fn len(&self) -> usize {
        self.create.len() + self.update.len() + self.delete.len()
    }
}

pub fn sync_rosters<A, S>(
    conn: &mut Connection,
    adapter: &mut A,
    schedule: &S,
    opts: &RosterSyncOptions,
) -> SyncReport
where
    A: SourceAdapter<Record = RemoteRoster>,
    S: ScheduleBuilder,
{
    let mut report = SyncReport::new("rosters", opts.dry_run);
    let result = run(conn, adapter, schedule, opts, &mut report);
    finish(conn, report, result)
}

fn run<A, S>(
    conn: &mut Connection,
    adapter: &mut A,
    schedule: &S,
    opts: &RosterSyncOptions,
    report: &mut SyncReport,
) -> AppResult<()>
where
    A: SourceAdapter<Record = RemoteRoster>,
    S: ScheduleBuilder,
{
    let desired = schedule.desired_rosters(&opts.range)?;
    let fetched = adapter.fetch_collection(&FetchFilter::range(opts.range))?;
    let total = fetched.len();

    let remote: Vec<RemoteRoster> = fetched
        .into_iter()
        .filter(|r| match &opts.integration_creator_id {
            Some(creator) => r.creator_id.as_deref() == Some(creator.as_str()),
            None => true,
        })
        .collect();
    info!(
        adapter = adapter.name(),
        fetched = total,
        considered = remote.len(),
        desired = desired.len(),
        "fetched rosters"
    );

    let tx = conn.transaction()?;
    let links = Links::load(&tx)?;
    let mut logs: Vec<ChangeLog> = Vec::new();

    // ---------------------------
    // Pass 1: desired schedule -> local table
    // ---------------------------
    let (mut locals, deleted_rows): (Vec<Roster>, Vec<Roster>) =
        db::rosters::load_range(&tx, &opts.range)?
            .into_iter()
            .partition(|r| !r.meta.state_is(SourceRowState::Deleted));
    report_duplicate_keys(&locals, report);

    let rec = reconcile(&desired, &locals, RosterKey::of, None, &[]);
    debug!(summary = %rec.summary(), "desired vs local rosters");
    let changed: Vec<RosterKey> = rec.candidate_keys().into_iter().collect();
    let added: Vec<RosterKey> = rec.added.keys().cloned().collect();
    let dropped: Vec<RosterKey> = rec.deleted.keys().cloned().collect();
    drop(rec);

    let local_idx: HashMap<RosterKey, usize> =
        locals.iter().enumerate().map(|(i, r)| (r.key(), i)).collect();
    let desired_idx: HashMap<RosterKey, usize> =
        desired.iter().enumerate().map(|(i, r)| (r.key(), i)).collect();

    for key in &changed {
        let local = &mut locals[local_idx[key]];
        if let Some(log) = local.merge_from(&desired[desired_idx[key]]) {
            db::rosters::update(&tx, local)?;
            logs.push(log);
            report.counts.changed += 1;
        }
    }

    let mut removed = vec![false; locals.len()];
    for key in &dropped {
        let i = local_idx[key];
        if let Some(log) = locals[i].mark_source_deleted(false) {
            db::rosters::update(&tx, &mut locals[i])?;
            logs.push(log);
            report.counts.deleted += 1;
        }
        removed[i] = true;
    }

    let mut retired = deleted_rows;
    let mut current: Vec<Roster> = Vec::with_capacity(locals.len());
    for (roster, gone) in locals.into_iter().zip(removed) {
        if gone {
            retired.push(roster);
        } else {
            current.push(roster);
        }
    }

    for key in &added {
        let mut roster = desired[desired_idx[key]].clone();
        roster.meta = RecordMeta::pending(ChangeSource::System);
        roster.push_error = None;
        db::rosters::insert(&tx, &mut roster)?;
        logs.push(roster.change_log(ChangeType::Created, format!("created: {roster}")));
        report.counts.added += 1;
        current.push(roster);
    }

    // ---------------------------
    // Pass 2: local table -> HR system
    // ---------------------------
    let mut remote_rows: Vec<Roster> = Vec::with_capacity(remote.len());
    for r in &remote {
        if r.id.is_none() {
            report.warn(format!("remote shift starting {} has no id, skipped", r.start));
            continue;
        }
        remote_rows.push(links.to_local(r));
    }
    let rec = reconcile(&remote_rows, &current, RosterKey::of, None, IGNORED_FIELDS);
    debug!(summary = %rec.summary(), "local vs remote rosters");
    report.counts.matched = rec.matched_len();

    let in_sync: Vec<RosterKey> = rec
        .unchanged
        .keys()
        .chain(rec.changes_ignored.keys())
        .cloned()
        .collect();
    let to_update: Vec<RosterKey> = rec.changed.keys().cloned().collect();
    let remote_only: Vec<RosterKey> = rec.added.keys().cloned().collect();
    let local_only: Vec<RosterKey> = rec.deleted.keys().cloned().collect();
    drop(rec);

    let current_idx: HashMap<RosterKey, usize> =
        current.iter().enumerate().map(|(i, r)| (r.key(), i)).collect();
    let remote_idx: HashMap<RosterKey, usize> = remote_rows
        .iter()
        .enumerate()
        .map(|(i, r)| (r.key(), i))
        .collect();

    let mut plan = PushPlan::default();

    for key in &in_sync {
        let local = &mut current[current_idx[key]];
        let remote_id = remote_rows[remote_idx[key]].meta.source_row_id.clone();
        report.counts.unchanged += 1;

        let linked = local.meta.source_row_id == remote_id
            && local.meta.state_is(SourceRowState::Live);
        if linked && local.push_error.is_none() {
            continue;
        }
        if local.meta.source_row_id != remote_id {
            logs.push(
                local
                    .change_log(
                        ChangeType::Changed,
                        format!(
                            "linked to source_row_id={}",
                            remote_id.as_deref().unwrap_or_default()
                        ),
                    )
                    .with_data(json!({ "source_row_id": [local.meta.source_row_id, remote_id] })),
            );
        }
        local.meta.source_row_id = remote_id;
        local.meta.source_row_state = Some(SourceRowState::Live);
        local.push_error = None;
        db::rosters::update(&tx, local)?;
    }

    for key in &to_update {
        let local = &mut current[current_idx[key]];
        let remote_id = remote_rows[remote_idx[key]].meta.source_row_id.clone();
        if local.meta.source_row_id != remote_id {
            local.meta.source_row_id = remote_id;
            local.meta.source_row_state = Some(SourceRowState::Live);
            db::rosters::update(&tx, local)?;
        }
        plan.update.push(local.clone());
    }

    // remote shifts nobody wants: the local row, if any, is deleted or has
    // moved to a different key
    let mut deleted_by_srid: HashMap<String, Roster> = retired
        .into_iter()
        .filter_map(|r| r.meta.source_row_id.clone().map(|s| (s, r)))
        .collect();
    for key in &remote_only {
        let remote_id = remote_rows[remote_idx[key]]
            .meta
            .source_row_id
            .clone()
            .unwrap_or_default();
        let local = deleted_by_srid.remove(&remote_id).or_else(|| {
            current
                .iter()
                .find(|r| r.meta.source_row_id.as_deref() == Some(remote_id.as_str()))
                .cloned()
        });
        // without a creator marker an unknown shift may have been made by hand
        if local.is_none() && opts.integration_creator_id.is_none() {
            report.warn(format!(
                "remote shift source_row_id={remote_id} is not linked locally and no integration creator id is set, left alone"
            ));
            continue;
        }
        plan.delete.push((remote_id, local));
    }

    for key in &local_only {
        plan.create.push(current[current_idx[key]].clone());
    }

    db::change_log::append_all(&tx, &mut logs)?;
    close_tx(tx, opts.dry_run)?;
    report.change_logs.extend(logs);

    if opts.dry_run {
        info!(planned = plan.len(), "dry run, no remote writes");
        return Ok(());
    }
    if !opts.push {
        if plan.len() > 0 {
            info!(planned = plan.len(), "roster push disabled, remote writes skipped");
        }
        return Ok(());
    }

    execute_plan(conn, adapter, &links, plan, opts, report)
}

fn report_duplicate_keys(locals: &[Roster], report: &mut SyncReport) {
    let mut seen: BTreeMap<RosterKey, Vec<String>> = BTreeMap::new();
    for r in locals {
        seen.entry(r.key()).or_default().push(r.describe());
    }
    for rows in seen.values().filter(|rows| rows.len() > 1) {
        report.duplicate(format!("same shift key: {}", rows.join(", ")));
    }
}

fn execute_plan<A>(
    conn: &mut Connection,
    adapter: &mut A,
    links: &Links,
    mut plan: PushPlan,
    opts: &RosterSyncOptions,
    report: &mut SyncReport,
) -> AppResult<()>
where
    A: SourceAdapter<Record = RemoteRoster>,
{
    let creator = opts.integration_creator_id.as_deref();
    let mut logs: Vec<ChangeLog> = Vec::new();
    let mut touched: Vec<Roster> = Vec::new();

    // 1) updates
    if !plan.update.is_empty() {
        let records: Vec<RemoteRoster> = plan
            .update
            .iter()
            .map(|r| links.to_remote(r, creator))
            .collect();
        let outcome = adapter.push_update(&records);
        for mut roster in plan.update.drain(..) {
            let srid = roster.meta.source_row_id.clone().unwrap_or_default();
            let ok = match &outcome {
                Ok(o) => o.succeeded.contains(&srid) && !o.failed.contains(&srid),
                Err(_) => false,
            };
            if ok {
                roster.push_error = None;
                logs.push(roster.change_log(ChangeType::PushChange, format!("pushed: {roster}")));
                report.counts.pushed += 1;
            } else {
                roster.push_error = Some(PushError::UpdateFailed);
                report.error(format!("update failed for {}", roster.describe()));
            }
            touched.push(roster);
        }
        if let Err(e) = outcome {
            report.error(format!("push_update failed: {e}"));
        }
    }

    // 2) deletes
    if !plan.delete.is_empty() {
        let ids: Vec<String> = plan.delete.iter().map(|(id, _)| id.clone()).collect();
        let outcome = adapter.push_delete(&ids);
        for (id, local) in plan.delete.drain(..) {
            let ok = matches!(&outcome, Ok(done) if done.contains(&id));
            match (ok, local) {
                (true, Some(mut roster)) => {
                    roster.push_error = None;
                    logs.push(
                        roster.change_log(ChangeType::PushDelete, format!("deleted remotely: {roster}")),
                    );
                    touched.push(roster);
                    report.counts.pushed += 1;
                }
                (true, None) => {
                    logs.push(
                        ChangeLog::new(
                            EntityKind::Roster,
                            format!("remote roster {id}"),
                            ChangeSource::HrSystem,
                            ChangeType::PushDelete,
                            format!("deleted remotely: source_row_id={id}"),
                        )
                        .with_record(None, Some(id)),
                    );
                    report.counts.pushed += 1;
                }
                (false, Some(mut roster)) => {
                    roster.push_error = Some(PushError::DeleteFailed);
                    report.error(format!("delete failed for {}", roster.describe()));
                    touched.push(roster);
                }
                (false, None) => report.error(format!("delete failed for remote roster {id}")),
            }
        }
        if let Err(e) = outcome {
            report.error(format!("push_delete failed: {e}"));
        }
    }

    // 3) creates, correlated by token
    if !plan.create.is_empty() {
        let records: Vec<RemoteRoster> = plan
            .create
            .iter()
            .map(|r| {
                let mut remote = links.to_remote(r, creator);
                remote.id = None;
                remote
            })
            .collect();

        match create_correlated(adapter, &records) {
            Ok(outcomes) => {
                for (mut roster, outcome) in plan.create.drain(..).zip(outcomes) {
                    apply_create(&mut roster, outcome, &mut logs, report);
                    touched.push(roster);
                }
            }
            Err(e) => {
                report.error(format!("push_create failed: {e}"));
                for mut roster in plan.create.drain(..) {
                    roster.push_error = Some(PushError::CreateFailed);
                    touched.push(roster);
                }
            }
        }
    }

    let tx = conn.transaction()?;
    for roster in touched.iter_mut() {
        db::rosters::update(&tx, roster)?;
    }
    db::change_log::append_all(&tx, &mut logs)?;
    tx.commit()?;
    report.change_logs.extend(logs);
    Ok(())
}

fn apply_create(
    roster: &mut Roster,
    outcome: CreateOutcome,
    logs: &mut Vec<ChangeLog>,
    report: &mut SyncReport,
) {
    let id = match outcome {
        CreateOutcome::Created { id } => id,
        CreateOutcome::CreatedUnrestored { id, reason } => {
            report.warn(format!(
                "roster {id} created but shift notes not restored: {reason}"
            ));
            id
        }
        CreateOutcome::Failed(reason) => {
            roster.push_error = Some(PushError::CreateFailed);
            report.error(format!("create failed for {}: {reason}", roster.describe()));
            return;
        }
    };

    let change_type = if roster.meta.source_row_id.is_some() {
        ChangeType::PushRecreate
    } else {
        ChangeType::PushCreate
    };
    roster.meta.source_row_id = Some(id);
    roster.meta.source_row_state = Some(SourceRowState::Live);
    roster.push_error = None;
    logs.push(roster.change_log(change_type, format!("created remotely: {roster}")));
    report.counts.pushed += 1;
}
