//! Tour and session sync for the two booking sources.
//!
//! Both sources are parsed into session and tour candidates and applied by
//! the same routine. Matching order: exact external id, then the legacy key
//! of an older data generation (upgraded in place), then new.

use super::{AreaIndex, Merged, SyncReport, close_tx, finish, merge_observed};
use crate::adapters::booking::{ManifestLine, Ticket};
use crate::adapters::{FetchFilter, SourceAdapter};
use crate::config::BookingBConfig;
use crate::core::provenance::{MutableRecord, RecordMeta};
use crate::core::reconcile::reconcile;
use crate::db;
use crate::db::record::write_auto_values;
use crate::errors::{AppError, AppResult};
use crate::models::session::is_legacy_session_key;
use crate::models::{Bikes, ChangeLog, ChangeSource, Session, SourceRowState, Tour};
use crate::utils::date::DateRange;
use regex::Regex;
use rusqlite::{Connection, Transaction};
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy)]
pub struct BookingSyncOptions {
    pub dry_run: bool,
    pub range: DateRange,
}

/// A tour as parsed from a source, with the keys needed to place it.
#[derive(Debug, Clone)]
pub struct TourCandidate {
    pub tour: Tour,
    pub session_srid: String,
    /// External id used by the previous data generation, if any.
    pub legacy_srid: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct BookingBatch {
    pub sessions: Vec<Session>,
    pub tours: Vec<TourCandidate>,
}

// ---------------------------
// Source A: day manifests
// ---------------------------

static QTY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<num>\d+) (?P<what>(?P<num2>\d)? ?[a-z0-9 &()]+|)$")
        .expect("quantity pattern compiles")
});

/// Bikes per unit of a quantity term, and the bike type.
fn quantity_term(term: &str) -> Option<(f64, &'static str)> {
    match term {
        "solo" | "peddle" | "couple" | "regular" => Some((1.0, "bike")),
        "family" | "ebike" => Some((1.0, "ebike")),
        "adult" | "adults" => Some((0.49, "bike")),
        "person" | "people" | "quantity" => Some((0.5, "bike")),
        "child" | "children" => Some((0.2501, "bike")),
        _ => None,
    }
}

/// Bikes needed for a quantity text such as `1 Couple` or
/// `2 Adults\n1 Child`. Each line counts separately and every bike type is
/// rounded up.
pub fn bikes_from_quantity(quantity: &str) -> Bikes {
    let mut totals: HashMap<&'static str, f64> = HashMap::new();

    for line in quantity.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let lower = line.to_lowercase();
        let Some(caps) = QTY_RE.captures(&lower) else {
            warn!(line, "cannot parse quantity line");
            continue;
        };
        let num: f64 = caps["num"].parse().unwrap_or(0.0);
        let what = &caps["what"];
        let term = what.split(' ').next().unwrap_or(what);

        // "1 2 Adults & 1 Child" books one bike
        if caps.name("num2").is_some() {
            *totals.entry("bike").or_default() += num;
        } else if let Some((per_unit, kind)) = quantity_term(term) {
            *totals.entry(kind).or_default() += num * per_unit;
        } else {
            warn!(term, line, "unknown quantity term");
        }
    }

    totals
        .into_iter()
        .map(|(kind, n)| (kind.to_string(), n.ceil() as i64))
        .collect()
}

/// Booking name on the first line, other participants below it.
fn manifest_customer_name(line: &ManifestLine) -> String {
    let booking = line.booking_name.trim();
    let participants = line.participants.trim();
    if participants.is_empty() {
        return booking.to_string();
    }
    let others = participants.replace(booking, "").replace("\n\n", "\n");
    format!("{}\n{}", booking, others.trim()).trim_end().to_string()
}

pub fn parse_manifest(lines: &[ManifestLine]) -> BookingBatch {
    let source = ChangeSource::BookingA;
    let mut batch = BookingBatch::default();
    let mut session_pos: HashMap<String, usize> = HashMap::new();
    let mut tour_pos: HashMap<String, usize> = HashMap::new();

    for line in lines {
        let session_srid = line.session_id.trim().to_string();
        if !session_pos.contains_key(&session_srid) {
            let mut session = Session::new(
                RecordMeta::observed(source, session_srid.as_str()),
                line.session_type.trim(),
                line.start,
                line.end,
            );
            session.session_note.force(line.session_note.trim().to_string(), source);
            session_pos.insert(session_srid.clone(), batch.sessions.len());
            batch.sessions.push(session);
        }

        let srid = line.tour_id();
        let quantity = line.quantity.trim().to_string();
        let mut tour = Tour::new(
            RecordMeta::observed(source, srid.as_str()),
            line.product.trim(),
            line.start,
            line.end,
        );
        tour.pickup_location.force(line.pickup_location.trim().to_string(), source);
        tour.customer_name.force(manifest_customer_name(line), source);
        tour.customer_contact.force(line.phone.trim().to_string(), source);
        tour.bikes.force(bikes_from_quantity(&quantity), source);
        tour.quantity.force(quantity, source);
        tour.notes.force(line.notes.join("\n").trim().to_string(), source);

        let legacy = line.order_number.trim().to_string();
        let candidate = TourCandidate {
            tour,
            session_srid,
            legacy_srid: (legacy != srid).then_some(legacy),
        };
        match tour_pos.get(&srid) {
            Some(&i) => batch.tours[i] = candidate,
            None => {
                tour_pos.insert(srid, batch.tours.len());
                batch.tours.push(candidate);
            }
        }
    }
    batch
}

// ---------------------------
// Source B: tickets
// ---------------------------

struct Performance<'a> {
    first: &'a Ticket,
    names: Vec<(String, usize)>,
    notes: Vec<String>,
}

/// One tour and one session per performance.
pub fn aggregate_tickets(tickets: &[Ticket], cfg: &BookingBConfig) -> BookingBatch {
    let source = ChangeSource::BookingB;
    let mut order: Vec<&str> = Vec::new();
    let mut perfs: HashMap<&str, Performance> = HashMap::new();

    for ticket in tickets {
        let key = ticket.performance_id.as_str();
        let name = ticket.customer_display_name();
        let perf = perfs.entry(key).or_insert_with(|| {
            order.push(key);
            Performance {
                first: ticket,
                names: Vec::new(),
                notes: Vec::new(),
            }
        });

        match perf.names.iter_mut().find(|(n, _)| *n == name) {
            Some((_, count)) => *count += 1,
            None => perf.names.push((name.clone(), 1)),
        }
        if let Some(info) = ticket.access_information.as_deref()
            && !info.trim().is_empty()
        {
            perf.notes.push(format!("{}: {}", name, info.trim()));
        }
    }

    let mut batch = BookingBatch::default();
    for key in order {
        let Some(perf) = perfs.get(key) else { continue };
        let title = perf.first.event_title.as_str();
        let start = perf.first.performance_start;
        let end = start + cfg.duration_for(title);
        let tour_type = cfg.tour_type_for(title);
        let pax: usize = perf.names.iter().map(|(_, n)| n).sum();

        let mut session = Session::new(RecordMeta::observed(source, key), &tour_type, start, end);
        session.title.force(title.to_string(), source);

        let mut tour = Tour::new(RecordMeta::observed(source, key), &tour_type, start, end);
        let names: Vec<String> = perf
            .names
            .iter()
            .map(|(n, c)| format!("{n} ({c})"))
            .collect();
        tour.customer_name.force(names.join("\n"), source);
        tour.customer_contact.force("N/A".to_string(), source);
        tour.pickup_location.force(cfg.pickup_for(title).to_string(), source);
        tour.pax.force(Some(pax as i64), source);
        tour.quantity.force(
            format!("{} Attendee{}", pax, if pax > 1 { "s" } else { "" }),
            source,
        );
        tour.bikes.force(
            Bikes::from([("bike".to_string(), pax.div_ceil(2) as i64)]),
            source,
        );
        tour.notes.force(perf.notes.join("\n"), source);

        batch.sessions.push(session);
        batch.tours.push(TourCandidate {
            tour,
            session_srid: key.to_string(),
            legacy_srid: None,
        });
    }
    batch
}

// ---------------------------
// Entry points
// ---------------------------

pub fn sync_bookings_a<A>(conn: &mut Connection, adapter: &mut A, opts: &BookingSyncOptions) -> SyncReport
where
    A: SourceAdapter<Record = ManifestLine>,
{
    let mut report = SyncReport::new("bookings_a", opts.dry_run);
    let result = adapter
        .fetch_collection(&FetchFilter::range(opts.range))
        .map_err(AppError::from)
        .and_then(|lines| {
            info!(adapter = adapter.name(), lines = lines.len(), range = %opts.range, "fetched manifest");
            let batch = parse_manifest(&lines);
            apply(conn, ChangeSource::BookingA, batch, opts, &mut report)
        });
    finish(conn, report, result)
}

pub fn sync_bookings_b<A>(
    conn: &mut Connection,
    adapter: &mut A,
    cfg: &BookingBConfig,
    opts: &BookingSyncOptions,
) -> SyncReport
where
    A: SourceAdapter<Record = Ticket>,
{
    let mut report = SyncReport::new("bookings_b", opts.dry_run);
    let result = adapter
        .fetch_collection(&FetchFilter::range(opts.range))
        .map_err(AppError::from)
        .and_then(|tickets| {
            info!(adapter = adapter.name(), tickets = tickets.len(), range = %opts.range, "fetched tickets");
            let batch = aggregate_tickets(&tickets, cfg);
            apply(conn, ChangeSource::BookingB, batch, opts, &mut report)
        });
    finish(conn, report, result)
}

// ---------------------------
// Apply
// ---------------------------

fn srid_of<R: MutableRecord>(record: &R) -> String {
    record.meta().source_row_id.clone().unwrap_or_default()
}

fn apply(
    conn: &mut Connection,
    source: ChangeSource,
    mut batch: BookingBatch,
    opts: &BookingSyncOptions,
    report: &mut SyncReport,
) -> AppResult<()> {
    let tx = conn.transaction()?;

    let live = db::tours::count_live(&tx, source, &opts.range)?;
    if batch.tours.is_empty() && live > 0 {
        return Err(AppError::SafetyAbort(format!(
            "{source} returned no bookings for {} while {live} live bookings exist locally",
            opts.range
        )));
    }

    let mut logs: Vec<ChangeLog> = Vec::new();

    let session_ids = apply_sessions(&tx, source, &batch.sessions, opts, &mut logs)?;

    let mut areas = db::areas::load_all(&tx)?;
    let mut index = AreaIndex::build(&areas);
    for c in batch.tours.iter_mut() {
        let session_id = session_ids.get(&c.session_srid).copied();
        let area_id = index.resolve(c.tour.pickup_location.get());
        c.tour.session_id.force(session_id, source);
        c.tour.tour_area_id.force(area_id, source);
    }

    apply_tours(&tx, source, batch.tours, opts, report, &mut logs)?;

    // learned locations leave `updated` alone so area sync still resolves
    // by the last real edit
    if !opts.dry_run {
        for id in index.apply_learned(&mut areas) {
            if let Some(area) = areas.iter().find(|a| a.meta.id == Some(id)) {
                db::areas::write_tour_locations(&tx, area)?;
            }
        }
    }

    db::change_log::append_all(&tx, &mut logs)?;
    close_tx(tx, opts.dry_run)?;
    report.change_logs.extend(logs);
    Ok(())
}

/// Returns external session id → local id for every candidate.
fn apply_sessions(
    tx: &Transaction<'_>,
    source: ChangeSource,
    candidates: &[Session],
    opts: &BookingSyncOptions,
    logs: &mut Vec<ChangeLog>,
) -> AppResult<HashMap<String, i64>> {
    let extra: Vec<String> = candidates.iter().map(srid_of).collect();
    let (mut legacy, mut locals): (Vec<Session>, Vec<Session>) =
        db::sessions::load_for_sync(tx, source, &opts.range, &extra)?
            .into_iter()
            .partition(|s| s.meta.source_row_id.as_deref().is_some_and(is_legacy_session_key));

    // 1) upgrade legacy keys where a candidate now carries a real id
    let mut upgraded = HashSet::new();
    for cand in candidates {
        let key = cand.legacy_key();
        if let Some(pos) = legacy.iter().position(|s| srid_of(s) == key) {
            let mut s = legacy.remove(pos);
            debug!(from = %key, to = %srid_of(cand), "upgrading legacy session key");
            s.meta.source_row_id = cand.meta.source_row_id.clone();
            upgraded.insert(srid_of(cand));
            locals.push(s);
        }
    }

    let rec = reconcile(candidates, &locals, srid_of::<Session>, None, &[]);
    let matched: Vec<String> = rec
        .unchanged
        .keys()
        .cloned()
        .chain(rec.candidate_keys())
        .collect();
    let added: Vec<String> = rec.added.keys().cloned().collect();
    let gone: HashSet<String> = rec.deleted.keys().cloned().collect();
    info!(summary = %rec.summary(), legacy_upgraded = upgraded.len(), "reconciled sessions");
    drop(rec);

    let cand_by_srid: HashMap<String, &Session> =
        candidates.iter().map(|s| (srid_of(s), s)).collect();
    let matched: HashSet<String> = matched.into_iter().collect();
    let mut ids = HashMap::new();

    for local in locals.iter_mut() {
        let key = srid_of(local);
        let mut dirty = upgraded.contains(&key);
        let mut auto_only = false;

        if matched.contains(&key) {
            if local.meta.state_is(SourceRowState::Deleted)
                && let Some(log) = local.mark_source_added(false)
            {
                logs.push(log);
                dirty = true;
            }
            match merge_observed(local, cand_by_srid[&key]) {
                Merged::Changed(log) => {
                    logs.push(log);
                    dirty = true;
                }
                Merged::AutoOnly => auto_only = true,
                Merged::Same => {}
            }
        } else if gone.contains(&key)
            && local.meta.state_is(SourceRowState::Live)
            && let Some(log) = local.mark_source_deleted(false)
        {
            logs.push(log);
            dirty = true;
        }

        if dirty {
            db::sessions::update(tx, local)?;
        } else if auto_only {
            write_auto_values(tx, local)?;
        }
        if let Some(id) = local.meta.id {
            ids.insert(key, id);
        }
    }

    // 2) legacy rows no candidate claimed
    for mut s in legacy {
        if s.meta.state_is(SourceRowState::Live)
            && let Some(log) = s.mark_source_deleted(false)
        {
            db::sessions::update(tx, &mut s)?;
            logs.push(log);
        }
    }

    for key in added {
        let mut session = cand_by_srid[&key].clone();
        let log = session.mark_source_added(false);
        let id = db::sessions::insert(tx, &mut session)?;
        if let Some(mut log) = log {
            log.attach_record_id(id);
            logs.push(log);
        }
        ids.insert(key, id);
    }

    Ok(ids)
}

fn apply_tours(
    tx: &Transaction<'_>,
    source: ChangeSource,
    candidates: Vec<TourCandidate>,
    opts: &BookingSyncOptions,
    report: &mut SyncReport,
    logs: &mut Vec<ChangeLog>,
) -> AppResult<()> {
    // rescheduled bookings may sit outside the window
    let extra: Vec<String> = candidates
        .iter()
        .flat_map(|c| std::iter::once(srid_of(&c.tour)).chain(c.legacy_srid.clone()))
        .collect();
    let loaded = db::tours::load_for_sync(tx, source, &opts.range, &extra)?;

    // 1) duplicates: keep the latest row per external id
    let mut by_srid: HashMap<String, usize> = HashMap::new();
    let mut locals: Vec<Option<Tour>> = Vec::with_capacity(loaded.len());
    for tour in loaded {
        let key = srid_of(&tour);
        if let Some(&prev) = by_srid.get(&key)
            && let Some(old) = locals[prev].take()
        {
            report.duplicate(format!("{} duplicates {}", old.describe(), tour.describe()));
        }
        by_srid.insert(key, locals.len());
        locals.push(Some(tour));
    }

    // 2) legacy ids: upgrade in place when the type confirms the match
    let mut upgraded = HashSet::new();
    for c in &candidates {
        let Some(legacy) = &c.legacy_srid else { continue };
        let Some(&li) = by_srid.get(legacy) else { continue };
        let new_srid = srid_of(&c.tour);

        if by_srid.contains_key(&new_srid) {
            if let Some(old) = locals[li].take() {
                report.duplicate(format!(
                    "{} has both legacy id {} and id {}",
                    old.describe(),
                    legacy,
                    new_srid
                ));
            }
            by_srid.remove(legacy);
            continue;
        }

        let Some(local) = locals[li].as_mut() else { continue };
        if !local.same_type(&c.tour) {
            continue;
        }
        debug!(from = %legacy, to = %new_srid, "upgrading legacy tour id");
        local.meta.source_row_id = Some(new_srid.clone());
        by_srid.remove(legacy);
        by_srid.insert(new_srid.clone(), li);
        upgraded.insert(new_srid);
    }

    let mut locals: Vec<Tour> = locals.into_iter().flatten().collect();
    let tours: Vec<Tour> = candidates.into_iter().map(|c| c.tour).collect();

    let rec = reconcile(&tours, &locals, srid_of::<Tour>, None, &[]);
    debug!(summary = %rec.summary(), "reconciled tours");
    report.counts.matched = rec.matched_len();
    let matched: HashSet<String> = rec
        .unchanged
        .keys()
        .cloned()
        .chain(rec.candidate_keys())
        .collect();
    let added: Vec<String> = rec.added.keys().cloned().collect();
    let gone: HashSet<String> = rec.deleted.keys().cloned().collect();
    drop(rec);

    let cand_by_srid: HashMap<String, &Tour> = tours.iter().map(|t| (srid_of(t), t)).collect();

    for local in locals.iter_mut() {
        let key = srid_of(local);
        let mut dirty = upgraded.contains(&key);
        let mut changed = false;
        let mut auto_only = false;

        if matched.contains(&key) {
            if local.meta.state_is(SourceRowState::Deleted)
                && let Some(log) = local.mark_source_added(false)
            {
                logs.push(log);
                changed = true;
            }
            match merge_observed(local, cand_by_srid[&key]) {
                Merged::Changed(log) => {
                    logs.push(log);
                    changed = true;
                }
                Merged::AutoOnly => auto_only = true,
                Merged::Same => {}
            }
            if changed {
                report.counts.changed += 1;
            } else {
                report.counts.unchanged += 1;
            }
        } else if gone.contains(&key)
            && local.meta.state_is(SourceRowState::Live)
            && opts.range.contains_time(local.time_start.get())
            && let Some(log) = local.mark_source_deleted(false)
        {
            logs.push(log);
            changed = true;
            report.counts.deleted += 1;
        }

        dirty |= changed;
        if dirty {
            db::tours::update(tx, local)?;
        } else if auto_only {
            write_auto_values(tx, local)?;
        }
    }

    for key in added {
        let mut tour = cand_by_srid[&key].clone();
        let log = tour.mark_source_added(false);
        let id = db::tours::insert(tx, &mut tour)?;
        if let Some(mut log) = log {
            log.attach_record_id(id);
            logs.push(log);
        }
        report.counts.added += 1;
    }

    if !upgraded.is_empty() {
        info!(count = upgraded.len(), "upgraded legacy tour ids");
    }
    Ok(())
}
