//! Entity sync orchestrators.
//!
//! Every entry point fetches before opening a transaction, applies all local
//! writes in one transaction and only talks to the external system again
//! after commit. Failures come back inside the [`SyncReport`], never as `Err`.

pub mod area_index;
pub mod areas;
pub mod bookings;
pub mod people;
pub mod rosters;

use crate::core::provenance::MutableRecord;
use crate::db::log::ttlog;
use crate::errors::{AppError, AppResult};
use crate::models::ChangeLog;
use rusqlite::{Connection, Transaction};
use std::fmt;
use tracing::{error, info, warn};

pub use area_index::AreaIndex;
pub use areas::{AreaSyncOptions, sync_areas};
pub use bookings::{BookingSyncOptions, sync_bookings_a, sync_bookings_b};
pub use people::{PeopleSyncOptions, sync_people};
pub use rosters::{RosterSyncOptions, sync_rosters};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Completed,
    /// Adapter or database failure. Local state is untouched.
    Failed(String),
    /// A safety check refused to apply the batch.
    Aborted(String),
}

impl fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncOutcome::Completed => f.write_str("completed"),
            SyncOutcome::Failed(msg) => write!(f, "failed: {msg}"),
            SyncOutcome::Aborted(msg) => write!(f, "aborted: {msg}"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncCounts {
    pub matched: usize,
    pub added: usize,
    pub changed: usize,
    pub deleted: usize,
    pub unchanged: usize,
    pub pushed: usize,
    pub errors: usize,
}

#[derive(Debug, Clone)]
pub struct SyncReport {
    pub family: &'static str,
    pub outcome: SyncOutcome,
    pub dry_run: bool,
    pub counts: SyncCounts,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    /// Local rows sharing one identity key, reported instead of merged.
    pub duplicates: Vec<String>,
    /// Entries written by this run (or that would have been, on a dry run).
    pub change_logs: Vec<ChangeLog>,
}

impl SyncReport {
    pub fn new(family: &'static str, dry_run: bool) -> Self {
        Self {
            family,
            outcome: SyncOutcome::Completed,
            dry_run,
            counts: SyncCounts::default(),
            errors: Vec::new(),
            warnings: Vec::new(),
            duplicates: Vec::new(),
            change_logs: Vec::new(),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.outcome == SyncOutcome::Completed
    }

    pub fn warn(&mut self, msg: impl Into<String>) {
        let msg = msg.into();
        warn!(family = self.family, "{msg}");
        self.warnings.push(msg);
    }

    /// A per-row failure. Does not stop the run.
    pub fn error(&mut self, msg: impl Into<String>) {
        let msg = msg.into();
        error!(family = self.family, "{msg}");
        self.counts.errors += 1;
        self.errors.push(msg);
    }

    pub fn duplicate(&mut self, msg: impl Into<String>) {
        let msg = msg.into();
        warn!(family = self.family, "duplicate: {msg}");
        self.duplicates.push(msg);
    }

    pub fn summary(&self) -> String {
        let c = &self.counts;
        let mut s = format!(
            "{}: matched={} added={} changed={} deleted={} unchanged={} pushed={} errors={}",
            self.family, c.matched, c.added, c.changed, c.deleted, c.unchanged, c.pushed, c.errors
        );
        if !self.duplicates.is_empty() {
            s.push_str(&format!(" duplicates={}", self.duplicates.len()));
        }
        if self.dry_run {
            s.push_str(" (dry run)");
        }
        if !self.is_completed() {
            s.push_str(&format!(" [{}]", self.outcome));
        }
        s
    }
}

/// Result of merging an observed row into its local counterpart.
pub(crate) enum Merged {
    /// Stored values moved.
    Changed(ChangeLog),
    /// Only the recorded auto values advanced (suppressed writes included).
    AutoOnly,
    Same,
}

/// Run `update_from_instance` and tell apart a real change from an auto
/// value refresh, which is saved without touching `updated`.
pub(crate) fn merge_observed<R: MutableRecord>(local: &mut R, observed: &R) -> Merged {
    let before = local.auto_values();
    match local.update_from_instance(observed) {
        Some(log) => Merged::Changed(log),
        None if local.auto_values() != before => Merged::AutoOnly,
        None => Merged::Same,
    }
}

/// Commit `tx`, or roll it back on a dry run.
pub(crate) fn close_tx(tx: Transaction<'_>, dry_run: bool) -> AppResult<()> {
    if dry_run {
        tx.rollback()?;
    } else {
        tx.commit()?;
    }
    Ok(())
}

/// Fold the run result into the report and record the run in `log`.
pub(crate) fn finish(conn: &Connection, mut report: SyncReport, result: AppResult<()>) -> SyncReport {
    match result {
        Ok(()) => {}
        Err(AppError::SafetyAbort(msg)) => {
            error!(family = report.family, reason = %msg, "sync aborted");
            report.outcome = SyncOutcome::Aborted(msg);
        }
        Err(e) => {
            error!(family = report.family, error = %e, "sync failed");
            report.outcome = SyncOutcome::Failed(e.to_string());
        }
    }

    let summary = report.summary();
    if !report.dry_run
        && let Err(e) = ttlog(conn, "sync", report.family, &summary)
    {
        warn!(error = %e, "failed to write internal log");
    }
    info!(family = report.family, "{summary}");
    report
}
