use crate::adapters::booking::{ManifestLine, Ticket};
use crate::adapters::hr::{RemoteArea, RemoteEmployee};
use crate::adapters::snapshot::JsonSnapshot;
use crate::cli::parser::{BookingSourceArg, Commands, SyncTarget};
use crate::config::Config;
use crate::core::sync::{
    AreaSyncOptions, BookingSyncOptions, PeopleSyncOptions, SyncReport, sync_areas,
    sync_bookings_a, sync_bookings_b, sync_people,
};
use crate::db::pool::DbPool;
use crate::errors::{AppError, AppResult};
use crate::ui::messages;
use crate::utils::date::{DateRange, parse_date_arg};

/// Handle `sync <target>`. Snapshot files are read-only, so nothing is pushed.
pub fn handle(cmd: &Commands, cfg: &Config) -> AppResult<()> {
    let Commands::Sync { target } = cmd else {
        return Ok(());
    };

    let mut pool = DbPool::new(&cfg.database)?;

    let report = match target {
        SyncTarget::Areas { file, dry_run } => {
            let mut adapter = JsonSnapshot::<RemoteArea>::new("hr_areas", file);
            let opts = AreaSyncOptions {
                dry_run: *dry_run,
                push: false,
            };
            sync_areas(&mut pool.conn, &mut adapter, &opts)
        }

        SyncTarget::People {
            file,
            dry_run,
            allow_add,
            match_only,
            disable_unlinked,
        } => {
            let mut adapter = JsonSnapshot::<RemoteEmployee>::new("hr_people", file);
            let opts = PeopleSyncOptions {
                dry_run: *dry_run,
                allow_add: *allow_add || cfg.sync.allow_add_people,
                match_only: *match_only,
                disable_unlinked: *disable_unlinked || cfg.sync.disable_unlinked_people,
            };
            sync_people(&mut pool.conn, &mut adapter, &opts)
        }

        SyncTarget::Bookings {
            source,
            file,
            from,
            to,
            dry_run,
        } => {
            let opts = BookingSyncOptions {
                dry_run: *dry_run,
                range: resolve_range(from.as_deref(), to.as_deref(), cfg)?,
            };
            match source {
                BookingSourceArg::A => {
                    let mut adapter = JsonSnapshot::<ManifestLine>::new("booking_a", file);
                    sync_bookings_a(&mut pool.conn, &mut adapter, &opts)
                }
                BookingSourceArg::B => {
                    let mut adapter = JsonSnapshot::<Ticket>::new("booking_b", file);
                    sync_bookings_b(&mut pool.conn, &mut adapter, &cfg.booking_b, &opts)
                }
            }
        }
    };

    conclude(report)
}

/// `--from`/`--to` when given, else the configured scan window.
fn resolve_range(from: Option<&str>, to: Option<&str>, cfg: &Config) -> AppResult<DateRange> {
    let window = DateRange::around_today(cfg.sync.scan_days_behind, cfg.sync.scan_days_ahead);
    match (from, to) {
        (None, None) => Ok(window),
        (Some(f), None) => {
            let start = parse_date_arg(f)?;
            DateRange::new(start, window.end.max(start))
        }
        (None, Some(t)) => {
            let end = parse_date_arg(t)?;
            DateRange::new(window.start.min(end), end)
        }
        (Some(f), Some(t)) => DateRange::new(parse_date_arg(f)?, parse_date_arg(t)?),
    }
}

fn conclude(report: SyncReport) -> AppResult<()> {
    messages::sync_report(&report);
    if report.is_completed() {
        Ok(())
    } else {
        Err(AppError::Other(report.outcome.to_string()))
    }
}
