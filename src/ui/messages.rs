use crate::core::sync::SyncReport;
use crate::utils::colors::{GREY, RESET, color_for_outcome};
use std::fmt;

/// ANSI colors
const BOLD: &str = "\x1b[1m";

const FG_BLUE: &str = "\x1b[34m";
const FG_GREEN: &str = "\x1b[32m";
const FG_YELLOW: &str = "\x1b[33m";
const FG_RED: &str = "\x1b[31m";

/// Icons
const ICON_INFO: &str = "ℹ️";
const ICON_OK: &str = "✅";
const ICON_WARN: &str = "⚠️";
const ICON_ERR: &str = "❌";

pub fn info<T: fmt::Display>(msg: T) {
    println!("{}{}{} {}{}", FG_BLUE, BOLD, ICON_INFO, RESET, msg);
}

pub fn success<T: fmt::Display>(msg: T) {
    println!("{}{}{} {}{}", FG_GREEN, BOLD, ICON_OK, RESET, msg);
}

pub fn warning<T: fmt::Display>(msg: T) {
    println!("{}{}{} {}{}", FG_YELLOW, BOLD, ICON_WARN, RESET, msg);
}

pub fn error<T: fmt::Display>(msg: T) {
    eprintln!("{}{}{} {}{}", FG_RED, BOLD, ICON_ERR, RESET, msg);
}

/// Summary line, then warnings, duplicates and per-row errors.
pub fn sync_report(report: &SyncReport) {
    let color = color_for_outcome(&report.outcome);
    println!("{}{}{}{}", color, BOLD, report.summary(), RESET);

    for w in &report.warnings {
        warning(w);
    }
    for d in &report.duplicates {
        warning(format!("duplicate: {d}"));
    }
    for e in &report.errors {
        error(e);
    }

    if report.dry_run && !report.change_logs.is_empty() {
        println!("{}{} change(s) rolled back{}", GREY, report.change_logs.len(), RESET);
    }
}
