//! ANSI color helpers for terminal output.

use crate::core::sync::SyncOutcome;
use crate::models::ChangeType;

pub const RESET: &str = "\x1b[0m";

pub const GREY: &str = "\x1b[90m";

pub const RED: &str = "\x1b[31m";
pub const GREEN: &str = "\x1b[32m";
pub const YELLOW: &str = "\x1b[33m";
pub const CYAN: &str = "\x1b[36m";
pub const MAGENTA: &str = "\x1b[35m";

/// Created rows green, deletions red, pushes magenta, the rest yellow.
pub fn color_for_change_type(change_type: ChangeType) -> &'static str {
    match change_type {
        t if t.is_push() => MAGENTA,
        ChangeType::Created | ChangeType::Undeleted => GREEN,
        ChangeType::Deleted => RED,
        _ => YELLOW,
    }
}

pub fn color_for_outcome(outcome: &SyncOutcome) -> &'static str {
    match outcome {
        SyncOutcome::Completed => GREEN,
        SyncOutcome::Aborted(_) => YELLOW,
        SyncOutcome::Failed(_) => RED,
    }
}

/// Wrap `value` in `color`, or in grey when it is empty.
pub fn colorize_optional(value: &str, color: &str) -> String {
    if value.trim().is_empty() || value.trim() == "-" {
        format!("{GREY}-{RESET}")
    } else {
        format!("{color}{value}{RESET}")
    }
}
