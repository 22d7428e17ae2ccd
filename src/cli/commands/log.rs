use crate::cli::parser::{Commands, ModelArg};
use crate::config::Config;
use crate::db::pool::DbPool;
use crate::db::{change_log, log};
use crate::errors::AppResult;
use crate::models::EntityKind;
use crate::utils::colors::{CYAN, GREY, RESET, color_for_change_type, colorize_optional};
use ansi_term::Colour;

/// Color of an internal log operation
fn color_for_operation(op: &str) -> Colour {
    match op {
        "sync" => Colour::Green,
        "init" => Colour::RGB(255, 153, 51),
        "reset_auto_values" | "reroute_tours" => Colour::Yellow,
        "migration_applied" => Colour::Purple,
        _ => Colour::White,
    }
}

impl From<ModelArg> for EntityKind {
    fn from(m: ModelArg) -> Self {
        match m {
            ModelArg::Area => EntityKind::Area,
            ModelArg::Person => EntityKind::Person,
            ModelArg::Roster => EntityKind::Roster,
            ModelArg::Tour => EntityKind::Tour,
            ModelArg::Session => EntityKind::Session,
        }
    }
}

pub fn handle(cmd: &Commands, cfg: &Config) -> AppResult<()> {
    let Commands::Log {
        limit,
        model,
        json,
        runs,
    } = cmd
    else {
        return Ok(());
    };

    let pool = DbPool::new(&cfg.database)?;

    if *runs {
        let lines = log::load_recent(&pool.conn, *limit)?;
        if *json {
            println!("{}", serde_json::to_string_pretty(&lines)?);
            return Ok(());
        }
        for l in lines {
            let op = format!("{:<18}", l.operation);
            println!(
                "{}{:>5}{} {} {} {:<10} {}",
                GREY,
                l.id,
                RESET,
                l.date,
                color_for_operation(&l.operation).paint(op),
                l.target,
                l.message
            );
        }
        return Ok(());
    }

    let entries = change_log::load_recent(&pool.conn, *limit, model.map(EntityKind::from))?;

    if *json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("{}No change log entries.{}", GREY, RESET);
        return Ok(());
    }

    for e in &entries {
        let color = color_for_change_type(e.change_type);
        println!(
            "{}{:>5}{} {} {}{:<14}{} {:<8} {:<10} {}",
            GREY,
            e.id.unwrap_or_default(),
            RESET,
            e.timestamp.format("%Y-%m-%d %H:%M:%S"),
            color,
            e.change_type.to_db_str(),
            RESET,
            e.model_type.to_db_str(),
            e.source.to_db_str(),
            colorize_optional(e.source_row_id.as_deref().unwrap_or(""), CYAN),
        );
        println!("      {}", e.description.replace('\n', "\n      "));
    }
    Ok(())
}
