use crate::cli::parser::Commands;
use crate::config::Config;
use crate::core::maintenance::reroute_tour_areas;
use crate::db::log::ttlog;
use crate::db::pool::DbPool;
use crate::errors::AppResult;
use crate::ui::messages;

pub fn handle(cmd: &Commands, cfg: &Config) -> AppResult<()> {
    let Commands::RerouteTours {
        update_existing,
        save_areas,
    } = cmd
    else {
        return Ok(());
    };

    let mut pool = DbPool::new(&cfg.database)?;
    let summary = pool.with_conn(|conn| reroute_tour_areas(conn, *update_existing, *save_areas))?;

    let message = format!(
        "Updated {} of {} tours with new areas",
        summary.changed, summary.considered
    );
    ttlog(
        &pool.conn,
        "reroute_tours",
        if *update_existing { "all" } else { "unrouted" },
        &message,
    )?;
    messages::success(message);
    if *save_areas {
        messages::info(format!("Saved learned locations on {} area(s)", summary.areas_saved));
    }
    Ok(())
}
