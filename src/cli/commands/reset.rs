use crate::cli::parser::Commands;
use crate::config::Config;
use crate::core::maintenance::reset_auto_values;
use crate::db::log::ttlog;
use crate::db::pool::DbPool;
use crate::errors::AppResult;
use crate::ui::messages;

pub fn handle(cmd: &Commands, cfg: &Config) -> AppResult<()> {
    if let Commands::ResetAutoValues { overwrite_existing } = cmd {
        let mut pool = DbPool::new(&cfg.database)?;
        let counts = pool.with_conn(|conn| reset_auto_values(conn, *overwrite_existing))?;

        let mut total = 0;
        for (kind, n) in &counts {
            println!("  {:<9} {:>6} row(s)", kind.table(), n);
            total += n;
        }

        ttlog(
            &pool.conn,
            "reset_auto_values",
            if *overwrite_existing { "overwrite" } else { "missing" },
            &format!("{total} row(s) updated"),
        )?;
        messages::success(format!("Auto values reset on {total} row(s)"));
    }
    Ok(())
}
