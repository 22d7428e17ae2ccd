use clap::{Parser, Subcommand, ValueEnum};

/// Command-line interface definition for rostersync
/// Reconciles areas, people and tour bookings from external sources into SQLite
#[derive(Parser)]
#[command(
    name = "rostersync",
    version = env!("CARGO_PKG_VERSION"),
    about = "Multi-source reconciliation of areas, people, rosters and tour bookings using SQLite",
    long_about = None
)]
pub struct Cli {
    /// Override database path (useful for tests or custom DB)
    #[arg(global = true, long = "db")]
    pub db: Option<String>,

    /// Run in test mode (no config file update)
    #[arg(global = true, long = "test", hide = true)]
    pub test: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database and configuration
    Init,

    /// Show the configuration file
    Config {
        /// Print the current configuration to stdout
        #[arg(long = "print", help = "Print the current configuration")]
        print_config: bool,
    },

    /// Manage the database (migrations, integrity checks, etc.)
    Db {
        #[arg(long = "migrate", help = "Run pending database migrations")]
        migrate: bool,

        #[arg(long = "check", help = "Check database integrity")]
        check: bool,

        #[arg(long = "vacuum", help = "Optimize the database using VACUUM")]
        vacuum: bool,

        #[arg(long = "info", help = "Show database information")]
        info: bool,
    },

    /// Reconcile one entity family from a JSON snapshot of the external source
    Sync {
        #[command(subcommand)]
        target: SyncTarget,
    },

    /// Print the most recent change log entries
    Log {
        #[arg(long, default_value_t = 20, help = "Number of entries to show")]
        limit: usize,

        #[arg(long, value_enum, help = "Only entries for this entity family")]
        model: Option<ModelArg>,

        #[arg(long, help = "Print entries as JSON")]
        json: bool,

        #[arg(long, help = "Show the internal run log instead of the change log")]
        runs: bool,
    },

    /// Record every field's current value as its automatic value
    ResetAutoValues {
        #[arg(
            long = "overwrite-existing",
            help = "Also replace automatic values that are already recorded"
        )]
        overwrite_existing: bool,
    },

    /// Route tours to areas again from their pickup locations
    RerouteTours {
        #[arg(long = "update-existing", help = "Also reroute tours that already have an area")]
        update_existing: bool,

        #[arg(long = "save-areas", help = "Save pickup locations learned from keywords")]
        save_areas: bool,
    },
}

#[derive(Subcommand)]
pub enum SyncTarget {
    /// Areas from an HR system export
    Areas {
        #[arg(long, value_name = "FILE")]
        file: String,

        #[arg(long = "dry-run", help = "Compute changes and roll them back")]
        dry_run: bool,
    },

    /// People from an HR system export
    People {
        #[arg(long, value_name = "FILE")]
        file: String,

        #[arg(long = "dry-run", help = "Compute changes and roll them back")]
        dry_run: bool,

        #[arg(long = "allow-add", help = "Create people with no local match")]
        allow_add: bool,

        #[arg(long = "match-only", help = "Link external ids without merging fields")]
        match_only: bool,

        #[arg(
            long = "disable-unlinked",
            help = "Deactivate name-matched people missing from the export"
        )]
        disable_unlinked: bool,
    },

    /// Tours and sessions from a booking source export
    Bookings {
        #[arg(long, value_enum)]
        source: BookingSourceArg,

        #[arg(long, value_name = "FILE")]
        file: String,

        #[arg(long, value_name = "YYYY-MM-DD", help = "First day of the range")]
        from: Option<String>,

        #[arg(long, value_name = "YYYY-MM-DD", help = "Last day of the range")]
        to: Option<String>,

        #[arg(long = "dry-run", help = "Compute changes and roll them back")]
        dry_run: bool,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum BookingSourceArg {
    A,
    B,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum ModelArg {
    Area,
    Person,
    Roster,
    Tour,
    Session,
}
