pub mod areas;
pub mod change_log;
pub mod initialize;
pub mod log;
pub mod migrate;
pub mod people;
pub mod pool;
pub mod record;
pub mod rosters;
pub mod sessions;
pub mod stats;
pub mod tours;
