use crate::errors::{AppError, AppResult};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: String,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub hr: HrConfig,
    #[serde(default)]
    pub booking_b: BookingBConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_days_behind")]
    pub scan_days_behind: u64,
    #[serde(default = "default_days_ahead")]
    pub scan_days_ahead: u64,
    #[serde(default)]
    pub allow_add_people: bool,
    #[serde(default)]
    pub disable_unlinked_people: bool,
    #[serde(default)]
    pub push_areas: bool,
    #[serde(default)]
    pub push_rosters: bool,
}

fn default_days_behind() -> u64 {
    7
}
fn default_days_ahead() -> u64 {
    60
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            scan_days_behind: default_days_behind(),
            scan_days_ahead: default_days_ahead(),
            allow_add_people: false,
            disable_unlinked_people: false,
            push_areas: false,
            push_rosters: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HrConfig {
    /// Creator id stamped on shifts made by this integration. Remote shifts
    /// with another creator are never touched.
    #[serde(default)]
    pub integration_creator_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDetails {
    pub duration_mins: i64,
    pub pickup_location: String,
}

/// Booking source B only reports a start time and an event title; duration
/// and pickup come from here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingBConfig {
    #[serde(default = "default_event_duration")]
    pub default_duration_mins: i64,
    #[serde(default)]
    pub default_pickup_location: String,
    #[serde(default)]
    pub tour_type_prefix: String,
    #[serde(default)]
    pub events: BTreeMap<String, EventDetails>,
}

fn default_event_duration() -> i64 {
    60
}

impl Default for BookingBConfig {
    fn default() -> Self {
        Self {
            default_duration_mins: default_event_duration(),
            default_pickup_location: String::new(),
            tour_type_prefix: String::new(),
            events: BTreeMap::new(),
        }
    }
}

impl BookingBConfig {
    pub fn duration_for(&self, event_title: &str) -> Duration {
        let mins = self
            .events
            .get(event_title)
            .map(|e| e.duration_mins)
            .unwrap_or(self.default_duration_mins);
        Duration::minutes(mins)
    }

    pub fn pickup_for(&self, event_title: &str) -> &str {
        self.events
            .get(event_title)
            .map(|e| e.pickup_location.as_str())
            .unwrap_or(&self.default_pickup_location)
    }

    pub fn tour_type_for(&self, event_title: &str) -> String {
        if self.tour_type_prefix.is_empty() {
            event_title.to_string()
        } else {
            format!("{} {}", self.tour_type_prefix, event_title)
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: Self::database_file().to_string_lossy().to_string(),
            sync: SyncConfig::default(),
            hr: HrConfig::default(),
            booking_b: BookingBConfig::default(),
        }
    }
}

impl Config {
    /// Return the standard configuration directory
    pub fn config_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".rostersync")
    }

    /// Return the full path of the config file
    pub fn config_file() -> PathBuf {
        Self::config_dir().join("rostersync.conf")
    }

    /// Return the full path of the SQLite database
    pub fn database_file() -> PathBuf {
        Self::config_dir().join("rostersync.sqlite")
    }

    /// Load configuration from file, or return defaults if not found
    pub fn load() -> AppResult<Self> {
        Self::load_from(&Self::config_file())
    }

    pub fn load_from(path: &Path) -> AppResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        serde_yaml::from_str(&content)
            .map_err(|e| AppError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Create the config directory, the configuration file (unless `is_test`)
    /// and an empty database file. Returns the database path.
    pub fn init_all(custom_db: Option<&str>, is_test: bool) -> AppResult<PathBuf> {
        let dir = Self::config_dir();

        let db_path = match custom_db {
            Some(name) => {
                let p = Path::new(name);
                if p.is_absolute() {
                    p.to_path_buf()
                } else {
                    dir.join(p)
                }
            }
            None => Self::database_file(),
        };

        if !is_test {
            fs::create_dir_all(&dir)?;
            let config = Config {
                database: db_path.to_string_lossy().to_string(),
                ..Config::default()
            };
            let yaml = serde_yaml::to_string(&config)?;
            let mut file = fs::File::create(Self::config_file())?;
            file.write_all(yaml.as_bytes())?;
        }

        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        if !db_path.exists() {
            fs::File::create(&db_path)?;
        }

        Ok(db_path)
    }
}
