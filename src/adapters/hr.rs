//! Raw records of the HR/roster system.

use super::SourceRecord;
use super::correlated::Correlated;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Operational unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteArea {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub colour: Option<String>,
    #[serde(default)]
    pub sort_order: i64,
    pub modified: DateTime<Utc>,
}

impl SourceRecord for RemoteArea {
    fn record_date(&self) -> Option<NaiveDate> {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteEmployee {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub mobile: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub modified: Option<DateTime<Utc>>,
}

impl RemoteEmployee {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

impl SourceRecord for RemoteEmployee {
    fn record_date(&self) -> Option<NaiveDate> {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteBreak {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub meal: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteRoster {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub employee_id: Option<String>,
    #[serde(default)]
    pub area_id: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub breaks: Vec<RemoteBreak>,
    #[serde(default)]
    pub meal_break_mins: i64,
    #[serde(default)]
    pub open_shift: bool,
    #[serde(default)]
    pub published: bool,
    /// Free-text shift comment. Also the scratch field for create correlation.
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub confirmed: bool,
    #[serde(default)]
    pub warning: String,
    /// Who created the shift remotely.
    #[serde(default)]
    pub creator_id: Option<String>,
    #[serde(default)]
    pub modified: Option<DateTime<Utc>>,
}

impl SourceRecord for RemoteRoster {
    fn record_date(&self) -> Option<NaiveDate> {
        Some(self.start.date_naive())
    }
}

impl Correlated for RemoteRoster {
    fn scratch(&self) -> &str {
        &self.comment
    }

    fn set_scratch(&mut self, value: String) {
        self.comment = value;
    }

    fn set_external_id(&mut self, id: &str) {
        self.id = Some(id.to_string());
    }
}
