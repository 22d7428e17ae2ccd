//! Raw records of the two booking sources.

use super::SourceRecord;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One line of a booking source A day manifest: a single order item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestLine {
    pub order_number: String,
    /// Missing on data exported before order items were itemised.
    #[serde(default)]
    pub order_item_id: Option<String>,
    pub session_id: String,
    #[serde(default)]
    pub session_type: String,
    #[serde(default)]
    pub session_note: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub product: String,
    #[serde(default)]
    pub pickup_location: String,
    pub booking_name: String,
    #[serde(default)]
    pub participants: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub quantity: String,
    #[serde(default)]
    pub notes: Vec<String>,
}

impl ManifestLine {
    /// `order:item`, or the bare order number for non-itemised lines.
    pub fn tour_id(&self) -> String {
        match &self.order_item_id {
            Some(item) if !item.trim().is_empty() => {
                format!("{}:{}", self.order_number.trim(), item.trim())
            }
            _ => self.order_number.trim().to_string(),
        }
    }
}

impl SourceRecord for ManifestLine {
    fn record_date(&self) -> Option<NaiveDate> {
        Some(self.start.date_naive())
    }
}

/// One seat sold through booking source B.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub performance_id: String,
    pub event_title: String,
    pub performance_start: DateTime<Utc>,
    /// `Last, First`.
    pub customer_name: String,
    #[serde(default)]
    pub access_information: Option<String>,
}

impl Ticket {
    /// `Last, First` → `First Last`.
    pub fn customer_display_name(&self) -> String {
        self.customer_name
            .split(", ")
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl SourceRecord for Ticket {
    fn record_date(&self) -> Option<NaiveDate> {
        Some(self.performance_start.date_naive())
    }
}
