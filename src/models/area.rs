use crate::core::provenance::{Provenance, RecordMeta, mutable_record};
use crate::models::entity::EntityKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Pickup locations routed to an area. Stored as the `tour_locations` JSON column.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TourLocations {
    #[serde(rename = "pickup_locations_exact", default)]
    pub exact: Vec<String>,
    #[serde(rename = "pickup_locations_keyword", default)]
    pub keywords: Vec<String>,
}

impl TourLocations {
    /// Lowercased, trimmed exact locations.
    pub fn exact_normalized(&self) -> Vec<String> {
        self.exact.iter().map(|l| normalize_location(l)).collect()
    }

    pub fn keywords_normalized(&self) -> Vec<String> {
        self.keywords.iter().map(|l| normalize_location(l)).collect()
    }
}

pub fn normalize_location(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Operational area (an "operational unit" in the HR system).
#[derive(Debug, Clone, PartialEq)]
pub struct Area {
    pub meta: RecordMeta,
    pub area_name: Provenance<String>,
    pub colour: Provenance<Option<String>>,
    pub sort_order: Provenance<i64>,
    pub display_name: String,
    pub tour_locations: TourLocations,
    pub active: bool,
    pub sync_enabled: bool,
}

mutable_record!(Area, EntityKind::Area, [area_name, colour, sort_order]);

impl Area {
    pub fn new(meta: RecordMeta, area_name: &str, colour: Option<String>, sort_order: i64) -> Self {
        let source = meta.source;
        Self {
            meta,
            area_name: Provenance::observed(area_name.to_string(), source),
            colour: Provenance::observed(colour, source),
            sort_order: Provenance::observed(sort_order, source),
            display_name: String::new(),
            tour_locations: TourLocations::default(),
            active: true,
            sync_enabled: false,
        }
    }

    pub fn name(&self) -> &str {
        if self.display_name.is_empty() {
            self.area_name.get()
        } else {
            &self.display_name
        }
    }
}

impl fmt::Display for Area {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tour area: {}", self.name())
    }
}
