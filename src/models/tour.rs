use crate::core::provenance::{Provenance, RecordMeta, mutable_record};
use crate::models::entity::EntityKind;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;

/// Bike type → count.
pub type Bikes = BTreeMap<String, i64>;

#[derive(Debug, Clone, PartialEq)]
pub struct Tour {
    pub meta: RecordMeta,
    pub time_start: Provenance<DateTime<Utc>>,
    pub time_end: Provenance<DateTime<Utc>>,
    pub tour_type: Provenance<String>,
    pub pickup_location: Provenance<String>,
    pub customer_name: Provenance<String>,
    pub customer_contact: Provenance<String>,
    pub quantity: Provenance<String>,
    pub bikes: Provenance<Bikes>,
    pub pax: Provenance<Option<i64>>,
    pub notes: Provenance<String>,
    pub tour_area_id: Provenance<Option<i64>>,
    pub session_id: Provenance<Option<i64>>,
}

mutable_record!(
    Tour,
    EntityKind::Tour,
    [
        time_start,
        time_end,
        tour_type,
        pickup_location,
        customer_name,
        customer_contact,
        quantity,
        bikes,
        pax,
        notes,
        tour_area_id,
        session_id,
    ]
);

impl Tour {
    pub fn new(
        meta: RecordMeta,
        tour_type: &str,
        time_start: DateTime<Utc>,
        time_end: DateTime<Utc>,
    ) -> Self {
        let s = meta.source;
        Self {
            meta,
            time_start: Provenance::observed(time_start, s),
            time_end: Provenance::observed(time_end, s),
            tour_type: Provenance::observed(tour_type.to_string(), s),
            pickup_location: Provenance::observed(String::new(), s),
            customer_name: Provenance::observed(String::new(), s),
            customer_contact: Provenance::observed(String::new(), s),
            quantity: Provenance::observed(String::new(), s),
            bikes: Provenance::observed(Bikes::new(), s),
            pax: Provenance::observed(None, s),
            notes: Provenance::observed(String::new(), s),
            tour_area_id: Provenance::observed(None, s),
            session_id: Provenance::observed(None, s),
        }
    }

    /// Same booked product, ignoring case and surrounding whitespace.
    pub fn same_type(&self, other: &Tour) -> bool {
        self.tour_type.get().trim().to_lowercase() == other.tour_type.get().trim().to_lowercase()
    }
}

impl fmt::Display for Tour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} ({})",
            self.time_start.get().format("%Y-%m-%d %H:%M"),
            self.tour_type.get(),
            self.customer_name.get().lines().next().unwrap_or_default()
        )
    }
}
