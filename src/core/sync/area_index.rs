//! Pickup location → area routing, rebuilt at the start of every booking run.

use crate::models::Area;
use crate::models::area::normalize_location;
use std::collections::{BTreeMap, HashMap};
use tracing::info;

#[derive(Debug, Clone, Default)]
pub struct AreaIndex {
    exact: HashMap<String, i64>,
    keywords: Vec<(String, i64)>,
    default_area: Option<i64>,
    /// Locations resolved through a keyword this run, per area id.
    learned: BTreeMap<i64, Vec<String>>,
}

impl AreaIndex {
    /// Index the active, saved areas. The default area is the one with the
    /// lowest `sort_order`.
    pub fn build(areas: &[Area]) -> Self {
        let mut index = Self::default();
        let mut default_order = i64::MAX;

        for area in areas.iter().filter(|a| a.active) {
            let Some(id) = area.meta.id else { continue };

            for loc in area.tour_locations.exact_normalized() {
                index.exact.entry(loc).or_insert(id);
            }
            for kw in area.tour_locations.keywords_normalized() {
                if !kw.is_empty() {
                    index.keywords.push((kw, id));
                }
            }
            if *area.sort_order.get() < default_order {
                default_order = *area.sort_order.get();
                index.default_area = Some(id);
            }
        }
        index
    }

    /// Exact location, then keyword substring, then the default area.
    pub fn resolve(&mut self, pickup_location: &str) -> Option<i64> {
        let needle = normalize_location(pickup_location);
        if let Some(&id) = self.exact.get(&needle) {
            return Some(id);
        }

        let hit = self
            .keywords
            .iter()
            .find(|(kw, _)| needle.contains(kw.as_str()))
            .map(|&(_, id)| id);
        if let Some(id) = hit {
            if !needle.is_empty() {
                self.exact.insert(needle.clone(), id);
                self.learned.entry(id).or_default().push(needle);
            }
            return Some(id);
        }

        self.default_area
    }

    pub fn learned(&self) -> &BTreeMap<i64, Vec<String>> {
        &self.learned
    }

    /// Append learned locations to each area's exact list. Returns the ids
    /// of the areas that changed.
    pub fn apply_learned(&self, areas: &mut [Area]) -> Vec<i64> {
        let mut touched = Vec::new();
        for area in areas.iter_mut() {
            let Some(id) = area.meta.id else { continue };
            let Some(locations) = self.learned.get(&id) else { continue };

            let known = area.tour_locations.exact_normalized();
            let mut changed = false;
            for loc in locations {
                if !known.contains(loc) && !area.tour_locations.exact.contains(loc) {
                    info!(area = %area.name(), location = %loc, "learned pickup location");
                    area.tour_locations.exact.push(loc.clone());
                    changed = true;
                }
            }
            if changed {
                touched.push(id);
            }
        }
        touched
    }
}
