use crate::core::provenance::{Provenance, RecordMeta, mutable_record};
use crate::models::entity::EntityKind;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct Person {
    pub meta: RecordMeta,
    pub first_name: Provenance<String>,
    pub last_name: Provenance<String>,
    pub active: Provenance<bool>,
    pub phone: Provenance<Option<String>>,
    pub email: Provenance<Option<String>>,
    pub display_name: Option<String>,
}

mutable_record!(Person, EntityKind::Person, [first_name, last_name, active, phone, email]);

impl Person {
    pub fn new(meta: RecordMeta, first_name: &str, last_name: &str, active: bool) -> Self {
        let source = meta.source;
        Self {
            meta,
            first_name: Provenance::observed(first_name.to_string(), source),
            last_name: Provenance::observed(last_name.to_string(), source),
            active: Provenance::observed(active, source),
            phone: Provenance::observed(None, source),
            email: Provenance::observed(None, source),
            display_name: None,
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.get(), self.last_name.get())
            .trim()
            .to_string()
    }

    /// Fallback identity: first word of the first name and last word of the
    /// last name, lowercased, joined by `_`.
    pub fn name_key(&self) -> String {
        name_key(self.first_name.get(), self.last_name.get())
    }
}

pub fn name_key(first_name: &str, last_name: &str) -> String {
    let first = first_name.to_lowercase();
    let last = last_name.to_lowercase();

    first
        .split_whitespace()
        .take(1)
        .chain(last.split_whitespace().last())
        .collect::<Vec<_>>()
        .join("_")
}

impl fmt::Display for Person {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.display_name {
            Some(d) if !d.is_empty() => write!(f, "{d}"),
            _ => write!(f, "{}", self.full_name()),
        }
    }
}
