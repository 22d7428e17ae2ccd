//! Per-field provenance tracking.
//!
//! Every mutable field of a synced entity is wrapped in [`Provenance`], which
//! remembers the last value received from an automatic source. A field whose
//! current value has drifted from that remembered value was edited by a human
//! and automatic sources will no longer overwrite it.

use crate::errors::{AppError, AppResult};
use crate::models::change_log::{ChangeLog, ChangeType, FieldChange, changes_to_json, describe_changes};
use crate::models::entity::EntityKind;
use crate::models::source::{ChangeSource, SourceRowState};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::fmt;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Provenance<T> {
    value: T,
    auto: Option<T>,
}

impl<T: Clone + PartialEq> Provenance<T> {
    /// A value with no automatic history.
    pub fn new(value: T) -> Self {
        Self { value, auto: None }
    }

    /// A value as first observed from `source`.
    pub fn observed(value: T, source: ChangeSource) -> Self {
        let auto = source.is_automatic().then(|| value.clone());
        Self { value, auto }
    }

    pub fn restore(value: T, auto: Option<T>) -> Self {
        Self { value, auto }
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    pub fn auto_value(&self) -> Option<&T> {
        self.auto.as_ref()
    }

    pub fn set_auto(&mut self, auto: Option<T>) {
        self.auto = auto;
    }

    pub fn can_auto_update(&self) -> bool {
        match &self.auto {
            None => true,
            Some(auto) => *auto == self.value,
        }
    }

    pub fn is_user_edited(&self) -> bool {
        !self.can_auto_update()
    }

    /// Try to write `new_value`. Automatic sources only write while the field
    /// still holds its last automatic value, but always refresh that value.
    /// Returns whether the stored value changed.
    pub fn update(&mut self, new_value: T, source: ChangeSource) -> bool {
        let automatic = source.is_automatic();
        let mut changed = false;

        if (self.can_auto_update() || !automatic) && self.value != new_value {
            self.value = new_value.clone();
            changed = true;
        }

        if automatic {
            self.auto = Some(new_value);
        }

        changed
    }

    /// Write regardless of edit history.
    pub fn force(&mut self, new_value: T, source: ChangeSource) -> bool {
        let changed = self.value != new_value;
        if source.is_automatic() {
            self.auto = Some(new_value.clone());
        }
        self.value = new_value;
        changed
    }

    /// Record the current value as the automatic one. Without `overwrite`
    /// only fields with no automatic value are touched.
    pub fn pin_auto(&mut self, overwrite: bool) -> bool {
        if self.auto.is_some() && !overwrite {
            return false;
        }
        let pinned = Some(self.value.clone());
        if self.auto == pinned {
            return false;
        }
        self.auto = pinned;
        true
    }
}

impl<T: fmt::Display> fmt::Display for Provenance<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.value.fmt(f)
    }
}

pub fn json_value<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

/// Merge one field of `other` into `field`, recording the change if the
/// stored value moved.
pub fn merge_field<T>(
    changes: &mut Vec<FieldChange>,
    name: &'static str,
    field: &mut Provenance<T>,
    other: &Provenance<T>,
    source: ChangeSource,
) where
    T: Clone + PartialEq + Serialize,
{
    let before = json_value(field.get());
    if field.update(other.get().clone(), source) {
        changes.push(FieldChange::new(name, before, json_value(field.get())));
    }
}

/// The `field_auto_values` column: field name → last automatic value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AutoValues(Map<String, Value>);

impl AutoValues {
    pub fn parse(text: &str) -> AppResult<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        match serde_json::from_str::<Value>(text)? {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Ok(Self::default()),
            other => Err(AppError::Other(format!(
                "field_auto_values is not an object: {other}"
            ))),
        }
    }

    pub fn put<T>(&mut self, field: &str, value: &Provenance<T>)
    where
        T: Clone + PartialEq + Serialize,
    {
        if let Some(auto) = value.auto_value() {
            self.0.insert(field.to_string(), json_value(auto));
        }
    }

    pub fn get<T: DeserializeOwned>(&self, field: &str) -> Option<T> {
        let raw = self.0.get(field)?;
        match serde_json::from_value(raw.clone()) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(field, error = %e, "discarding unreadable auto value");
                None
            }
        }
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_json_string(&self) -> String {
        Value::Object(self.0.clone()).to_string()
    }
}

/// Structural columns shared by every synced entity.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecordMeta {
    pub id: Option<i64>,
    pub source: ChangeSource,
    pub source_row_id: Option<String>,
    pub source_row_state: Option<SourceRowState>,
    pub created: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
}

impl RecordMeta {
    /// A row as seen in an external source.
    pub fn observed(source: ChangeSource, source_row_id: impl Into<String>) -> Self {
        Self {
            source,
            source_row_id: Some(source_row_id.into()),
            source_row_state: Some(SourceRowState::Live),
            ..Self::default()
        }
    }

    /// A row created locally, not yet known remotely.
    pub fn pending(source: ChangeSource) -> Self {
        Self {
            source,
            source_row_state: Some(SourceRowState::Pending),
            ..Self::default()
        }
    }

    pub fn state_is(&self, state: SourceRowState) -> bool {
        self.source_row_state == Some(state)
    }

    fn state_str(&self) -> &'static str {
        self.source_row_state.map(|s| s.to_db_str()).unwrap_or("")
    }
}

/// Behaviour shared by Area, Person, Roster, Tour and Session.
///
/// Merging takes `&Self`, so a merge between two different entity kinds
/// cannot be expressed.
pub trait MutableRecord: Sized + fmt::Display {
    const KIND: EntityKind;
    const MUTABLE_FIELDS: &'static [&'static str];

    fn meta(&self) -> &RecordMeta;
    fn meta_mut(&mut self) -> &mut RecordMeta;

    /// Run [`Provenance::update`] for every mutable field.
    fn merge_fields(&mut self, other: &Self, source: ChangeSource) -> Vec<FieldChange>;
    fn auto_values(&self) -> AutoValues;
    fn restore_auto_values(&mut self, values: &AutoValues);
    fn pin_auto_values(&mut self, overwrite: bool) -> usize;

    fn describe(&self) -> String {
        let meta = self.meta();
        format!(
            "{} [pk={} source_row_id={}]",
            self,
            meta.id.map(|id| id.to_string()).unwrap_or_else(|| "-".into()),
            meta.source_row_id.as_deref().unwrap_or("-"),
        )
    }

    fn change_log(&self, change_type: ChangeType, description: impl Into<String>) -> ChangeLog {
        let meta = self.meta();
        ChangeLog::new(
            Self::KIND,
            self.describe(),
            meta.source,
            change_type,
            description,
        )
        .with_record(meta.id, meta.source_row_id.clone())
    }

    /// Merge `other` into `self`, adopt its source and force the row back to
    /// `live`. Returns a `changed` entry when anything moved.
    fn update_from_instance(&mut self, other: &Self) -> Option<ChangeLog> {
        let source = other.meta().source;
        self.meta_mut().source = source;

        let mut changes = self.merge_fields(other, source);

        if !self.meta().state_is(SourceRowState::Live) {
            warn!(
                model = %Self::KIND,
                id = ?self.meta().id,
                state = self.meta().state_str(),
                "update_from_instance: expected source_row_state=live"
            );
            changes.push(FieldChange::new(
                "source_row_state",
                Value::String(self.meta().state_str().to_string()),
                Value::String("live".into()),
            ));
            self.meta_mut().source_row_state = Some(SourceRowState::Live);
        }

        if changes.is_empty() {
            return None;
        }

        Some(
            self.change_log(
                ChangeType::Changed,
                format!("changed: {}", describe_changes(&changes)),
            )
            .with_data(changes_to_json(&changes)),
        )
    }

    /// Merge `other` into `self` without touching source or row state.
    fn merge_from(&mut self, other: &Self) -> Option<ChangeLog> {
        let changes = self.merge_fields(other, other.meta().source);
        if changes.is_empty() {
            return None;
        }
        Some(
            self.change_log(
                ChangeType::Changed,
                format!("changed: {}", describe_changes(&changes)),
            )
            .with_data(changes_to_json(&changes)),
        )
    }

    /// `self` is authoritative: bring the remote copy in line with it.
    /// Returns a `push_change` entry when the remote copy differs.
    fn mark_update_pushed(&self, remote: &mut Self) -> Option<ChangeLog> {
        let mut log = remote.update_from_instance(self)?;
        log.change_type = ChangeType::PushChange;
        log.model_description = self.describe();
        log.record_id = self.meta().id;
        Some(log)
    }

    fn mark_source_added(&mut self, push: bool) -> Option<ChangeLog> {
        let meta = self.meta();
        if meta.state_is(SourceRowState::Live) && meta.id.is_some() {
            return None;
        }

        let srid = meta.source_row_id.clone().unwrap_or_default();
        let pk = meta.id.map(|id| id.to_string()).unwrap_or_else(|| "-".into());

        let log = if meta.state_is(SourceRowState::Deleted) {
            warn!(model = %Self::KIND, id = ?meta.id, source_row_id = %srid, "row reappeared after deletion");
            let change_type = if push {
                ChangeType::PushRecreate
            } else {
                ChangeType::Undeleted
            };
            self.change_log(
                change_type,
                format!("source_row_id={srid} pk={pk} undeleted: {self}"),
            )
        } else {
            let change_type = if push {
                ChangeType::PushCreate
            } else {
                ChangeType::Created
            };
            self.change_log(
                change_type,
                format!("source_row_id={srid} pk={pk} created: {self}"),
            )
        };

        self.meta_mut().source_row_state = Some(SourceRowState::Live);
        Some(log)
    }

    fn mark_source_deleted(&mut self, push: bool) -> Option<ChangeLog> {
        if self.meta().state_is(SourceRowState::Deleted) {
            return None;
        }
        self.meta_mut().source_row_state = Some(SourceRowState::Deleted);

        let srid = self.meta().source_row_id.clone().unwrap_or_default();
        let pk = self
            .meta()
            .id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".into());
        let change_type = if push {
            ChangeType::PushDelete
        } else {
            ChangeType::Deleted
        };
        Some(self.change_log(
            change_type,
            format!("source_row_id={srid} pk={pk} not found: {self}"),
        ))
    }
}

/// Implements [`MutableRecord`] and the reconciler's `Comparable` for an
/// entity struct with a `meta: RecordMeta` field and one
/// `Provenance<_>` field per listed name.
macro_rules! mutable_record {
    ($ty:ty, $kind:expr, [$($field:ident),+ $(,)?]) => {
        impl $crate::core::provenance::MutableRecord for $ty {
            const KIND: $crate::models::entity::EntityKind = $kind;
            const MUTABLE_FIELDS: &'static [&'static str] = &[$(stringify!($field)),+];

            fn meta(&self) -> &$crate::core::provenance::RecordMeta {
                &self.meta
            }

            fn meta_mut(&mut self) -> &mut $crate::core::provenance::RecordMeta {
                &mut self.meta
            }

            fn merge_fields(
                &mut self,
                other: &Self,
                source: $crate::models::source::ChangeSource,
            ) -> Vec<$crate::models::change_log::FieldChange> {
                let mut changes = Vec::new();
                $(
                    $crate::core::provenance::merge_field(
                        &mut changes,
                        stringify!($field),
                        &mut self.$field,
                        &other.$field,
                        source,
                    );
                )+
                changes
            }

            fn auto_values(&self) -> $crate::core::provenance::AutoValues {
                let mut values = $crate::core::provenance::AutoValues::default();
                $( values.put(stringify!($field), &self.$field); )+
                values
            }

            fn restore_auto_values(&mut self, values: &$crate::core::provenance::AutoValues) {
                $( self.$field.set_auto(values.get(stringify!($field))); )+
            }

            fn pin_auto_values(&mut self, overwrite: bool) -> usize {
                let mut pinned = 0;
                $( if self.$field.pin_auto(overwrite) { pinned += 1; } )+
                pinned
            }
        }

        impl $crate::core::reconcile::Comparable for $ty {
            fn comparable_fields(&self) -> Vec<(&'static str, serde_json::Value)> {
                vec![
                    $( (stringify!($field), $crate::core::provenance::json_value(self.$field.get())), )+
                ]
            }
        }
    };
}

pub(crate) use mutable_record;
