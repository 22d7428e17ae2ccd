use super::entity::EntityKind;
use super::source::ChangeSource;
use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Created,
    Changed,
    Deleted,
    Undeleted,
    PushCreate,
    PushChange,
    PushDelete,
    PushRecreate,
}

impl ChangeType {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            ChangeType::Created => "created",
            ChangeType::Changed => "changed",
            ChangeType::Deleted => "deleted",
            ChangeType::Undeleted => "undeleted",
            ChangeType::PushCreate => "push_create",
            ChangeType::PushChange => "push_change",
            ChangeType::PushDelete => "push_delete",
            ChangeType::PushRecreate => "push_recreate",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "created" => Some(ChangeType::Created),
            "changed" => Some(ChangeType::Changed),
            "deleted" => Some(ChangeType::Deleted),
            "undeleted" => Some(ChangeType::Undeleted),
            "push_create" => Some(ChangeType::PushCreate),
            "push_change" => Some(ChangeType::PushChange),
            "push_delete" => Some(ChangeType::PushDelete),
            "push_recreate" => Some(ChangeType::PushRecreate),
            _ => None,
        }
    }

    pub fn is_push(&self) -> bool {
        matches!(
            self,
            ChangeType::PushCreate
                | ChangeType::PushChange
                | ChangeType::PushDelete
                | ChangeType::PushRecreate
        )
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_str())
    }
}

impl ToSql for ChangeType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.to_db_str()))
    }
}

impl FromSql for ChangeType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        ChangeType::from_db_str(s).ok_or_else(|| {
            FromSqlError::Other(Box::new(crate::errors::AppError::InvalidChangeType(
                s.to_string(),
            )))
        })
    }
}

/// One field's before/after pair, values in their JSON form.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldChange {
    pub field: &'static str,
    pub before: Value,
    pub after: Value,
}

impl FieldChange {
    pub fn new(field: &'static str, before: Value, after: Value) -> Self {
        Self {
            field,
            before,
            after,
        }
    }
}

/// Render a list of field changes as `field: before --> after` lines.
pub fn describe_changes(changes: &[FieldChange]) -> String {
    changes
        .iter()
        .map(|c| format!("{}: {} --> {}", c.field, c.before, c.after))
        .collect::<Vec<_>>()
        .join("\n")
}

/// JSON object `{ field: [before, after] }` stored alongside the entry.
pub fn changes_to_json(changes: &[FieldChange]) -> Value {
    let mut map = Map::new();
    for c in changes {
        map.insert(c.field.to_string(), json!([c.before, c.after]));
    }
    Value::Object(map)
}

/// Immutable audit entry. Built only as a byproduct of a recognised
/// transition, appended to `change_log` and never updated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeLog {
    pub id: Option<i64>,
    pub model_type: EntityKind,
    pub record_id: Option<i64>,
    pub source_row_id: Option<String>,
    pub model_description: String,
    pub source: ChangeSource,
    pub change_type: ChangeType,
    pub description: String,
    pub data: Option<Value>,
    pub timestamp: DateTime<Utc>,
}

impl ChangeLog {
    pub fn new(
        model_type: EntityKind,
        model_description: impl Into<String>,
        source: ChangeSource,
        change_type: ChangeType,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            model_type,
            record_id: None,
            source_row_id: None,
            model_description: model_description.into(),
            source,
            change_type,
            description: description.into(),
            data: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_record(mut self, record_id: Option<i64>, source_row_id: Option<String>) -> Self {
        self.record_id = record_id;
        self.source_row_id = source_row_id;
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Attach the id assigned by the persistence layer after an insert.
    pub fn attach_record_id(&mut self, id: i64) {
        self.record_id = Some(id);
    }
}
