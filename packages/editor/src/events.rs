//! Event-record sink for external sync layers
//!
//! The store never delivers events anywhere itself. An embedder registers a
//! sink and receives one record per create/update/delete, synchronously,
//! right after the row is written.

use instruct_model::EntityKind;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventOperation {
    Create,
    Update,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityEvent {
    pub kind: EntityKind,
    pub entity_id: String,
    pub operation: EventOperation,
    /// Full row after the operation (the removed row for deletes).
    pub row: Value,
    /// Field names touched by an update, in document naming.
    pub changed_fields: Option<Vec<String>>,
}

pub trait EventSink: Send + Sync {
    fn record(&self, event: EntityEvent);
}

impl<F> EventSink for F
where
    F: Fn(EntityEvent) + Send + Sync,
{
    fn record(&self, event: EntityEvent) {
        self(event)
    }
}

/// Names of the top-level fields that differ between two serialized rows.
pub(crate) fn changed_field_names(before: &Value, after: &Value) -> Vec<String> {
    match (before, after) {
        (Value::Object(old), Value::Object(new)) => new
            .iter()
            .filter(|(key, value)| old.get(*key) != Some(*value))
            .map(|(key, _)| key.clone())
            .chain(old.keys().filter(|key| !new.contains_key(*key)).cloned())
            .collect(),
        _ => Vec::new(),
    }
}
