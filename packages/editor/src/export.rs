//! # Change-Set Export
//!
//! Turns tracked dirty ids into the payload handed to the persistence port:
//!
//! ```text
//! {
//!   "changed": { "<kind>": [row, ...], "instruction": [fields] },
//!   "deleted": { "<kind>_ids": [id, ...] }
//! }
//! ```
//!
//! Rows are exported without their grouped id arrays (every array field whose
//! name ends in `Ids`), and every object key is converted to snake_case.

use instruct_model::{EntityRow, Instruction, KindVisitor};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::ChangeTracker;

/// Key of the pseudo-kind carrying the singleton instruction fields.
pub const INSTRUCTION_KEY: &str = "instruction";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeSet {
    pub changed: BTreeMap<String, Vec<Value>>,
    pub deleted: BTreeMap<String, Vec<String>>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.deleted.is_empty()
    }

    /// Number of rows and ids carried.
    pub fn len(&self) -> usize {
        self.changed.values().map(Vec::len).sum::<usize>()
            + self.deleted.values().map(Vec::len).sum::<usize>()
    }
}

/// Build the wire change-set for everything `tracker` marks dirty.
pub fn export_changes(doc: &Instruction, tracker: &ChangeTracker) -> ChangeSet {
    let mut change_set = ChangeSet::default();

    for (kind, changes) in tracker.iter() {
        if !changes.changed.is_empty() {
            let rows = kind.visit(ExportRows { doc, ids: &changes.changed });
            if !rows.is_empty() {
                change_set.changed.insert(kind.wire_key().to_string(), rows);
            }
        }

        if !changes.deleted.is_empty() {
            change_set.deleted.insert(
                format!("{}_ids", kind.wire_key()),
                changes.deleted.iter().cloned().collect(),
            );
        }
    }

    if tracker.instruction_changed() {
        change_set.changed.insert(
            INSTRUCTION_KEY.to_string(),
            vec![to_wire(persisted_value(&doc.instruction))],
        );
    }

    change_set
}

struct ExportRows<'a, I> {
    doc: &'a Instruction,
    ids: I,
}

impl<'a, I> KindVisitor for ExportRows<'a, I>
where
    I: IntoIterator<Item = &'a String>,
{
    type Output = Vec<Value>;

    fn visit<R: EntityRow>(self) -> Vec<Value> {
        let table = R::table(self.doc);
        self.ids
            .into_iter()
            .filter_map(|id| table.get(id))
            .map(|row| to_wire(persisted_value(row)))
            .collect()
    }
}

/// Row as persisted: serialized, minus grouped id arrays.
pub fn persisted_value<T: Serialize>(row: &T) -> Value {
    let mut value = serde_json::to_value(row).unwrap_or(Value::Null);
    if let Value::Object(fields) = &mut value {
        fields.retain(|key, field| !(key.ends_with("Ids") && field.is_array()));
    }
    value
}

/// Recursively rename object keys to snake_case.
pub fn to_wire(value: Value) -> Value {
    match value {
        Value::Object(fields) => Value::Object(
            fields
                .into_iter()
                .map(|(key, field)| (to_snake_case(&key), to_wire(field)))
                .collect::<Map<String, Value>>(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(to_wire).collect()),
        other => other,
    }
}

/// Inverse of [`to_wire`]: rename object keys back to camelCase.
pub fn from_wire(value: Value) -> Value {
    match value {
        Value::Object(fields) => Value::Object(
            fields
                .into_iter()
                .map(|(key, field)| (to_camel_case(&key), from_wire(field)))
                .collect::<Map<String, Value>>(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(from_wire).collect()),
        other => other,
    }
}

pub fn to_camel_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut upper = false;
    for ch in key.chars() {
        if ch == '_' {
            upper = !out.is_empty();
        } else if upper {
            out.push(ch.to_ascii_uppercase());
            upper = false;
        } else {
            out.push(ch);
        }
    }
    out
}

pub fn to_snake_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for (i, ch) in key.chars().enumerate() {
        if ch.is_ascii_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use instruct_model::{EntityKind, Step, Substep};
    use serde_json::json;

    #[test]
    fn test_snake_case_conversion() {
        assert_eq!(to_snake_case("stepOrder"), "step_order");
        assert_eq!(to_snake_case("videoFrameAreaId"), "video_frame_area_id");
        assert_eq!(to_snake_case("id"), "id");
        assert_eq!(to_camel_case("video_frame_area_id"), "videoFrameAreaId");
        assert_eq!(to_camel_case("x"), "x");
    }

    #[test]
    fn test_to_wire_renames_nested_keys() {
        let value = json!({ "strokeWidth": 2, "points": [{ "startX": 1 }] });
        assert_eq!(
            to_wire(value),
            json!({ "stroke_width": 2, "points": [{ "start_x": 1 }] })
        );
    }

    #[test]
    fn test_export_strips_grouped_ids() {
        let mut doc = Instruction::default();
        doc.substeps.insert(
            "ss1".into(),
            Substep {
                id: "ss1".into(),
                step_id: Some("s1".into()),
                step_order: 1,
                image_row_ids: vec!["img1".into()],
                ..Default::default()
            },
        );

        let mut tracker = ChangeTracker::new();
        tracker.mark_changed(EntityKind::Substep, "ss1");

        let change_set = export_changes(&doc, &tracker);
        let row = &change_set.changed["substeps"][0];
        assert_eq!(row["step_id"], "s1");
        assert_eq!(row["step_order"], 1);
        assert!(row.get("image_row_ids").is_none());
        assert!(row.get("imageRowIds").is_none());
    }

    #[test]
    fn test_export_lists_deleted_ids_and_instruction() {
        let mut doc = Instruction::default();
        doc.instruction.name = "Grinder".into();
        doc.steps.insert("s2".into(), Step { id: "s2".into(), ..Default::default() });

        let mut tracker = ChangeTracker::new();
        tracker.mark_deleted(EntityKind::Step, "s1");
        tracker.mark_changed(EntityKind::Step, "s2");
        tracker.mark_instruction_changed();

        let change_set = export_changes(&doc, &tracker);
        assert_eq!(change_set.deleted["steps_ids"], vec!["s1".to_string()]);
        assert_eq!(change_set.changed["steps"].len(), 1);
        assert_eq!(change_set.changed[INSTRUCTION_KEY][0]["name"], "Grinder");
        assert_eq!(change_set.len(), 3);
    }

    #[test]
    fn test_clean_tracker_exports_nothing() {
        let change_set = export_changes(&Instruction::default(), &ChangeTracker::new());
        assert!(change_set.is_empty());
    }
}
