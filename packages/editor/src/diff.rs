//! # Snapshot Diff
//!
//! Rebuilds change tracking from scratch by comparing a live document with
//! the last-saved baseline. Used whenever the document is replaced wholesale
//! (undo/redo), so it carries no state between calls.
//!
//! Equality is value equality over the persisted projection of a row (see
//! [`crate::export::persisted_value`]): two rows are equal when everything
//! that would be sent to persistence is equal. Grouped id arrays are not
//! persisted and never make a row dirty on their own.

use instruct_model::{EntityKind, EntityRow, Instruction, KindVisitor};

use crate::change_tracker::{ChangeTracker, KindChanges};
use crate::export::persisted_value;

pub fn diff_documents(live: &Instruction, baseline: &Instruction) -> ChangeTracker {
    let mut tracker = ChangeTracker::new();

    tracker.set_instruction_changed(live.instruction != baseline.instruction);

    for kind in EntityKind::ALL {
        tracker.replace_kind(kind, kind.visit(DiffKind { live, baseline }));
    }

    tracker
}

struct DiffKind<'a> {
    live: &'a Instruction,
    baseline: &'a Instruction,
}

impl KindVisitor for DiffKind<'_> {
    type Output = KindChanges;

    fn visit<R: EntityRow>(self) -> KindChanges {
        let live = R::table(self.live);
        let baseline = R::table(self.baseline);
        let mut changes = KindChanges::default();

        for (id, row) in live {
            let dirty = match baseline.get(id) {
                None => true,
                Some(saved) => !rows_equal(row, saved),
            };
            if dirty {
                changes.changed.insert(id.clone());
            }
        }

        for id in baseline.keys() {
            if !live.contains_key(id) {
                changes.deleted.insert(id.clone());
            }
        }

        changes
    }
}

fn rows_equal<R: EntityRow>(a: &R, b: &R) -> bool {
    a == b || persisted_value(a) == persisted_value(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use instruct_model::{Assembly, Note, Step};

    fn baseline() -> Instruction {
        let mut doc = Instruction::default();
        doc.instruction.name = "Espresso".into();
        doc.assemblies.insert(
            "a1".into(),
            Assembly { id: "a1".into(), title: "Body".into(), ..Default::default() },
        );
        doc.notes.insert("n1".into(), Note { id: "n1".into(), text: "Hot".into(), ..Default::default() });
        doc
    }

    #[test]
    fn test_identical_documents_have_no_changes() {
        let doc = baseline();
        assert!(!diff_documents(&doc, &doc).has_changes());
    }

    #[test]
    fn test_detects_added_changed_and_deleted_rows() {
        let saved = baseline();
        let mut live = saved.clone();
        live.assemblies.get_mut("a1").unwrap().title = "Housing".into();
        live.notes.remove("n1");
        live.steps.insert("s1".into(), Step { id: "s1".into(), ..Default::default() });

        let tracker = diff_documents(&live, &saved);
        assert!(tracker.kind(EntityKind::Assembly).changed.contains("a1"));
        assert!(tracker.kind(EntityKind::Note).deleted.contains("n1"));
        assert!(tracker.kind(EntityKind::Step).changed.contains("s1"));
        assert!(!tracker.instruction_changed());
    }

    #[test]
    fn test_grouped_arrays_alone_are_not_a_change() {
        let saved = baseline();
        let mut live = saved.clone();
        live.assemblies.get_mut("a1").unwrap().step_ids.push("s9".into());

        let tracker = diff_documents(&live, &saved);
        assert!(tracker.kind(EntityKind::Assembly).changed.is_empty());
    }

    #[test]
    fn test_instruction_field_change() {
        let saved = baseline();
        let mut live = saved.clone();
        live.instruction.article_number = Some("KM-100".into());

        assert!(diff_documents(&live, &saved).instruction_changed());
    }
}
