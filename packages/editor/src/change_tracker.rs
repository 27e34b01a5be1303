//! # Change Tracker
//!
//! Dirty-state bookkeeping since the last successful save.
//!
//! One `{changed, deleted}` pair exists for every [`EntityKind`], plus a flag
//! for the singleton instruction fields. An id is never in both sets of the
//! same kind: deleting moves it out of `changed`, re-adding moves it out of
//! `deleted`.

use instruct_model::EntityKind;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KindChanges {
    pub changed: BTreeSet<String>,
    pub deleted: BTreeSet<String>,
}

impl KindChanges {
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.deleted.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeTracker {
    kinds: BTreeMap<EntityKind, KindChanges>,
    instruction_changed: bool,
}

impl ChangeTracker {
    pub fn new() -> Self {
        Self {
            kinds: EntityKind::ALL
                .iter()
                .map(|kind| (*kind, KindChanges::default()))
                .collect(),
            instruction_changed: false,
        }
    }

    pub fn mark_changed(&mut self, kind: EntityKind, id: &str) {
        let entry = self.kind_mut(kind);
        entry.deleted.remove(id);
        entry.changed.insert(id.to_string());
    }

    pub fn mark_deleted(&mut self, kind: EntityKind, id: &str) {
        let entry = self.kind_mut(kind);
        entry.changed.remove(id);
        entry.deleted.insert(id.to_string());
    }

    pub fn mark_instruction_changed(&mut self) {
        self.instruction_changed = true;
    }

    pub fn set_instruction_changed(&mut self, changed: bool) {
        self.instruction_changed = changed;
    }

    pub fn instruction_changed(&self) -> bool {
        self.instruction_changed
    }

    pub fn kind(&self, kind: EntityKind) -> &KindChanges {
        static EMPTY: KindChanges = KindChanges {
            changed: BTreeSet::new(),
            deleted: BTreeSet::new(),
        };
        self.kinds.get(&kind).unwrap_or(&EMPTY)
    }

    pub fn replace_kind(&mut self, kind: EntityKind, changes: KindChanges) {
        self.kinds.insert(kind, changes);
    }

    /// Kinds in [`EntityKind::ALL`] order.
    pub fn iter(&self) -> impl Iterator<Item = (EntityKind, &KindChanges)> {
        self.kinds.iter().map(|(kind, changes)| (*kind, changes))
    }

    pub fn has_changes(&self) -> bool {
        self.instruction_changed || self.kinds.values().any(|changes| !changes.is_empty())
    }

    /// Total number of dirty ids across every kind.
    pub fn dirty_count(&self) -> usize {
        self.kinds
            .values()
            .map(|c| c.changed.len() + c.deleted.len())
            .sum()
    }

    pub fn clear(&mut self) {
        for changes in self.kinds.values_mut() {
            changes.changed.clear();
            changes.deleted.clear();
        }
        self.instruction_changed = false;
    }

    fn kind_mut(&mut self, kind: EntityKind) -> &mut KindChanges {
        self.kinds.entry(kind).or_default()
    }
}

impl Default for ChangeTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_tracker_is_clean() {
        let tracker = ChangeTracker::new();
        assert!(!tracker.has_changes());
        assert_eq!(tracker.iter().count(), EntityKind::ALL.len());
    }

    #[test]
    fn test_delete_moves_id_out_of_changed() {
        let mut tracker = ChangeTracker::new();
        tracker.mark_changed(EntityKind::Step, "s1");
        tracker.mark_deleted(EntityKind::Step, "s1");

        let steps = tracker.kind(EntityKind::Step);
        assert!(steps.changed.is_empty());
        assert!(steps.deleted.contains("s1"));
    }

    #[test]
    fn test_readd_moves_id_out_of_deleted() {
        let mut tracker = ChangeTracker::new();
        tracker.mark_deleted(EntityKind::Note, "n1");
        tracker.mark_changed(EntityKind::Note, "n1");

        let notes = tracker.kind(EntityKind::Note);
        assert!(notes.changed.contains("n1"));
        assert!(notes.deleted.is_empty());
    }

    #[test]
    fn test_instruction_flag_counts_as_change() {
        let mut tracker = ChangeTracker::new();
        tracker.mark_instruction_changed();
        assert!(tracker.has_changes());

        tracker.clear();
        assert!(!tracker.has_changes());
        assert!(!tracker.instruction_changed());
    }

    #[test]
    fn test_marking_twice_is_idempotent() {
        let mut tracker = ChangeTracker::new();
        tracker.mark_changed(EntityKind::Substep, "ss1");
        tracker.mark_changed(EntityKind::Substep, "ss1");
        assert_eq!(tracker.dirty_count(), 1);
    }
}
