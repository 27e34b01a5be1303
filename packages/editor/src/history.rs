//! # Session History
//!
//! Undo/redo over full document snapshots for one editing session.
//!
//! ## Design
//!
//! - The caller captures a snapshot after every logical edit; capturing is
//!   not automatic
//! - Capturing pushes the previously observed document onto the undo stack
//!   and clears the redo stack
//! - Undo/redo swap whole documents through
//!   [`InstructionStore::restore_data`], which re-derives change tracking
//!   against the last-saved baseline
//! - The undo stack is bounded; the oldest snapshot falls off first
//!
//! ## Example
//!
//! ```rust,ignore
//! let mut history = SessionHistory::new(&store);
//!
//! store.update::<Step>("s1", |s| s.title = "Mount".into());
//! history.capture_snapshot(&store);
//!
//! history.undo(&mut store);
//! history.redo(&mut store);
//! ```

use instruct_model::Instruction;
use std::collections::VecDeque;

use crate::InstructionStore;

pub const DEFAULT_HISTORY_CAPACITY: usize = 20;

#[derive(Debug, Clone)]
pub struct SessionHistory {
    /// Earlier documents (most recent last)
    past: VecDeque<Instruction>,

    /// Undone documents (most recent last)
    future: Vec<Instruction>,

    /// Document as of the previous capture
    last_observed: Instruction,

    /// Maximum number of undo levels (0 = unlimited)
    capacity: usize,
}

impl SessionHistory {
    pub fn new(store: &InstructionStore) -> Self {
        Self::with_capacity(store, DEFAULT_HISTORY_CAPACITY)
    }

    pub fn with_capacity(store: &InstructionStore, capacity: usize) -> Self {
        Self {
            past: VecDeque::new(),
            future: Vec::new(),
            last_observed: store.document().clone(),
            capacity,
        }
    }

    /// Record the current document as a new undo point.
    pub fn capture_snapshot(&mut self, store: &InstructionStore) {
        let previous = std::mem::replace(&mut self.last_observed, store.document().clone());
        self.push_past(previous);
        self.future.clear();
    }

    pub fn undo(&mut self, store: &mut InstructionStore) -> bool {
        let Some(target) = self.past.pop_back() else {
            return false;
        };

        self.future.push(store.document().clone());
        self.last_observed = target.clone();
        store.restore_data(target);
        true
    }

    pub fn redo(&mut self, store: &mut InstructionStore) -> bool {
        let Some(target) = self.future.pop() else {
            return false;
        };

        self.push_past(store.document().clone());
        self.last_observed = target.clone();
        store.restore_data(target);
        true
    }

    /// Drop both stacks and start observing from the current document.
    pub fn reset(&mut self, store: &InstructionStore) {
        self.past.clear();
        self.future.clear();
        self.last_observed = store.document().clone();
    }

    pub fn can_undo(&self) -> bool {
        !self.past.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.future.is_empty()
    }

    pub fn undo_levels(&self) -> usize {
        self.past.len()
    }

    pub fn redo_levels(&self) -> usize {
        self.future.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn push_past(&mut self, snapshot: Instruction) {
        self.past.push_back(snapshot);

        if self.capacity > 0 && self.past.len() > self.capacity {
            self.past.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use instruct_model::Note;

    fn store() -> InstructionStore {
        let mut store = InstructionStore::new();
        store.add(Note { id: "n1".into(), text: "v0".into(), ..Default::default() });
        store.clear_changes();
        store
    }

    fn note_text(store: &InstructionStore) -> String {
        store.document().notes["n1"].text.clone()
    }

    #[test]
    fn test_history_creation() {
        let history = SessionHistory::new(&store());
        assert_eq!(history.undo_levels(), 0);
        assert_eq!(history.redo_levels(), 0);
        assert!(!history.can_undo());
        assert!(!history.can_redo());
        assert_eq!(history.capacity(), DEFAULT_HISTORY_CAPACITY);
    }

    #[test]
    fn test_undo_and_redo_text_edit() {
        let mut store = store();
        let mut history = SessionHistory::new(&store);

        store.update::<Note>("n1", |n| n.text = "v1".into());
        history.capture_snapshot(&store);

        assert!(history.undo(&mut store));
        assert_eq!(note_text(&store), "v0");
        assert!(!store.has_changes());

        assert!(history.redo(&mut store));
        assert_eq!(note_text(&store), "v1");
        assert!(store.has_changes());
    }

    #[test]
    fn test_empty_stacks_are_noops() {
        let mut store = store();
        let mut history = SessionHistory::new(&store);
        let revision = store.revision();

        assert!(!history.undo(&mut store));
        assert!(!history.redo(&mut store));
        assert_eq!(store.revision(), revision);
    }

    #[test]
    fn test_new_capture_clears_redo() {
        let mut store = store();
        let mut history = SessionHistory::new(&store);

        store.update::<Note>("n1", |n| n.text = "v1".into());
        history.capture_snapshot(&store);
        history.undo(&mut store);
        assert_eq!(history.redo_levels(), 1);

        store.update::<Note>("n1", |n| n.text = "branch".into());
        history.capture_snapshot(&store);
        assert_eq!(history.redo_levels(), 0);
    }

    #[test]
    fn test_capacity_enforced() {
        let mut store = store();
        let mut history = SessionHistory::with_capacity(&store, 2);

        for i in 1..=3 {
            store.update::<Note>("n1", |n| n.text = format!("v{}", i));
            history.capture_snapshot(&store);
        }

        assert_eq!(history.undo_levels(), 2);
        history.undo(&mut store);
        history.undo(&mut store);
        // v0 fell off the front.
        assert_eq!(note_text(&store), "v1");
    }

    #[test]
    fn test_reset_reseeds_from_current_document() {
        let mut store = store();
        let mut history = SessionHistory::new(&store);

        store.update::<Note>("n1", |n| n.text = "v1".into());
        history.capture_snapshot(&store);
        history.reset(&store);

        assert!(!history.can_undo());
        store.update::<Note>("n1", |n| n.text = "v2".into());
        history.capture_snapshot(&store);
        history.undo(&mut store);
        assert_eq!(note_text(&store), "v1");
    }
}
