//! Shared handle to one editing session's store
//!
//! Mutations go through [`SharedStore::edit`], which publishes the store's
//! revision on a watch channel whenever the edit actually changed something.
//! The auto-save task subscribes to that channel.

use instruct_editor::InstructionStore;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

#[derive(Debug, Clone)]
pub struct SharedStore {
    inner: Arc<Mutex<InstructionStore>>,
    revisions: Arc<watch::Sender<u64>>,
}

impl SharedStore {
    pub fn new(store: InstructionStore) -> Self {
        let (tx, _rx) = watch::channel(store.revision());
        Self {
            inner: Arc::new(Mutex::new(store)),
            revisions: Arc::new(tx),
        }
    }

    /// Run a mutation and notify subscribers if the revision moved.
    pub fn edit<T>(&self, mutate: impl FnOnce(&mut InstructionStore) -> T) -> T {
        let (out, revision) = {
            let mut store = self.lock();
            let out = mutate(&mut store);
            (out, store.revision())
        };

        self.revisions.send_if_modified(|current| {
            if *current == revision {
                return false;
            }
            *current = revision;
            true
        });
        out
    }

    pub fn read<T>(&self, inspect: impl FnOnce(&InstructionStore) -> T) -> T {
        inspect(&self.lock())
    }

    /// Receiver that wakes on every published revision.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revisions.subscribe()
    }

    pub fn revision(&self) -> u64 {
        *self.revisions.borrow()
    }

    // Mutations are all-or-nothing; a poisoned lock is recovered.
    fn lock(&self) -> MutexGuard<'_, InstructionStore> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use instruct_model::Note;

    #[test]
    fn test_edit_publishes_only_effective_changes() {
        let shared = SharedStore::new(InstructionStore::new());
        let mut rx = shared.subscribe();

        let added = shared.edit(|store| store.add(Note { id: "n1".into(), ..Default::default() }));
        assert!(added);
        assert!(rx.has_changed().unwrap());
        let _ = rx.borrow_and_update();

        let updated = shared.edit(|store| store.update::<Note>("ghost", |n| n.text = "x".into()));
        assert!(!updated);
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn test_read_sees_edits() {
        let shared = SharedStore::new(InstructionStore::new());
        shared.edit(|store| store.add(Note { id: "n1".into(), ..Default::default() }));

        assert!(shared.read(|store| store.has_changes()));
        assert_eq!(shared.revision(), shared.read(|store| store.revision()));
    }
}
