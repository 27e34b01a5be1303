//! # Editing Session
//!
//! One user's session on one project: the shared store, its undo history
//! and the auto-save task, opened and closed together.

use instruct_editor::{InstructionStore, SessionHistory};
use std::sync::Arc;
use tracing::info;

use crate::autosave::{AutoSaveHandle, AutoSaveScheduler, SaveOutcome};
use crate::config::SessionConfig;
use crate::port::{PersistenceError, PersistencePort};
use crate::shared::SharedStore;

pub struct EditingSession {
    /// Project being edited
    pub project_id: String,

    store: SharedStore,
    history: SessionHistory,
    autosave: AutoSaveHandle,
}

impl EditingSession {
    /// Fetch the project from `port` and start auto-saving it.
    pub async fn open(
        port: Arc<dyn PersistencePort>,
        project_id: &str,
        config: &SessionConfig,
    ) -> Result<Self, PersistenceError> {
        let document = port.get_project_data(project_id).await?;
        info!(project_id = %project_id, rows = document.row_count(), "Opened project");

        let store = InstructionStore::with_document(document);
        let history = SessionHistory::with_capacity(&store, config.history.capacity);
        let store = SharedStore::new(store);
        let autosave =
            AutoSaveScheduler::spawn(store.clone(), port, project_id, config.auto_save.clone());

        Ok(Self {
            project_id: project_id.to_string(),
            store,
            history,
            autosave,
        })
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn history(&self) -> &SessionHistory {
        &self.history
    }

    /// Run one logical edit and record an undo point if it changed anything.
    pub fn apply<T>(&mut self, edit: impl FnOnce(&mut InstructionStore) -> T) -> T {
        let before = self.store.revision();
        let out = self.store.edit(edit);
        if self.store.revision() != before {
            let history = &mut self.history;
            self.store.read(|store| history.capture_snapshot(store));
        }
        out
    }

    pub fn undo(&mut self) -> bool {
        let history = &mut self.history;
        self.store.edit(|store| history.undo(store))
    }

    pub fn redo(&mut self) -> bool {
        let history = &mut self.history;
        self.store.edit(|store| history.redo(store))
    }

    /// Close a transient editing context: later undo stops here.
    pub fn reset_history(&mut self) {
        let history = &mut self.history;
        self.store.read(|store| history.reset(store));
    }

    pub async fn save_now(&self) -> SaveOutcome {
        self.autosave.save_now().await
    }

    /// Flush outstanding changes and stop auto-saving.
    pub async fn close(self) {
        self.autosave.shutdown().await;
        info!(project_id = %self.project_id, "Closed project");
    }
}
