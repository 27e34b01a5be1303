//! # Auto-Save Scheduler
//!
//! Debounced background saving for one editing session.
//!
//! ```text
//! edit ─▶ revision published ─▶ (re)start debounce timer
//!                                        │ quiet period elapsed
//!                                        ▼
//!                  has_changes? ─no─▶ idle
//!                       │ yes
//!                       ▼
//!        export change-set + snapshot ─▶ port.save_changes
//!                       │
//!          success ─▶ commit_saved     failure ─▶ keep tracked changes
//! ```
//!
//! - At most one save is in flight; a trigger arriving meanwhile is dropped
//! - Edits made during a save stay dirty and ride along with the next save
//! - Shutdown flushes outstanding changes and waits for the save

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::AutoSaveConfig;
use crate::port::PersistencePort;
use crate::shared::SharedStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    Failed(String),
    NothingToSave,
    SkippedInFlight,
}

/// Performs one save attempt at a time for a project.
struct Saver {
    store: SharedStore,
    port: Arc<dyn PersistencePort>,
    project_id: String,
    in_flight: AtomicBool,
}

/// Clears the in-flight flag when the save future finishes or is dropped.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Saver {
    async fn save(&self) -> SaveOutcome {
        if self.in_flight.swap(true, Ordering::AcqRel) {
            debug!(project_id = %self.project_id, "Save already in flight; dropping trigger");
            return SaveOutcome::SkippedInFlight;
        }
        let _guard = InFlight(&self.in_flight);

        let pending = self.store.read(|store| {
            store
                .has_changes()
                .then(|| (store.revision(), store.document().clone(), store.export_changes()))
        });
        let Some((revision, snapshot, changes)) = pending else {
            return SaveOutcome::NothingToSave;
        };

        debug!(project_id = %self.project_id, revision, rows = changes.len(), "Saving changes");

        match self.port.save_changes(&self.project_id, &changes).await {
            Ok(result) if result.success => {
                self.store.edit(|store| store.commit_saved(revision, snapshot));
                info!(project_id = %self.project_id, revision, "Saved changes");
                SaveOutcome::Saved
            }
            Ok(result) => {
                let error = result.error.unwrap_or_else(|| "unknown error".to_string());
                warn!(project_id = %self.project_id, error = %error, "Save rejected; keeping tracked changes");
                SaveOutcome::Failed(error)
            }
            Err(e) => {
                warn!(project_id = %self.project_id, error = %e, "Save failed; keeping tracked changes");
                SaveOutcome::Failed(e.to_string())
            }
        }
    }
}

pub struct AutoSaveScheduler;

impl AutoSaveScheduler {
    /// Start the background task for `project_id`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(
        store: SharedStore,
        port: Arc<dyn PersistencePort>,
        project_id: impl Into<String>,
        config: AutoSaveConfig,
    ) -> AutoSaveHandle {
        let revisions = store.subscribe();
        let saver = Arc::new(Saver {
            store,
            port,
            project_id: project_id.into(),
            in_flight: AtomicBool::new(false),
        });
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(run(Arc::clone(&saver), revisions, shutdown_rx, config));

        AutoSaveHandle { saver, shutdown_tx, task }
    }
}

async fn run(
    saver: Arc<Saver>,
    mut revisions: watch::Receiver<u64>,
    mut shutdown_rx: watch::Receiver<bool>,
    config: AutoSaveConfig,
) {
    info!(project_id = %saver.project_id, debounce_ms = config.debounce_ms, enabled = config.enabled, "Auto-save started");

    if !config.enabled {
        let _ = shutdown_rx.changed().await;
        info!(project_id = %saver.project_id, "Auto-save stopped");
        return;
    }

    let debounce = config.debounce();
    loop {
        tokio::select! {
            changed = revisions.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = shutdown_rx.changed() => break,
        }

        if !wait_for_quiet(&mut revisions, &mut shutdown_rx, debounce).await {
            break;
        }

        saver.save().await;
        // Edits made while the save was running do not schedule another one.
        let _ = revisions.borrow_and_update();
    }

    // Teardown flush.
    let outcome = saver.save().await;
    debug!(project_id = %saver.project_id, outcome = ?outcome, "Auto-save flushed");
    info!(project_id = %saver.project_id, "Auto-save stopped");
}

/// Wait until `debounce` passes without a new revision. Returns false when
/// shutdown was requested first.
async fn wait_for_quiet(
    revisions: &mut watch::Receiver<u64>,
    shutdown_rx: &mut watch::Receiver<bool>,
    debounce: Duration,
) -> bool {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(debounce) => return true,
            changed = revisions.changed() => {
                if changed.is_err() {
                    return false;
                }
            }
            _ = shutdown_rx.changed() => return false,
        }
    }
}

pub struct AutoSaveHandle {
    saver: Arc<Saver>,
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl AutoSaveHandle {
    /// Save immediately, subject to the in-flight guard.
    pub async fn save_now(&self) -> SaveOutcome {
        self.saver.save().await
    }

    pub fn is_saving(&self) -> bool {
        self.saver.in_flight.load(Ordering::Acquire)
    }

    /// Stop the task, flushing outstanding changes first.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.task.await {
            warn!(project_id = %self.saver.project_id, error = %e, "Auto-save task ended abnormally");
        }
    }
}
