//! In-memory persistence backend
//!
//! Keeps whole documents per project and applies incoming change-sets to
//! them the way a server would. Every save call is recorded, and the backend
//! can be told to report failure for the next N saves.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use instruct_editor::{from_wire, ChangeSet, INSTRUCTION_KEY};
use instruct_model::{reconcile_child_lists, EntityKind, EntityRow, Instruction, KindVisitor};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};
use std::time::Duration;
use tracing::debug;

use crate::port::{PersistenceError, PersistencePort, ProjectListItem, SaveResult};

#[derive(Debug, Clone)]
pub struct SaveCall {
    pub project_id: String,
    pub changes: ChangeSet,
}

#[derive(Debug, Clone)]
struct StoredProject {
    document: Instruction,
    updated_at: DateTime<Utc>,
    media: BTreeMap<String, Vec<u8>>,
}

#[derive(Debug, Default)]
pub struct MemoryPersistence {
    projects: RwLock<BTreeMap<String, StoredProject>>,
    saves: Mutex<Vec<SaveCall>>,
    fail_next: AtomicUsize,
    latency: Option<Duration>,
}

fn lock_error(e: impl std::fmt::Display) -> PersistenceError {
    PersistenceError::Transport(format!("Lock: {}", e))
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: seed a project.
    pub fn with_project(self, project_id: impl Into<String>, document: Instruction) -> Self {
        if let Ok(mut projects) = self.projects.write() {
            projects.insert(
                project_id.into(),
                StoredProject { document, updated_at: Utc::now(), media: BTreeMap::new() },
            );
        }
        self
    }

    /// Builder: every save waits this long before answering.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Report failure for the next `count` saves.
    pub fn fail_next_saves(&self, count: usize) {
        self.fail_next.store(count, Ordering::SeqCst);
    }

    pub fn save_calls(&self) -> Vec<SaveCall> {
        self.saves.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    pub fn save_count(&self) -> usize {
        self.saves.lock().map(|calls| calls.len()).unwrap_or_default()
    }

    /// Current stored document for a project.
    pub fn project(&self, project_id: &str) -> Option<Instruction> {
        self.projects
            .read()
            .ok()?
            .get(project_id)
            .map(|project| project.document.clone())
    }

    pub fn media(&self, project_id: &str, path: &str) -> Option<Vec<u8>> {
        self.projects
            .read()
            .ok()?
            .get(project_id)?
            .media
            .get(path)
            .cloned()
    }

    fn take_failure(&self) -> bool {
        self.fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn store_media(&self, project_id: &str, path: String, image: &[u8]) -> Result<String, PersistenceError> {
        let mut projects = self.projects.write().map_err(lock_error)?;
        let project = projects
            .get_mut(project_id)
            .ok_or_else(|| PersistenceError::NotFound(project_id.to_string()))?;
        project.media.insert(path.clone(), image.to_vec());
        project.updated_at = Utc::now();
        Ok(path)
    }
}

#[async_trait]
impl PersistencePort for MemoryPersistence {
    async fn list_projects(&self) -> Result<Vec<ProjectListItem>, PersistenceError> {
        let projects = self.projects.read().map_err(lock_error)?;
        Ok(projects
            .iter()
            .map(|(id, project)| ProjectListItem {
                id: id.clone(),
                name: project.document.instruction.name.clone(),
                preview_image_id: project.document.instruction.preview_image_id.clone(),
                updated_at: project.updated_at,
            })
            .collect())
    }

    async fn get_project_data(&self, project_id: &str) -> Result<Instruction, PersistenceError> {
        self.project(project_id)
            .ok_or_else(|| PersistenceError::NotFound(project_id.to_string()))
    }

    async fn save_changes(
        &self,
        project_id: &str,
        changes: &ChangeSet,
    ) -> Result<SaveResult, PersistenceError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        self.saves.lock().map_err(lock_error)?.push(SaveCall {
            project_id: project_id.to_string(),
            changes: changes.clone(),
        });

        if self.take_failure() {
            return Ok(SaveResult::failed("simulated save failure"));
        }

        let mut projects = self.projects.write().map_err(lock_error)?;
        let project = projects
            .get_mut(project_id)
            .ok_or_else(|| PersistenceError::NotFound(project_id.to_string()))?;

        // Apply to a copy so a malformed change-set leaves the project untouched.
        let mut document = project.document.clone();
        apply_change_set(&mut document, changes)?;
        project.document = document;
        project.updated_at = Utc::now();

        debug!(project_id = %project_id, rows = changes.len(), "Applied change-set");
        Ok(SaveResult::ok())
    }

    async fn upload_part_tool_image(
        &self,
        project_id: &str,
        part_tool_id: &str,
        image: &[u8],
    ) -> Result<String, PersistenceError> {
        self.store_media(project_id, format!("part_tools/{}", part_tool_id), image)
    }

    async fn upload_cover_image(
        &self,
        project_id: &str,
        image: &[u8],
    ) -> Result<String, PersistenceError> {
        self.store_media(project_id, "cover".to_string(), image)
    }

    fn resolve_media_url(&self, project_id: &str, path: &str) -> String {
        format!("memory://{}/{}", project_id, path)
    }
}

/// Apply a wire change-set to a stored document.
///
/// Upserted rows keep the grouped id arrays of the row they replace; all
/// arrays are then reconciled against back-references.
pub fn apply_change_set(doc: &mut Instruction, changes: &ChangeSet) -> Result<(), PersistenceError> {
    for (key, ids) in &changes.deleted {
        let kind = key
            .strip_suffix("_ids")
            .and_then(EntityKind::from_wire_key)
            .ok_or_else(|| PersistenceError::Decode(format!("unknown deleted key {}", key)))?;
        kind.visit(RemoveRows { doc: &mut *doc, ids });
    }

    for (key, rows) in &changes.changed {
        if key == INSTRUCTION_KEY {
            if let Some(fields) = rows.last() {
                doc.instruction = serde_json::from_value(from_wire(fields.clone()))?;
            }
            continue;
        }

        let kind = EntityKind::from_wire_key(key)
            .ok_or_else(|| PersistenceError::Decode(format!("unknown kind {}", key)))?;
        kind.visit(UpsertRows { doc: &mut *doc, rows })?;
    }

    reconcile_child_lists(doc);
    Ok(())
}

struct RemoveRows<'a> {
    doc: &'a mut Instruction,
    ids: &'a [String],
}

impl KindVisitor for RemoveRows<'_> {
    type Output = ();

    fn visit<R: EntityRow>(self) {
        let table = R::table_mut(self.doc);
        for id in self.ids {
            table.remove(id);
        }
    }
}

struct UpsertRows<'a> {
    doc: &'a mut Instruction,
    rows: &'a [Value],
}

impl KindVisitor for UpsertRows<'_> {
    type Output = Result<(), PersistenceError>;

    fn visit<R: EntityRow>(self) -> Self::Output {
        for wire in self.rows {
            let mut value = from_wire(wire.clone());
            let id = value
                .get("id")
                .and_then(Value::as_str)
                .ok_or_else(|| PersistenceError::Decode(format!("{} row without id", R::KIND)))?
                .to_string();

            if let (Value::Object(fields), Some(existing)) = (&mut value, R::table(self.doc).get(&id)) {
                if let Value::Object(stored) = serde_json::to_value(existing)? {
                    for (key, ids) in stored {
                        if key.ends_with("Ids") && ids.is_array() {
                            fields.entry(key).or_insert(ids);
                        }
                    }
                }
            }

            let row: R = serde_json::from_value(value)?;
            R::table_mut(self.doc).insert(id, row);
        }
        Ok(())
    }
}
