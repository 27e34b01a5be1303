//! Persistence boundary
//!
//! The editing core only ever hands a [`ChangeSet`] across this trait. Where
//! and how it is stored is the backend's business.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use instruct_editor::ChangeSet;
use instruct_model::Instruction;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("project not found: {0}")]
    NotFound(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed change-set: {0}")]
    Decode(String),

    #[error("{0} is not supported by this backend")]
    Unsupported(&'static str),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Outcome reported by the backend for one save call.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SaveResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SaveResult {
    pub fn ok() -> Self {
        Self { success: true, error: None }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self { success: false, error: Some(error.into()) }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectListItem {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub preview_image_id: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[async_trait]
pub trait PersistencePort: Send + Sync {
    async fn list_projects(&self) -> Result<Vec<ProjectListItem>, PersistenceError>;

    async fn get_project_data(&self, project_id: &str) -> Result<Instruction, PersistenceError>;

    /// Persist one change-set. A reported failure is `Ok` with
    /// `success == false`; `Err` is reserved for transport problems.
    async fn save_changes(
        &self,
        project_id: &str,
        changes: &ChangeSet,
    ) -> Result<SaveResult, PersistenceError>;

    /// Store an image for a part/tool; returns the stored media path.
    async fn upload_part_tool_image(
        &self,
        _project_id: &str,
        _part_tool_id: &str,
        _image: &[u8],
    ) -> Result<String, PersistenceError> {
        Err(PersistenceError::Unsupported("upload_part_tool_image"))
    }

    async fn upload_cover_image(
        &self,
        _project_id: &str,
        _image: &[u8],
    ) -> Result<String, PersistenceError> {
        Err(PersistenceError::Unsupported("upload_cover_image"))
    }

    /// URL a client can load a stored media path from.
    fn resolve_media_url(&self, project_id: &str, path: &str) -> String;
}
