//! Persisted document layout (collaborator-owned format).
//!
//! The document serializes to JSON with stable camelCase field names:
//! `{tracks:[{id,order,kind,elements:[{id,kind,startTime,duration,
//! trimIn,trimOut,properties,mediaRefId?}]}], fps, canvasWidth,
//! canvasHeight}`. Fields added after 1.0 carry serde defaults so
//! legacy files keep loading.

use std::path::{Path, PathBuf};

use clipforge_common::error::{ClipForgeError, ClipForgeResult};

use crate::document::TimelineDocument;

/// Abstraction over the persistence tier that owns project documents.
///
/// The core treats the store as fallible and possibly slow; it never
/// assumes a particular backing.
pub trait ProjectStore {
    fn load_document(&self, project_id: &str) -> ClipForgeResult<TimelineDocument>;
    fn save_document(&self, project_id: &str, doc: &TimelineDocument) -> ClipForgeResult<()>;
}

/// Store that keeps one `project.json` per project directory.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn document_path(&self, project_id: &str) -> PathBuf {
        self.root.join(project_id).join("project.json")
    }
}

impl ProjectStore for JsonFileStore {
    fn load_document(&self, project_id: &str) -> ClipForgeResult<TimelineDocument> {
        load_document(&self.document_path(project_id))
    }

    fn save_document(&self, project_id: &str, doc: &TimelineDocument) -> ClipForgeResult<()> {
        save_document(&self.document_path(project_id), doc)
    }
}

/// Load a document from a JSON file.
pub fn load_document(path: &Path) -> ClipForgeResult<TimelineDocument> {
    if !path.exists() {
        return Err(ClipForgeError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    let content = std::fs::read_to_string(path)?;
    let doc = serde_json::from_str(&content)
        .map_err(|e| ClipForgeError::project(format!("Failed to parse {}: {e}", path.display())))?;
    Ok(doc)
}

/// Save a document to a JSON file, creating parent directories.
pub fn save_document(path: &Path, doc: &TimelineDocument) -> ClipForgeResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(doc)?;
    std::fs::write(path, json)?;
    tracing::debug!(path = %path.display(), "Saved timeline document");
    Ok(())
}
