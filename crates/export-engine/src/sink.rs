//! Artifact staging: exports never leave a partial file at the
//! destination.

use std::path::{Path, PathBuf};

use clipforge_common::error::{ClipForgeError, ClipForgeResult};

/// Where an export's output lands.
///
/// The engine writes to the staged path, then either commits (making
/// the artifact visible at the destination) or discards it. A
/// cancelled or failed job therefore never leaves a truncated file
/// where the caller expects a finished one.
pub trait ArtifactSink: Send {
    /// Path the encoder should write to.
    fn stage(&mut self) -> ClipForgeResult<PathBuf>;

    /// Promote the staged file to the destination.
    fn commit(self: Box<Self>) -> ClipForgeResult<PathBuf>;

    /// Drop the staged file, keeping the destination untouched.
    fn discard(self: Box<Self>);

    fn destination(&self) -> &Path;
}

/// Sink that stages next to the destination and renames on commit.
#[derive(Debug)]
pub struct FileSink {
    destination: PathBuf,
    staged: Option<PathBuf>,
}

impl FileSink {
    pub fn new(destination: impl Into<PathBuf>) -> Self {
        Self {
            destination: destination.into(),
            staged: None,
        }
    }

    fn staged_path(&self) -> PathBuf {
        let mut name = self
            .destination
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "export".to_string());
        name.push_str(".part");
        self.destination.with_file_name(name)
    }
}

impl ArtifactSink for FileSink {
    fn stage(&mut self) -> ClipForgeResult<PathBuf> {
        if let Some(parent) = self.destination.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let staged = self.staged_path();
        self.staged = Some(staged.clone());
        Ok(staged)
    }

    fn commit(self: Box<Self>) -> ClipForgeResult<PathBuf> {
        let staged = self.staged.ok_or_else(|| {
            ClipForgeError::render("commit called before any output was staged")
        })?;
        if !staged.exists() {
            return Err(ClipForgeError::FileNotFound { path: staged });
        }
        std::fs::rename(&staged, &self.destination)?;
        tracing::info!(path = %self.destination.display(), "Export artifact committed");
        Ok(self.destination)
    }

    fn discard(self: Box<Self>) {
        if let Some(staged) = self.staged {
            if staged.exists() {
                if let Err(err) = std::fs::remove_file(&staged) {
                    tracing::warn!(%err, path = %staged.display(), "Failed to remove staged file");
                }
            }
        }
    }

    fn destination(&self) -> &Path {
        &self.destination
    }
}
