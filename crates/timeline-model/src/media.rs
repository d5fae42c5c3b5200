//! Media references and the lookup registry.
//!
//! The timeline never owns media bytes. Elements hold a [`MediaId`]
//! resolved through the [`MediaRegistry`], which is populated by the
//! storage collaborator at import time. Ids are content-derived, so
//! re-importing identical bytes yields the same id.

use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

/// Content-derived identifier for an imported media source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaId(String);

impl MediaId {
    /// Derive an id from source bytes (blake3 hex).
    pub fn from_content(bytes: &[u8]) -> Self {
        Self(blake3::hash(bytes).to_hex().to_string())
    }

    /// Wrap an already-derived id (e.g. read back from a document).
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MediaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What kind of content an element or media source carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Audio,
    Image,
    Text,
}

impl MediaKind {
    /// Whether the underlying source has an intrinsic duration that
    /// bounds trimming (video and audio do; stills and text do not).
    pub fn has_intrinsic_duration(self) -> bool {
        matches!(self, MediaKind::Video | MediaKind::Audio)
    }

    /// Whether this kind produces pixels on the canvas.
    pub fn is_visual(self) -> bool {
        matches!(self, MediaKind::Video | MediaKind::Image | MediaKind::Text)
    }
}

/// Decoded-source metadata for one imported media source.
///
/// Immutable once created; the registry owns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaReference {
    pub id: MediaId,
    pub kind: MediaKind,
    /// Intrinsic duration in seconds (0.0 for stills and text).
    pub duration_secs: f64,
    pub natural_width: u32,
    pub natural_height: u32,
    /// Opaque locator understood by the storage collaborator
    /// (typically a file path or storage key).
    pub source_handle: String,
}

impl MediaReference {
    /// Build a reference for imported bytes, deriving the id from content.
    pub fn from_content(
        bytes: &[u8],
        kind: MediaKind,
        duration_secs: f64,
        natural_width: u32,
        natural_height: u32,
        source_handle: impl Into<String>,
    ) -> Self {
        Self {
            id: MediaId::from_content(bytes),
            kind,
            duration_secs,
            natural_width,
            natural_height,
            source_handle: source_handle.into(),
        }
    }
}

/// Pure lookup table from media ids to their metadata.
///
/// Shared read-mostly across the model and the export engine; interior
/// locking keeps the registry `Sync` without forcing callers to wrap it.
#[derive(Debug, Default)]
pub struct MediaRegistry {
    refs: RwLock<HashMap<MediaId, MediaReference>>,
}

impl MediaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a reference, returning its id. Registering the same
    /// content twice is a no-op yielding the same id.
    pub fn register(&self, reference: MediaReference) -> MediaId {
        let id = reference.id.clone();
        self.refs
            .write()
            .expect("media registry lock poisoned")
            .insert(id.clone(), reference);
        id
    }

    pub fn get(&self, id: &MediaId) -> Option<MediaReference> {
        self.refs
            .read()
            .expect("media registry lock poisoned")
            .get(id)
            .cloned()
    }

    pub fn contains(&self, id: &MediaId) -> bool {
        self.refs
            .read()
            .expect("media registry lock poisoned")
            .contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.refs.read().expect("media registry lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
