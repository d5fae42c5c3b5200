pub mod export;
pub mod inspect;
pub mod validate;

use std::path::Path;
use std::sync::Arc;

use clipforge_timeline_model::{
    persist::load_document, MediaReference, MediaRegistry, TimelineDocument,
};

/// Load a project document plus its media manifest.
///
/// Media references live in a `media.json` sidecar next to
/// `project.json`; a missing sidecar just means an empty registry.
pub fn load_project(path: &Path) -> anyhow::Result<(TimelineDocument, Arc<MediaRegistry>)> {
    let doc = load_document(path).map_err(|e| anyhow::anyhow!("Failed to load project: {e}"))?;

    let registry = MediaRegistry::new();
    let manifest = path
        .parent()
        .map(|dir| dir.join("media.json"))
        .filter(|p| p.exists());
    if let Some(manifest) = manifest {
        let content = std::fs::read_to_string(&manifest)?;
        let references: Vec<MediaReference> = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse {}: {e}", manifest.display()))?;
        tracing::debug!(count = references.len(), "Loaded media manifest");
        for reference in references {
            registry.register(reference);
        }
    }

    Ok((doc, Arc::new(registry)))
}
