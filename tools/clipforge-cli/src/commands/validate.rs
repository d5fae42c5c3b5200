//! Validate a project document.

use std::path::PathBuf;

use super::load_project;

pub fn run(path: PathBuf) -> anyhow::Result<()> {
    println!("Validating project at: {}", path.display());

    let (doc, registry) = load_project(&path)?;

    let element_count: usize = doc.tracks.iter().map(|t| t.elements.len()).sum();
    println!("  Version: {}", doc.version);
    println!("  Canvas: {}x{} @ {} fps", doc.canvas_width, doc.canvas_height, doc.fps);
    println!("  Tracks: {}", doc.tracks.len());
    println!("  Elements: {}", element_count);
    println!("  Duration: {:.3}s", doc.duration_secs());
    println!("  Registered media: {}", registry.len());

    match doc.validate(&registry) {
        Ok(()) => {
            println!("\nProject is valid.");
            Ok(())
        }
        Err(error) => {
            println!("\nValidation failed:");
            println!("  - {error}");
            Err(anyhow::anyhow!("project failed validation"))
        }
    }
}
