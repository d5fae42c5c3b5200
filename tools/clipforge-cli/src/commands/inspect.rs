//! Compile and summarize a render plan without exporting.

use std::path::PathBuf;

use clipforge_common::config::ExportSettings;
use clipforge_plan_compiler::compile;

use super::load_project;

pub fn run(path: PathBuf, fps: u32, width: u32, height: u32) -> anyhow::Result<()> {
    let (doc, _registry) = load_project(&path)?;

    let settings = ExportSettings {
        fps,
        width,
        height,
        ..ExportSettings::default()
    };
    let plan = compile(&doc, &settings);

    println!("Render plan for: {}", path.display());
    println!(
        "  Output: {}x{} @ {} fps, {} frames ({:.3}s)",
        plan.canvas_width,
        plan.canvas_height,
        plan.fps,
        plan.output_duration_frames,
        plan.output_duration_frames as f64 / f64::from(plan.fps.max(1)),
    );
    println!("  Instructions: {}", plan.instructions.len());

    for (index, instruction) in plan.instructions.iter().enumerate() {
        let label = match instruction.layers.len() {
            0 => "black".to_string(),
            1 => "1 layer".to_string(),
            n => format!("{n} layers"),
        };
        println!(
            "  [{index}] frames {}..{} ({label})",
            instruction.frames.start, instruction.frames.end
        );
    }

    Ok(())
}
