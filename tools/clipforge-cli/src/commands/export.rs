//! Export a project to video through the ffmpeg backend.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use clipforge_common::config::{AppConfig, ExportFormat};
use clipforge_export_engine::{
    ExportBackend, ExportEngine, ExportJobRegistry, ExportRequest, FfmpegTranscoder, FileSink,
    JobOutcome, RegistryResolver,
};
use clipforge_plan_compiler::compile;

use super::load_project;

pub async fn run(
    path: PathBuf,
    output: Option<PathBuf>,
    format: String,
    fps: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
) -> anyhow::Result<()> {
    let (doc, media) = load_project(&path)?;
    doc.validate(&media)
        .map_err(|e| anyhow::anyhow!("Project failed validation: {e}"))?;

    let export_format = match format.as_str() {
        "mp4-h264" => ExportFormat::Mp4H264,
        "mp4-h265" => ExportFormat::Mp4H265,
        "webm" => ExportFormat::Webm,
        _ => {
            return Err(anyhow::anyhow!(
                "Unknown format: {format}. Use: mp4-h264, mp4-h265, webm"
            ));
        }
    };

    let mut settings = AppConfig::load().export;
    settings.format = export_format;
    settings.fps = fps.unwrap_or(doc.fps);
    settings.width = width.unwrap_or(doc.canvas_width);
    settings.height = height.unwrap_or(doc.canvas_height);

    let output_path = output.unwrap_or_else(|| {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "export".to_string());
        path.with_file_name(format!("{stem}.{}", settings.format.extension()))
    });

    let transcoder = FfmpegTranscoder::new();
    if !transcoder.is_available() {
        return Err(anyhow::anyhow!(
            "No supported transcoder found (expected ffmpeg in PATH)"
        ));
    }

    let plan = compile(&doc, &settings);
    println!("Exporting: {}", path.display());
    println!("  Output: {}", output_path.display());
    println!(
        "  {}x{} @ {} fps, {} frames, {} instructions",
        plan.canvas_width,
        plan.canvas_height,
        plan.fps,
        plan.output_duration_frames,
        plan.instructions.len()
    );

    let registry = Arc::new(ExportJobRegistry::new());
    let engine = ExportEngine::new(Arc::clone(&registry));
    let backend = ExportBackend {
        resolver: Arc::new(RegistryResolver::new(media)),
        decoder: Arc::new(transcoder),
        encoders: Arc::new(transcoder),
    };

    let mut handle = engine.start(ExportRequest {
        plan,
        settings,
        backend,
        sink: Box::new(FileSink::new(&output_path)),
    });

    // Ctrl-C requests cancellation; the job winds down through the
    // engine rather than being killed.
    let signal_registry = Arc::clone(&registry);
    let signal_job = handle.job_id.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nCancelling export...");
            signal_registry.cancel(&signal_job);
        }
    });

    while let Ok(event) = handle.events.recv().await {
        print!(
            "\r  {:?}: {:.1}% (ETA {:.0}s)   ",
            event.stage, event.percent, event.eta_secs
        );
        std::io::stdout().flush().ok();
    }
    println!();

    match handle.wait().await {
        JobOutcome::Succeeded { output } => {
            println!("Export complete: {}", output.display());
            Ok(())
        }
        JobOutcome::Failed(error) => Err(anyhow::anyhow!("Export failed: {error}")),
        JobOutcome::Cancelled => Err(anyhow::anyhow!("Export cancelled")),
    }
}
