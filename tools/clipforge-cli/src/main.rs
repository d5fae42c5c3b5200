//! ClipForge CLI: thin wrapper over the timeline model, plan
//! compiler, and export engine.
//!
//! Usage:
//!   clipforge validate <PROJECT>   Check document invariants
//!   clipforge inspect <PROJECT>    Compile and summarize a render plan
//!   clipforge export <PROJECT>     Export a project to video

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "clipforge",
    about = "Timeline editing and export for ClipForge projects",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a project document against all timeline invariants
    Validate {
        /// Path to project.json
        path: PathBuf,
    },

    /// Compile a render plan and print an instruction summary
    Inspect {
        /// Path to project.json
        path: PathBuf,

        /// Output frame rate
        #[arg(long, default_value = "30")]
        fps: u32,

        /// Output width
        #[arg(long, default_value = "1920")]
        width: u32,

        /// Output height
        #[arg(long, default_value = "1080")]
        height: u32,
    },

    /// Export a project to video (Ctrl-C cancels the job)
    Export {
        /// Path to project.json
        path: PathBuf,

        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format: mp4-h264, mp4-h265, webm
        #[arg(long, default_value = "mp4-h264")]
        format: String,

        /// Output frame rate (defaults to the document's fps)
        #[arg(long)]
        fps: Option<u32>,

        /// Output width (defaults to the document's canvas)
        #[arg(long)]
        width: Option<u32>,

        /// Output height (defaults to the document's canvas)
        #[arg(long)]
        height: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    clipforge_common::logging::init_logging(&clipforge_common::config::LoggingConfig {
        level: log_level.to_string(),
        json: false,
        file: None,
    });

    match cli.command {
        Commands::Validate { path } => commands::validate::run(path),
        Commands::Inspect {
            path,
            fps,
            width,
            height,
        } => commands::inspect::run(path, fps, width, height),
        Commands::Export {
            path,
            output,
            format,
            fps,
            width,
            height,
        } => commands::export::run(path, output, format, fps, width, height).await,
    }
}
