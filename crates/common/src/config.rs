//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory where projects are stored.
    pub projects_dir: PathBuf,

    /// Default export settings for new export jobs.
    pub export: ExportSettings,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Export configuration: output timing, geometry, and encoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportSettings {
    /// Output frame rate.
    pub fps: u32,

    /// Output width in pixels.
    pub width: u32,

    /// Output height in pixels.
    pub height: u32,

    /// Output container/codec.
    pub format: ExportFormat,

    /// Target video bitrate (kbit/s).
    pub video_bitrate_kbps: u32,

    /// Target audio bitrate (kbit/s).
    pub audio_bitrate_kbps: u32,
}

/// Supported export formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    Mp4H264,
    Mp4H265,
    Webm,
}

impl ExportFormat {
    /// File extension for this format.
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Mp4H264 | ExportFormat::Mp4H265 => "mp4",
            ExportFormat::Webm => "webm",
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "clipforge=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            projects_dir: dirs_default_projects(),
            export: ExportSettings::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            fps: 30,
            width: 1920,
            height: 1080,
            format: ExportFormat::Mp4H264,
            video_bitrate_kbps: 8000,
            audio_bitrate_kbps: 192,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match std::fs::read_to_string(&config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let config_path = config_file_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }
}

/// Standard config file location.
fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("clipforge").join("config.json")
}

/// Default projects directory.
fn dirs_default_projects() -> PathBuf {
    let base = std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local").join("share")
        });
    base.join("clipforge").join("projects")
}
