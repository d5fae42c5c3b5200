//! Error types shared across ClipForge crates.

use std::path::PathBuf;

/// Top-level error type for ClipForge operations.
#[derive(Debug, thiserror::Error)]
pub enum ClipForgeError {
    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Source unavailable: {message}")]
    Source { message: String },

    #[error("Encode error: {message}")]
    Encode { message: String },

    #[error("Render error: {message}")]
    Render { message: String },

    #[error("Project error: {message}")]
    Project { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Unsupported operation: {message}")]
    Unsupported { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using ClipForgeError.
pub type ClipForgeResult<T> = Result<T, ClipForgeError>;

impl ClipForgeError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    pub fn source(msg: impl Into<String>) -> Self {
        Self::Source {
            message: msg.into(),
        }
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode {
            message: msg.into(),
        }
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render {
            message: msg.into(),
        }
    }

    pub fn project(msg: impl Into<String>) -> Self {
        Self::Project {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported {
            message: msg.into(),
        }
    }
}
