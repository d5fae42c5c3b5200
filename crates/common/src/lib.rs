//! ClipForge Common Utilities
//!
//! Shared infrastructure for all ClipForge crates:
//! - Error types and result aliases
//! - Frame/time math used by the plan compiler and export engine
//! - Tracing/logging initialization
//! - Configuration loading

pub mod config;
pub mod error;
pub mod logging;
pub mod time;

pub use config::*;
pub use error::*;
pub use time::*;
