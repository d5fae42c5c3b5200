//! ClipForge Timeline Model
//!
//! Defines the core data contracts for ClipForge edits:
//! - **Media:** Content-addressed references to imported source media
//! - **Document:** Tracks containing ordered, timed elements plus
//!   canvas/fps settings; the root aggregate every mutation goes
//!   through so a consistent snapshot can always be taken
//! - **Commands:** Invertible mutations with bounded undo/redo history
//!
//! The model is synchronous and single-threaded relative to its caller.
//! Snapshots are `Arc`-shared immutable documents that are safe to hand
//! to the render-plan compiler while editing continues.

pub mod command;
pub mod document;
pub mod element;
pub mod error;
pub mod history;
pub mod ids;
pub mod media;
pub mod model;
pub mod persist;
pub mod track;

pub use command::*;
pub use document::*;
pub use element::*;
pub use error::*;
pub use media::*;
pub use model::*;
pub use track::*;
