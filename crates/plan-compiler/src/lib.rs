//! ClipForge Render Plan Compiler
//!
//! Pure, deterministic compilation from an immutable timeline snapshot
//! plus export settings to a [`RenderPlan`]: an ordered sequence of
//! composition instructions with no remaining ambiguity.
//!
//! The compiler never touches the clock, the environment, or any
//! mutable state; identical inputs always produce byte-identical
//! plans. Instruction count is bounded by the number of element timing
//! boundaries, not by frame count, which keeps plans small for long
//! timelines.

pub mod compile;
pub mod plan;
pub mod transform;

pub use compile::*;
pub use plan::*;
pub use transform::*;
