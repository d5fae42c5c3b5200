//! The compiled, immutable render plan.

use clipforge_common::time::TimeRange;
use clipforge_timeline_model::{MediaId, MediaKind};
use serde::{Deserialize, Serialize};

use crate::transform::Transform;

/// A half-open range of output frame indices `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameRange {
    pub start: u64,
    pub end: u64,
}

impl FrameRange {
    pub fn new(start: u64, end: u64) -> Self {
        Self {
            start,
            end: end.max(start),
        }
    }

    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn contains(&self, frame: u64) -> bool {
        frame >= self.start && frame < self.end
    }
}

/// One contributing element within an instruction's frame range.
///
/// Layers are value types: they reference media by id and elements by
/// their id string, never the live timeline model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    /// Id of the originating timeline element.
    pub element_id: String,

    pub kind: MediaKind,

    /// Backing media; `None` for text layers.
    pub source: Option<MediaId>,

    /// Source-local time range to decode for this instruction.
    pub source_time: TimeRange,

    /// Back-to-front depth (the owning track's order).
    pub track_order: u32,

    pub transform: Transform,

    /// Text content for text layers.
    pub text: Option<String>,
}

/// One contiguous output frame range sharing the same contributing
/// layer set. Layers are ordered back-to-front.
///
/// An empty layer set renders as black/silent output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    pub frames: FrameRange,
    pub layers: Vec<Layer>,
}

impl Instruction {
    /// Whether `next` directly continues this instruction: contiguous
    /// frames and the same layers advancing continuously in source
    /// time.
    pub fn can_merge_with(&self, next: &Instruction) -> bool {
        if self.frames.end != next.frames.start {
            return false;
        }
        if self.layers.len() != next.layers.len() {
            return false;
        }
        self.layers.iter().zip(next.layers.iter()).all(|(a, b)| {
            a.element_id == b.element_id
                && a.kind == b.kind
                && a.source == b.source
                && a.track_order == b.track_order
                && a.transform == b.transform
                && a.text == b.text
                && (b.source_time.start_secs - a.source_time.end_secs).abs() < 1e-6
        })
    }

    /// Extend this instruction by absorbing `next` (callers must have
    /// checked [`Instruction::can_merge_with`]).
    pub fn merge(&mut self, next: Instruction) {
        self.frames.end = next.frames.end;
        for (layer, continuation) in self.layers.iter_mut().zip(next.layers) {
            layer.source_time.end_secs = continuation.source_time.end_secs;
        }
    }
}

/// The fully resolved, immutable output of the compiler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderPlan {
    pub output_duration_frames: u64,
    pub fps: u32,
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub instructions: Vec<Instruction>,
}

impl RenderPlan {
    /// Canonical serialized form, used to check byte-identical
    /// determinism.
    pub fn to_canonical_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("render plan serialization cannot fail")
    }

    /// Total frames covered by instructions (equals
    /// `output_duration_frames` for well-formed plans).
    pub fn covered_frames(&self) -> u64 {
        self.instructions.iter().map(|i| i.frames.len()).sum()
    }
}
