//! Boundary-sweep compilation from document snapshots to render plans.

use std::collections::BTreeSet;

use clipforge_common::config::ExportSettings;
use clipforge_common::time::{duration_in_frames, first_frame_at_or_after, frame_to_secs, TimeRange};
use clipforge_timeline_model::{TimelineDocument, TimelineElement};

use crate::plan::{FrameRange, Instruction, Layer, RenderPlan};
use crate::transform::Transform;

/// Compile a timeline snapshot into a render plan.
///
/// Pure and deterministic: identical `(doc, settings)` inputs yield
/// byte-identical plans. The sweep runs in quantized frame space, so
/// instruction count is O(element timing boundaries).
pub fn compile(doc: &TimelineDocument, settings: &ExportSettings) -> RenderPlan {
    let fps = settings.fps.max(1);
    let output_duration_frames = duration_in_frames(doc.duration_secs(), fps);

    let mut plan = RenderPlan {
        output_duration_frames,
        fps,
        canvas_width: settings.width,
        canvas_height: settings.height,
        instructions: Vec::new(),
    };
    if output_duration_frames == 0 {
        return plan;
    }

    // Quantize every visible element onto the output frame grid.
    let mut quantized: Vec<QuantizedElement<'_>> = Vec::new();
    for track in doc.tracks_by_order() {
        if !track.is_visible {
            continue;
        }
        for element in &track.elements {
            let start_frame =
                first_frame_at_or_after(element.start_time, fps).min(output_duration_frames);
            let end_frame =
                first_frame_at_or_after(element.end_time(), fps).min(output_duration_frames);
            quantized.push(QuantizedElement {
                track_order: track.order,
                element,
                start_frame,
                end_frame,
            });
        }
    }
    quantized.sort_by(|a, b| {
        a.track_order
            .cmp(&b.track_order)
            .then(a.start_frame.cmp(&b.start_frame))
            .then_with(|| a.element.id.cmp(&b.element.id))
    });

    // Every element edge is a potential contributor-set change.
    let mut boundaries: BTreeSet<u64> = BTreeSet::from([0, output_duration_frames]);
    for q in &quantized {
        boundaries.insert(q.start_frame);
        boundaries.insert(q.end_frame);
    }

    let bounds: Vec<u64> = boundaries.into_iter().collect();
    let mut instructions = Vec::with_capacity(bounds.len().saturating_sub(1));
    for window in bounds.windows(2) {
        let (seg_start, seg_end) = (window[0], window[1]);
        if seg_end <= seg_start {
            continue;
        }
        let layers: Vec<Layer> = quantized
            .iter()
            .filter(|q| q.start_frame <= seg_start && seg_start < q.end_frame)
            .map(|q| make_layer(q, seg_start, seg_end, fps))
            .collect();
        instructions.push(Instruction {
            frames: FrameRange::new(seg_start, seg_end),
            layers,
        });
    }

    plan.instructions = coalesce_instructions(instructions);
    tracing::debug!(
        frames = plan.output_duration_frames,
        instructions = plan.instructions.len(),
        fps,
        "Compiled render plan"
    );
    plan
}

struct QuantizedElement<'a> {
    track_order: u32,
    element: &'a TimelineElement,
    start_frame: u64,
    end_frame: u64,
}

/// Map a segment's output frames back into source-local time:
/// `(frame_time - start_time) + trim_in`.
fn make_layer(q: &QuantizedElement<'_>, seg_start: u64, seg_end: u64, fps: u32) -> Layer {
    let element = q.element;
    let seg_start_secs = frame_to_secs(seg_start, fps);
    let seg_end_secs = frame_to_secs(seg_end, fps);
    let local_start = (seg_start_secs - element.start_time + element.trim_in).max(0.0);
    let local_end = local_start + (seg_end_secs - seg_start_secs);

    Layer {
        element_id: element.id.clone(),
        kind: element.kind,
        source: element.media_ref_id.clone(),
        source_time: TimeRange::new(local_start, local_end),
        track_order: q.track_order,
        transform: Transform::from_properties(&element.properties),
        text: element.properties.text.clone(),
    }
}

/// Merge adjacent instructions whose layer sets continue each other.
///
/// Applying this to an already-coalesced plan is a no-op, which is what
/// makes splitting at a frame boundary and re-coalescing restore the
/// original instruction set.
pub fn coalesce_instructions(instructions: Vec<Instruction>) -> Vec<Instruction> {
    let mut merged: Vec<Instruction> = Vec::with_capacity(instructions.len());
    for instruction in instructions {
        match merged.last_mut() {
            Some(last) if last.can_merge_with(&instruction) => last.merge(instruction),
            _ => merged.push(instruction),
        }
    }
    merged
}

/// Split the instruction containing `frame` at that frame boundary.
///
/// Frames already on an instruction edge (or out of range) leave the
/// plan unchanged.
pub fn split_at_frame(plan: &RenderPlan, frame: u64) -> RenderPlan {
    let mut result = plan.clone();
    let Some(index) = result
        .instructions
        .iter()
        .position(|i| i.frames.contains(frame) && frame > i.frames.start)
    else {
        return result;
    };

    let instruction = result.instructions.remove(index);
    let split_secs_offset =
        frame_to_secs(frame, plan.fps) - frame_to_secs(instruction.frames.start, plan.fps);

    let head_layers: Vec<Layer> = instruction
        .layers
        .iter()
        .map(|layer| Layer {
            source_time: TimeRange::new(
                layer.source_time.start_secs,
                layer.source_time.start_secs + split_secs_offset,
            ),
            ..layer.clone()
        })
        .collect();
    let tail_layers: Vec<Layer> = instruction
        .layers
        .iter()
        .map(|layer| Layer {
            source_time: TimeRange::new(
                layer.source_time.start_secs + split_secs_offset,
                layer.source_time.end_secs,
            ),
            ..layer.clone()
        })
        .collect();

    result.instructions.insert(
        index,
        Instruction {
            frames: FrameRange::new(instruction.frames.start, frame),
            layers: head_layers,
        },
    );
    result.instructions.insert(
        index + 1,
        Instruction {
            frames: FrameRange::new(frame, instruction.frames.end),
            layers: tail_layers,
        },
    );
    result
}
