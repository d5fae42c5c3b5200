//! Property test: any applied command sequence fully unwinds.
//!
//! For every sequence of accepted commands, undoing them all restores
//! the document to its initial state, field for field.

use std::sync::Arc;

use clipforge_timeline_model::{
    Command, ElementProperties, MediaKind, MediaReference, MediaRegistry, TimelineDocument,
    TimelineElement, TimelineModel, TimelineTrack, TrackKind,
};
use proptest::prelude::*;

/// A generatable edit, interpreted against the current document state.
#[derive(Debug, Clone)]
enum Edit {
    Add { start: f64, duration: f64 },
    Remove { pick: usize },
    Move { pick: usize, new_start: f64 },
    Trim { pick: usize, start: f64, duration: f64 },
    SetOpacity { pick: usize, opacity: f64 },
}

fn edit_strategy() -> impl Strategy<Value = Edit> {
    prop_oneof![
        (0.0..60.0f64, 0.5..10.0f64).prop_map(|(start, duration)| Edit::Add { start, duration }),
        any::<usize>().prop_map(|pick| Edit::Remove { pick }),
        (any::<usize>(), 0.0..60.0f64)
            .prop_map(|(pick, new_start)| Edit::Move { pick, new_start }),
        (any::<usize>(), 0.0..60.0f64, 0.5..10.0f64)
            .prop_map(|(pick, start, duration)| Edit::Trim { pick, start, duration }),
        (any::<usize>(), 0.0..1.0f64)
            .prop_map(|(pick, opacity)| Edit::SetOpacity { pick, opacity }),
    ]
}

fn interpret(
    edit: &Edit,
    doc: &TimelineDocument,
    track_a: &str,
    track_b: &str,
    media: &clipforge_timeline_model::MediaId,
) -> Option<Command> {
    let pick_element = |pick: usize| -> Option<(String, String)> {
        let all: Vec<(String, String)> = doc
            .tracks
            .iter()
            .flat_map(|t| t.elements.iter().map(|e| (t.id.clone(), e.id.clone())))
            .collect();
        if all.is_empty() {
            return None;
        }
        Some(all[pick % all.len()].clone())
    };

    match edit {
        Edit::Add { start, duration } => Some(Command::AddElement {
            track_id: track_a.to_string(),
            element: TimelineElement::new(MediaKind::Video, media.clone(), *start, *duration),
        }),
        Edit::Remove { pick } => {
            let (track_id, element_id) = pick_element(*pick)?;
            Some(Command::RemoveElement {
                track_id,
                element_id,
            })
        }
        Edit::Move { pick, new_start } => {
            let (track_id, element_id) = pick_element(*pick)?;
            let to_track_id = if track_id == track_a {
                track_b.to_string()
            } else {
                track_a.to_string()
            };
            Some(Command::MoveElement {
                track_id,
                element_id,
                to_track_id,
                new_start_time: *new_start,
            })
        }
        Edit::Trim {
            pick,
            start,
            duration,
        } => {
            let (track_id, element_id) = pick_element(*pick)?;
            Some(Command::TrimElement {
                track_id,
                element_id,
                start_time: *start,
                duration: *duration,
                trim_in: 0.0,
                trim_out: 0.0,
            })
        }
        Edit::SetOpacity { pick, opacity } => {
            let (track_id, element_id) = pick_element(*pick)?;
            Some(Command::SetElementProperties {
                track_id,
                element_id,
                properties: ElementProperties {
                    opacity: *opacity,
                    ..ElementProperties::default()
                },
            })
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn undo_all_restores_initial_document(edits in proptest::collection::vec(edit_strategy(), 1..24)) {
        let registry = Arc::new(MediaRegistry::new());
        let media = registry.register(MediaReference::from_content(
            b"clip", MediaKind::Video, 120.0, 1920, 1080, "clip.mp4",
        ));

        let mut doc = TimelineDocument::new(30, 1920, 1080);
        let track_a = TimelineTrack::new(TrackKind::Overlay, 0);
        let track_b = TimelineTrack::new(TrackKind::Overlay, 1);
        let (a_id, b_id) = (track_a.id.clone(), track_b.id.clone());
        doc.tracks.push(track_a);
        doc.tracks.push(track_b);

        let initial = doc.clone();
        let mut model = TimelineModel::new(doc, registry).unwrap();

        let mut applied = 0usize;
        for edit in &edits {
            let Some(command) = interpret(edit, model.document(), &a_id, &b_id, &media) else {
                continue;
            };
            if model.apply_command(command).is_ok() {
                applied += 1;
            }
        }

        for _ in 0..applied {
            prop_assert!(model.undo());
        }
        prop_assert!(!model.undo());
        prop_assert_eq!(model.document(), &initial);
    }
}
