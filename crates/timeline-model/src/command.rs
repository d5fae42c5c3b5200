//! Invertible timeline mutations.
//!
//! Every user action is expressed as one [`Command`]. Applying a
//! command yields its inverse, which the history stack replays for
//! undo. The invariant `invert(apply(doc))` restores the document
//! field-for-field.
//!
//! Commands only perform structural checks (unknown ids, locked
//! tracks). Whole-document invariants are enforced by
//! `TimelineModel::apply_command`, which applies commands to a scratch
//! copy and commits only when validation passes.

use crate::document::TimelineDocument;
use crate::element::{ElementProperties, TimelineElement};
use crate::error::ValidationError;
use crate::track::TimelineTrack;

/// A single invertible mutation of the timeline document.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Insert a track at its `order` position; later tracks shift back.
    AddTrack { track: TimelineTrack },

    /// Delete a track and all of its elements. Succeeds even when the
    /// track is locked: lock blocks element edits, not structural
    /// deletion.
    RemoveTrack { track_id: String },

    AddElement {
        track_id: String,
        element: TimelineElement,
    },

    RemoveElement {
        track_id: String,
        element_id: String,
    },

    /// Remove-and-reinsert executed atomically, so a cross-track move
    /// is a single undo step.
    MoveElement {
        track_id: String,
        element_id: String,
        to_track_id: String,
        new_start_time: f64,
    },

    /// Retiming: placement and trim in one step.
    TrimElement {
        track_id: String,
        element_id: String,
        start_time: f64,
        duration: f64,
        trim_in: f64,
        trim_out: f64,
    },

    SetElementProperties {
        track_id: String,
        element_id: String,
        properties: ElementProperties,
    },

    SetTrackLocked { track_id: String, locked: bool },

    SetTrackVisible { track_id: String, visible: bool },

    /// Several commands applied in order as one history entry.
    Compound { commands: Vec<Command> },
}

impl Command {
    /// Apply to `doc`, returning the inverse command.
    ///
    /// On error the document may be partially mutated; callers must
    /// apply to a scratch copy (see `TimelineModel::apply_command`).
    pub fn apply(&self, doc: &mut TimelineDocument) -> Result<Command, ValidationError> {
        match self {
            Command::AddTrack { track } => {
                for existing in &mut doc.tracks {
                    if existing.order >= track.order {
                        existing.order += 1;
                    }
                }
                // Keep the vec sorted by order so remove/undo restores
                // the document field-for-field.
                let index = doc
                    .tracks
                    .iter()
                    .position(|t| t.order > track.order)
                    .unwrap_or(doc.tracks.len());
                doc.tracks.insert(index, track.clone());
                Ok(Command::RemoveTrack {
                    track_id: track.id.clone(),
                })
            }

            Command::RemoveTrack { track_id } => {
                let index = doc
                    .tracks
                    .iter()
                    .position(|t| t.id == *track_id)
                    .ok_or_else(|| ValidationError::UnknownTrack {
                        track_id: track_id.clone(),
                    })?;
                let removed = doc.tracks.remove(index);
                for track in &mut doc.tracks {
                    if track.order > removed.order {
                        track.order -= 1;
                    }
                }
                Ok(Command::AddTrack { track: removed })
            }

            Command::AddElement { track_id, element } => {
                let track = unlocked_track_mut(doc, track_id)?;
                track.elements.push(element.clone());
                sort_elements(track);
                Ok(Command::RemoveElement {
                    track_id: track_id.clone(),
                    element_id: element.id.clone(),
                })
            }

            Command::RemoveElement {
                track_id,
                element_id,
            } => {
                let track = unlocked_track_mut(doc, track_id)?;
                let index = track
                    .elements
                    .iter()
                    .position(|e| e.id == *element_id)
                    .ok_or_else(|| ValidationError::UnknownElement {
                        element_id: element_id.clone(),
                    })?;
                let removed = track.elements.remove(index);
                Ok(Command::AddElement {
                    track_id: track_id.clone(),
                    element: removed,
                })
            }

            Command::MoveElement {
                track_id,
                element_id,
                to_track_id,
                new_start_time,
            } => {
                // Check the destination before touching the source so a
                // locked destination leaves nothing half-moved.
                if to_track_id != track_id {
                    unlocked_track_mut(doc, to_track_id)?;
                }
                let source = unlocked_track_mut(doc, track_id)?;
                let index = source
                    .elements
                    .iter()
                    .position(|e| e.id == *element_id)
                    .ok_or_else(|| ValidationError::UnknownElement {
                        element_id: element_id.clone(),
                    })?;
                let mut element = source.elements.remove(index);
                let old_start = element.start_time;
                element.start_time = *new_start_time;

                let dest = unlocked_track_mut(doc, to_track_id)?;
                dest.elements.push(element);
                sort_elements(dest);

                Ok(Command::MoveElement {
                    track_id: to_track_id.clone(),
                    element_id: element_id.clone(),
                    to_track_id: track_id.clone(),
                    new_start_time: old_start,
                })
            }

            Command::TrimElement {
                track_id,
                element_id,
                start_time,
                duration,
                trim_in,
                trim_out,
            } => {
                let track = unlocked_track_mut(doc, track_id)?;
                let element = track.element_mut(element_id).ok_or_else(|| {
                    ValidationError::UnknownElement {
                        element_id: element_id.clone(),
                    }
                })?;
                let inverse = Command::TrimElement {
                    track_id: track_id.clone(),
                    element_id: element_id.clone(),
                    start_time: element.start_time,
                    duration: element.duration,
                    trim_in: element.trim_in,
                    trim_out: element.trim_out,
                };
                element.start_time = *start_time;
                element.duration = *duration;
                element.trim_in = *trim_in;
                element.trim_out = *trim_out;
                sort_elements(track);
                Ok(inverse)
            }

            Command::SetElementProperties {
                track_id,
                element_id,
                properties,
            } => {
                let track = unlocked_track_mut(doc, track_id)?;
                let element = track.element_mut(element_id).ok_or_else(|| {
                    ValidationError::UnknownElement {
                        element_id: element_id.clone(),
                    }
                })?;
                let inverse = Command::SetElementProperties {
                    track_id: track_id.clone(),
                    element_id: element_id.clone(),
                    properties: element.properties.clone(),
                };
                element.properties = properties.clone();
                Ok(inverse)
            }

            Command::SetTrackLocked { track_id, locked } => {
                let track =
                    doc.track_mut(track_id)
                        .ok_or_else(|| ValidationError::UnknownTrack {
                            track_id: track_id.clone(),
                        })?;
                let inverse = Command::SetTrackLocked {
                    track_id: track_id.clone(),
                    locked: track.is_locked,
                };
                track.is_locked = *locked;
                Ok(inverse)
            }

            Command::SetTrackVisible { track_id, visible } => {
                let track =
                    doc.track_mut(track_id)
                        .ok_or_else(|| ValidationError::UnknownTrack {
                            track_id: track_id.clone(),
                        })?;
                let inverse = Command::SetTrackVisible {
                    track_id: track_id.clone(),
                    visible: track.is_visible,
                };
                track.is_visible = *visible;
                Ok(inverse)
            }

            Command::Compound { commands } => {
                let mut inverses = Vec::with_capacity(commands.len());
                for command in commands {
                    inverses.push(command.apply(doc)?);
                }
                inverses.reverse();
                Ok(Command::Compound {
                    commands: inverses,
                })
            }
        }
    }
}

/// Element order within a track is canonical: sorted by start time,
/// then id. Every element mutation re-establishes it, so an inverse
/// command restores the document field-for-field.
fn sort_elements(track: &mut TimelineTrack) {
    track
        .elements
        .sort_by(|a, b| a.start_time.total_cmp(&b.start_time).then_with(|| a.id.cmp(&b.id)));
}

/// Resolve a track for an element-level edit, rejecting locked tracks.
fn unlocked_track_mut<'a>(
    doc: &'a mut TimelineDocument,
    track_id: &str,
) -> Result<&'a mut TimelineTrack, ValidationError> {
    let track = doc
        .track_mut(track_id)
        .ok_or_else(|| ValidationError::UnknownTrack {
            track_id: track_id.to_string(),
        })?;
    if track.is_locked {
        return Err(ValidationError::TrackLocked {
            track_id: track_id.to_string(),
        });
    }
    Ok(track)
}
