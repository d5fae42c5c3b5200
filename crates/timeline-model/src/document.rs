//! The timeline document: root aggregate of tracks and canvas settings.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::element::TimelineElement;
use crate::error::ValidationError;
use crate::media::MediaRegistry;
use crate::track::TimelineTrack;

/// The full description of an edit: tracks, elements, and output
/// canvas/fps settings.
///
/// All mutation goes through `TimelineModel` so a consistent snapshot
/// can always be taken. Field names are the persisted layout and must
/// stay backward compatible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineDocument {
    /// Schema version.
    #[serde(default = "default_version")]
    pub version: String,

    pub tracks: Vec<TimelineTrack>,

    /// Editing frame rate.
    pub fps: u32,

    pub canvas_width: u32,

    pub canvas_height: u32,
}

fn default_version() -> String {
    "1.0".to_string()
}

impl TimelineDocument {
    pub fn new(fps: u32, canvas_width: u32, canvas_height: u32) -> Self {
        Self {
            version: default_version(),
            tracks: Vec::new(),
            fps,
            canvas_width,
            canvas_height,
        }
    }

    /// Derived duration: the max effective end across all elements.
    pub fn duration_secs(&self) -> f64 {
        self.tracks
            .iter()
            .flat_map(|t| t.elements.iter())
            .map(TimelineElement::end_time)
            .fold(0.0, f64::max)
    }

    pub fn track(&self, track_id: &str) -> Option<&TimelineTrack> {
        self.tracks.iter().find(|t| t.id == track_id)
    }

    pub fn track_mut(&mut self, track_id: &str) -> Option<&mut TimelineTrack> {
        self.tracks.iter_mut().find(|t| t.id == track_id)
    }

    /// Tracks in back-to-front compositing order.
    pub fn tracks_by_order(&self) -> Vec<&TimelineTrack> {
        let mut tracks: Vec<&TimelineTrack> = self.tracks.iter().collect();
        tracks.sort_by_key(|t| t.order);
        tracks
    }

    /// Check every document-level invariant.
    ///
    /// The registry resolves media-backed elements so trim bounds can
    /// be checked against source durations.
    pub fn validate(&self, registry: &MediaRegistry) -> Result<(), ValidationError> {
        let mut track_ids = HashSet::new();
        let mut element_ids = HashSet::new();

        let mut orders: Vec<u32> = self.tracks.iter().map(|t| t.order).collect();
        orders.sort_unstable();
        for (expected, got) in orders.iter().enumerate() {
            if *got != expected as u32 {
                return Err(ValidationError::TrackOrderNotDense {
                    expected: expected as u32,
                    got: *got,
                });
            }
        }

        for track in &self.tracks {
            if !track_ids.insert(track.id.as_str()) {
                return Err(ValidationError::DuplicateTrack {
                    track_id: track.id.clone(),
                });
            }

            for element in &track.elements {
                if !element_ids.insert(element.id.as_str()) {
                    return Err(ValidationError::DuplicateElement {
                        element_id: element.id.clone(),
                    });
                }

                let media = match &element.media_ref_id {
                    Some(media_id) => {
                        let Some(reference) = registry.get(media_id) else {
                            return Err(ValidationError::UnknownMedia {
                                element_id: element.id.clone(),
                                media_id: media_id.to_string(),
                            });
                        };
                        Some(reference)
                    }
                    None => None,
                };
                element.validate(media.as_ref())?;
            }

            if track.kind.is_exclusive() {
                if let Some((element, other)) = track.first_overlap() {
                    return Err(ValidationError::ExclusiveOverlap {
                        track_id: track.id.clone(),
                        element_id: element.id.clone(),
                        other_element_id: other.id.clone(),
                    });
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{MediaKind, MediaReference};
    use crate::track::TrackKind;

    fn registry_with_video() -> (MediaRegistry, crate::media::MediaId) {
        let registry = MediaRegistry::new();
        let id = registry.register(MediaReference::from_content(
            b"clip", MediaKind::Video, 60.0, 1920, 1080, "clip.mp4",
        ));
        (registry, id)
    }

    #[test]
    fn test_empty_document_duration_is_zero() {
        let doc = TimelineDocument::new(30, 1920, 1080);
        assert_eq!(doc.duration_secs(), 0.0);
    }

    #[test]
    fn test_duration_is_max_end() {
        let (registry, media) = registry_with_video();
        let mut doc = TimelineDocument::new(30, 1920, 1080);
        let mut main = TimelineTrack::new(TrackKind::Main, 0);
        main.elements
            .push(TimelineElement::new(MediaKind::Video, media.clone(), 0.0, 10.0));
        let mut overlay = TimelineTrack::new(TrackKind::Overlay, 1);
        overlay
            .elements
            .push(TimelineElement::new(MediaKind::Video, media, 8.0, 4.0));
        doc.tracks.push(main);
        doc.tracks.push(overlay);

        assert!((doc.duration_secs() - 12.0).abs() < 1e-12);
        assert!(doc.validate(&registry).is_ok());
    }

    #[test]
    fn test_exclusive_overlap_rejected() {
        let (registry, media) = registry_with_video();
        let mut doc = TimelineDocument::new(30, 1920, 1080);
        let mut main = TimelineTrack::new(TrackKind::Main, 0);
        main.elements
            .push(TimelineElement::new(MediaKind::Video, media.clone(), 0.0, 5.0));
        main.elements
            .push(TimelineElement::new(MediaKind::Video, media, 3.0, 5.0));
        doc.tracks.push(main);

        assert!(matches!(
            doc.validate(&registry),
            Err(ValidationError::ExclusiveOverlap { .. })
        ));
    }

    #[test]
    fn test_overlay_overlap_allowed() {
        let (registry, media) = registry_with_video();
        let mut doc = TimelineDocument::new(30, 1920, 1080);
        let mut overlay = TimelineTrack::new(TrackKind::Overlay, 0);
        overlay
            .elements
            .push(TimelineElement::new(MediaKind::Video, media.clone(), 0.0, 5.0));
        overlay
            .elements
            .push(TimelineElement::new(MediaKind::Video, media, 3.0, 5.0));
        doc.tracks.push(overlay);

        assert!(doc.validate(&registry).is_ok());
    }

    #[test]
    fn test_non_dense_track_order_rejected() {
        let (registry, _media) = registry_with_video();
        let mut doc = TimelineDocument::new(30, 1920, 1080);
        doc.tracks.push(TimelineTrack::new(TrackKind::Main, 0));
        doc.tracks.push(TimelineTrack::new(TrackKind::Overlay, 2));

        assert!(matches!(
            doc.validate(&registry),
            Err(ValidationError::TrackOrderNotDense { expected: 1, got: 2 })
        ));
    }

    #[test]
    fn test_unknown_media_rejected() {
        let registry = MediaRegistry::new();
        let mut doc = TimelineDocument::new(30, 1920, 1080);
        let mut main = TimelineTrack::new(TrackKind::Main, 0);
        main.elements.push(TimelineElement::new(
            MediaKind::Video,
            crate::media::MediaId::from_content(b"unregistered"),
            0.0,
            5.0,
        ));
        doc.tracks.push(main);

        assert!(matches!(
            doc.validate(&registry),
            Err(ValidationError::UnknownMedia { .. })
        ));
    }
}
