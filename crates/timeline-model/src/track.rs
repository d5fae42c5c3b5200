//! Timeline tracks: ordered containers of elements.

use serde::{Deserialize, Serialize};

use crate::element::TimelineElement;
use crate::ids::new_id;

/// Compositing role of a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Main,
    Overlay,
    Audio,
}

impl TrackKind {
    /// Exclusive tracks allow a single active element at any instant;
    /// overlapping elements are rejected at mutation time.
    pub fn is_exclusive(self) -> bool {
        matches!(self, TrackKind::Main)
    }
}

/// A track: ordered elements composited at a given depth.
///
/// `order` is a dense, unique integer controlling back-to-front
/// compositing (0 is the backmost track).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineTrack {
    pub id: String,

    pub order: u32,

    pub kind: TrackKind,

    /// Locked tracks reject element-level edits. Lock does not block
    /// structural track deletion.
    #[serde(default)]
    pub is_locked: bool,

    /// Hidden tracks contribute nothing to compiled render plans.
    #[serde(default = "default_visible")]
    pub is_visible: bool,

    #[serde(default)]
    pub elements: Vec<TimelineElement>,
}

fn default_visible() -> bool {
    true
}

impl TimelineTrack {
    pub fn new(kind: TrackKind, order: u32) -> Self {
        Self {
            id: new_id(),
            order,
            kind,
            is_locked: false,
            is_visible: true,
            elements: Vec::new(),
        }
    }

    pub fn element(&self, element_id: &str) -> Option<&TimelineElement> {
        self.elements.iter().find(|e| e.id == element_id)
    }

    pub fn element_mut(&mut self, element_id: &str) -> Option<&mut TimelineElement> {
        self.elements.iter_mut().find(|e| e.id == element_id)
    }

    /// For exclusive tracks: the first pair of overlapping elements,
    /// as `(element_id, other_element_id)`.
    pub fn first_overlap(&self) -> Option<(&TimelineElement, &TimelineElement)> {
        let mut sorted: Vec<&TimelineElement> = self.elements.iter().collect();
        sorted.sort_by(|a, b| {
            a.start_time
                .total_cmp(&b.start_time)
                .then_with(|| a.id.cmp(&b.id))
        });
        sorted
            .windows(2)
            .find(|pair| pair[0].overlaps(pair[1]))
            .map(|pair| (pair[1], pair[0]))
    }
}
