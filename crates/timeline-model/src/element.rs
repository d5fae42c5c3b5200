//! Timeline elements: timed references to media or text on a track.

use clipforge_common::time::TimeRange;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::ids::new_id;
use crate::media::{MediaId, MediaKind, MediaReference};

/// A single timed reference to media or text placed on a track.
///
/// Field names are part of the persisted document layout and must stay
/// backward compatible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineElement {
    pub id: String,

    pub kind: MediaKind,

    /// Placement on the timeline, in seconds.
    pub start_time: f64,

    /// Visible duration on the timeline, in seconds.
    pub duration: f64,

    /// Seconds trimmed off the head of the source.
    #[serde(default)]
    pub trim_in: f64,

    /// Seconds trimmed off the tail of the source.
    #[serde(default)]
    pub trim_out: f64,

    #[serde(default)]
    pub properties: ElementProperties,

    /// Backing media, absent for pure text elements.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_ref_id: Option<MediaId>,
}

impl TimelineElement {
    /// Create a media-backed element with a fresh id.
    pub fn new(kind: MediaKind, media_ref_id: MediaId, start_time: f64, duration: f64) -> Self {
        Self {
            id: new_id(),
            kind,
            start_time,
            duration,
            trim_in: 0.0,
            trim_out: 0.0,
            properties: ElementProperties::default(),
            media_ref_id: Some(media_ref_id),
        }
    }

    /// Create a text element with a fresh id.
    pub fn text(content: impl Into<String>, start_time: f64, duration: f64) -> Self {
        Self {
            id: new_id(),
            kind: MediaKind::Text,
            start_time,
            duration,
            trim_in: 0.0,
            trim_out: 0.0,
            properties: ElementProperties {
                text: Some(content.into()),
                ..ElementProperties::default()
            },
            media_ref_id: None,
        }
    }

    /// Effective end on the timeline.
    pub fn end_time(&self) -> f64 {
        self.start_time + self.duration
    }

    /// Timeline interval covered by this element (half-open).
    pub fn time_range(&self) -> TimeRange {
        TimeRange::new(self.start_time, self.end_time())
    }

    /// Whether two elements occupy overlapping timeline intervals.
    pub fn overlaps(&self, other: &TimelineElement) -> bool {
        self.time_range().intersect(&other.time_range()).is_some()
    }

    /// Check element-local invariants against the resolved media.
    ///
    /// `media` is `None` for elements without a media reference.
    pub fn validate(&self, media: Option<&MediaReference>) -> Result<(), ValidationError> {
        if self.duration <= 0.0 {
            return Err(ValidationError::NonPositiveDuration {
                element_id: self.id.clone(),
                duration: self.duration,
            });
        }
        if self.start_time < 0.0 {
            return Err(ValidationError::NegativeStartTime {
                element_id: self.id.clone(),
                start_time: self.start_time,
            });
        }
        if self.trim_in < 0.0 || self.trim_out < 0.0 {
            return Err(ValidationError::NegativeTrim {
                element_id: self.id.clone(),
            });
        }

        match (self.kind, media) {
            (MediaKind::Text, _) => {}
            (kind, None) => {
                return Err(ValidationError::MissingMediaRef {
                    element_id: self.id.clone(),
                    kind: format!("{kind:?}").to_lowercase(),
                });
            }
            (kind, Some(reference)) if kind.has_intrinsic_duration() => {
                if self.trim_in + self.trim_out >= reference.duration_secs {
                    return Err(ValidationError::TrimExceedsSource {
                        element_id: self.id.clone(),
                        trim_in: self.trim_in,
                        trim_out: self.trim_out,
                        source_duration: reference.duration_secs,
                    });
                }
            }
            _ => {}
        }

        Ok(())
    }
}

/// Per-element transform and appearance data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementProperties {
    /// Uniform scale factor applied to the element on the canvas.
    #[serde(default = "default_scale")]
    pub scale: f64,

    /// Horizontal offset of the element center, normalized to canvas
    /// width (0.0 = centered).
    #[serde(default)]
    pub x: f64,

    /// Vertical offset of the element center, normalized to canvas
    /// height (0.0 = centered).
    #[serde(default)]
    pub y: f64,

    /// Opacity in `[0.0, 1.0]`.
    #[serde(default = "default_opacity")]
    pub opacity: f64,

    /// Optional source crop, normalized to the source frame.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crop: Option<CropRect>,

    /// Text content for text elements.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

fn default_scale() -> f64 {
    1.0
}

fn default_opacity() -> f64 {
    1.0
}

impl Default for ElementProperties {
    fn default() -> Self {
        Self {
            scale: 1.0,
            x: 0.0,
            y: 0.0,
            opacity: 1.0,
            crop: None,
            text: None,
        }
    }
}

/// A normalized source crop rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CropRect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}
