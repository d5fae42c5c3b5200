//! Validation errors for timeline mutations.

/// Why a timeline mutation was rejected.
///
/// Returned synchronously by `TimelineModel::apply_command`; the
/// document is never left half-applied when one of these surfaces.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("element {element_id}: duration must be positive (got {duration})")]
    NonPositiveDuration { element_id: String, duration: f64 },

    #[error("element {element_id}: start time must be >= 0 (got {start_time})")]
    NegativeStartTime { element_id: String, start_time: f64 },

    #[error("element {element_id}: trim values must be >= 0")]
    NegativeTrim { element_id: String },

    #[error(
        "element {element_id}: trimIn {trim_in} + trimOut {trim_out} \
         must be less than source duration {source_duration}"
    )]
    TrimExceedsSource {
        element_id: String,
        trim_in: f64,
        trim_out: f64,
        source_duration: f64,
    },

    #[error("track {track_id} is exclusive: element {element_id} overlaps {other_element_id}")]
    ExclusiveOverlap {
        track_id: String,
        element_id: String,
        other_element_id: String,
    },

    #[error("track {track_id} is locked")]
    TrackLocked { track_id: String },

    #[error("unknown track {track_id}")]
    UnknownTrack { track_id: String },

    #[error("unknown element {element_id}")]
    UnknownElement { element_id: String },

    #[error("element {element_id} references unknown media {media_id}")]
    UnknownMedia {
        element_id: String,
        media_id: String,
    },

    #[error("element {element_id} of kind {kind} requires a media reference")]
    MissingMediaRef { element_id: String, kind: String },

    #[error("duplicate element id {element_id}")]
    DuplicateElement { element_id: String },

    #[error("duplicate track id {track_id}")]
    DuplicateTrack { track_id: String },

    #[error("track orders must be dense and unique (expected {expected}, got {got})")]
    TrackOrderNotDense { expected: u32, got: u32 },
}
