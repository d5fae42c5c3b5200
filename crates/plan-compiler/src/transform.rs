//! Per-layer transform resolved from element properties.

use clipforge_timeline_model::{CropRect, ElementProperties};
use serde::{Deserialize, Serialize};

/// Placement of a source frame on the output canvas.
///
/// Offsets are normalized to canvas dimensions, with `(0.0, 0.0)`
/// centering the layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub scale: f64,
    pub x: f64,
    pub y: f64,
    pub opacity: f64,
    pub crop: Option<CropRect>,
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        scale: 1.0,
        x: 0.0,
        y: 0.0,
        opacity: 1.0,
        crop: None,
    };

    pub fn from_properties(properties: &ElementProperties) -> Self {
        Self {
            scale: properties.scale,
            x: properties.x,
            y: properties.y,
            opacity: properties.opacity.clamp(0.0, 1.0),
            crop: properties.crop,
        }
    }

    /// Fully transparent layers contribute nothing to the output.
    pub fn is_invisible(&self) -> bool {
        self.opacity <= 0.0 || self.scale <= 0.0
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}
