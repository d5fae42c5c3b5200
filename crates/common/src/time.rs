//! Frame and time math shared by the plan compiler and export engine.
//!
//! The compiler quantizes element timing (seconds, `f64`) onto the
//! integer output frame grid. All quantization goes through this module
//! so boundary handling stays consistent: a value that lands within
//! [`FRAME_EPSILON`] of an exact frame index snaps to it instead of
//! spilling into the next frame.

use serde::{Deserialize, Serialize};

/// Tolerance (in frames) for snapping float times onto the frame grid.
pub const FRAME_EPSILON: f64 = 1e-6;

/// Convert a frame index to its timestamp in seconds.
pub fn frame_to_secs(frame: u64, fps: u32) -> f64 {
    frame as f64 / fps.max(1) as f64
}

/// First frame whose timestamp is `>= secs`.
///
/// Exact boundaries snap: `first_frame_at_or_after(3.0, 30) == 90`
/// even when `3.0 * 30.0` carries float noise.
pub fn first_frame_at_or_after(secs: f64, fps: u32) -> u64 {
    if secs <= 0.0 {
        return 0;
    }
    let exact = secs * fps.max(1) as f64;
    let rounded = exact.round();
    if (exact - rounded).abs() < FRAME_EPSILON {
        rounded as u64
    } else {
        exact.ceil() as u64
    }
}

/// Number of whole output frames covering `duration_secs` (round up).
pub fn duration_in_frames(duration_secs: f64, fps: u32) -> u64 {
    first_frame_at_or_after(duration_secs, fps)
}

/// A half-open time range `[start_secs, end_secs)` in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start_secs: f64,
    pub end_secs: f64,
}

impl TimeRange {
    pub fn new(start_secs: f64, end_secs: f64) -> Self {
        Self {
            start_secs,
            end_secs: end_secs.max(start_secs),
        }
    }

    /// Duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.end_secs - self.start_secs
    }

    pub fn is_empty(&self) -> bool {
        self.end_secs <= self.start_secs
    }

    /// Whether `t` falls inside the half-open range.
    pub fn contains(&self, t: f64) -> bool {
        t >= self.start_secs && t < self.end_secs
    }

    /// Intersection with another range, or `None` if disjoint.
    pub fn intersect(&self, other: &TimeRange) -> Option<TimeRange> {
        let start = self.start_secs.max(other.start_secs);
        let end = self.end_secs.min(other.end_secs);
        if end > start {
            Some(TimeRange::new(start, end))
        } else {
            None
        }
    }

    /// Shift the range by `delta` seconds.
    pub fn shifted(&self, delta: f64) -> TimeRange {
        TimeRange::new(self.start_secs + delta, self.end_secs + delta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_quantizes_up() {
        assert_eq!(duration_in_frames(10.0, 30), 300);
        assert_eq!(duration_in_frames(10.01, 30), 301);
        assert_eq!(duration_in_frames(0.0, 30), 0);
    }

    #[test]
    fn test_boundary_snaps_to_frame() {
        // 2.9999999999 * 30 is within epsilon of 90
        assert_eq!(first_frame_at_or_after(3.0, 30), 90);
        assert_eq!(first_frame_at_or_after(89.9999999 / 30.0, 30), 90);
        assert_eq!(first_frame_at_or_after(3.02, 30), 91);
    }

    #[test]
    fn test_frame_to_secs_roundtrip() {
        for frame in [0u64, 1, 90, 300, 7200] {
            let t = frame_to_secs(frame, 30);
            assert_eq!(first_frame_at_or_after(t, 30), frame);
        }
    }

    #[test]
    fn test_range_contains_half_open() {
        let r = TimeRange::new(1.0, 2.0);
        assert!(r.contains(1.0));
        assert!(r.contains(1.999));
        assert!(!r.contains(2.0));
        assert!(!r.contains(0.999));
    }

    #[test]
    fn test_range_intersect() {
        let a = TimeRange::new(0.0, 5.0);
        let b = TimeRange::new(3.0, 8.0);
        let i = a.intersect(&b).unwrap();
        assert_eq!(i, TimeRange::new(3.0, 5.0));
        assert!(a.intersect(&TimeRange::new(5.0, 6.0)).is_none());
    }

    #[test]
    fn test_shifted() {
        let r = TimeRange::new(1.0, 2.0).shifted(0.5);
        assert!((r.start_secs - 1.5).abs() < 1e-12);
        assert!((r.end_secs - 2.5).abs() < 1e-12);
    }
}
