//! Drift correction between a track and the authoritative timeline.
//!
//! Correction is deliberately coarse: a track is only re-seeked once it is
//! more than the threshold away from the authoritative position, and never
//! once the authoritative position is past the end of that track.

use crate::core::time::{self, TimeMs};
use crate::core::track::Track;

/// Default tolerance before a track is re-seeked
pub const DRIFT_THRESHOLD_MS: TimeMs = 1_000;

/// Periodic drift corrector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriftCorrector {
    threshold_ms: TimeMs,
}

impl DriftCorrector {
    /// Create a corrector with a custom tolerance (negative values clamp to 0)
    pub fn new(threshold_ms: TimeMs) -> Self {
        Self {
            threshold_ms: threshold_ms.max(0),
        }
    }

    pub fn threshold_ms(&self) -> TimeMs {
        self.threshold_ms
    }

    /// Offset of a track relative to the authoritative position.
    /// Positive if the track is ahead, negative if behind.
    pub fn offset(&self, authoritative: TimeMs, track_position: TimeMs) -> TimeMs {
        track_position.saturating_sub(authoritative)
    }

    /// Check whether a track at `position` with length `duration` must be
    /// re-seeked to `target`
    pub fn needs_correction(&self, target: TimeMs, position: TimeMs, duration: TimeMs) -> bool {
        time::distance(target, position) > self.threshold_ms && target < duration
    }

    /// Seek `track` to `target` if it drifted out of tolerance.
    ///
    /// Returns true when a corrective seek was issued. A failed corrective
    /// seek is simply retried on the next call.
    pub fn correct<T: Track + ?Sized>(&self, track: &T, target: TimeMs) -> bool {
        let position = track.current_time();
        let duration = track.duration();
        if !self.needs_correction(target, position, duration) {
            return false;
        }

        tracing::debug!(
            track = track.name(),
            target,
            position,
            offset = self.offset(target, position),
            "correcting drift"
        );
        track.seek(target);
        true
    }
}

impl Default for DriftCorrector {
    fn default() -> Self {
        Self::new(DRIFT_THRESHOLD_MS)
    }
}
