//! Error types for syncplay.
//!
//! Driving calls on a track are fire-and-forget and never return errors; these
//! types cover what engines surface through listeners, what construction can
//! reject, and what the replay session reports.

use crate::core::time::TimeMs;

/// Error surfaced by a single track or the engine behind it.
///
/// Cloneable so the same error can be forwarded to every upward listener.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TrackError {
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("Render error: {0}")]
    Render(String),
    #[error("Source error: {0}")]
    Source(String),
    #[error("Engine error: {0}")]
    Engine(String),
    #[error("Track already released")]
    Released,
}

/// Error type for spliced segment lists
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SegmentError {
    #[error("Segment [{begin}, {end}) overlaps an existing segment")]
    Overlap { begin: TimeMs, end: TimeMs },
    #[error("Segment [{begin}, {end}) is empty or reversed")]
    EmptyRange { begin: TimeMs, end: TimeMs },
}

/// Error type for building coordinators and running replay sessions
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("At least one track is required")]
    NoTracks,
    #[error("Reference track {index} out of range for {len} tracks")]
    InvalidReference { index: usize, len: usize },
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Segment error: {0}")]
    Segment(#[from] SegmentError),
    #[error("Thread error: {0}")]
    Thread(String),
    #[error("Replay session already closed")]
    SessionClosed,
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::Thread(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_error_display() {
        let err = TrackError::Decode("bad frame".to_string());
        assert_eq!(err.to_string(), "Decode error: bad frame");
        assert_eq!(TrackError::Released.to_string(), "Track already released");
    }

    #[test]
    fn test_segment_error_converts() {
        let err: SyncError = SegmentError::Overlap { begin: 0, end: 10 }.into();
        assert!(matches!(err, SyncError::Segment(SegmentError::Overlap { .. })));
        assert_eq!(
            err.to_string(),
            "Segment error: Segment [0, 10) overlaps an existing segment"
        );
    }
}
