//! Core types for synchronized replay.
//!
//! This module provides the track contract, phases, spliced segments and
//! time representation. All time values are milliseconds (i64).

pub mod phase;
pub mod segment;
pub mod time;
pub mod track;

// Re-export core data structures for easier access.
pub use phase::Phase;
pub use segment::{Segment, SegmentList};
pub use time::{TimeMs, ZERO};
pub use track::{Track, TrackCore, TrackListener, DEFAULT_PLAYBACK_SPEED};
