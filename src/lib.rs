//! Synchronized multi-track replay.
//!
//! Several independently buffering tracks (spliced video recordings, a
//! whiteboard replay, ...) are advanced as one logical timeline by a
//! [`Coordinator`], which is itself a [`Track`] and therefore nests.
//! [`ReplaySession`] drives a combined track from a worker thread and
//! publishes what happens on a broadcast bus.

pub mod adapter;
pub mod config;
pub mod core;
pub mod error;
pub mod playback;
pub mod sim;

pub use crate::config::SyncConfig;
pub use crate::core::{Phase, Track, TrackListener};
pub use crate::error::{SegmentError, SyncError, TrackError};
pub use crate::playback::{combine, Coordinator, DriftCorrector, ReplayEvent, ReplaySession};
