//! Playback phase state machine shared by every track and coordinator.

use std::fmt;

/// Discrete playback phase.
///
/// `Idle → Buffering → {Playing, Pause} → Buffering (revisit) → End`.
/// `Idle` only precedes the first content load. `End` is terminal for a finite
/// track and is left only through an explicit `stop()` or `seek(0)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Phase {
    /// Nothing loaded yet
    #[default]
    Idle,
    /// Waiting for data; position is not advancing
    Buffering,
    /// Halted at a position
    Pause,
    /// Position is advancing
    Playing,
    /// Reached the end of the content
    End,
}

impl Phase {
    /// Check if currently playing
    pub fn is_playing(self) -> bool {
        matches!(self, Phase::Playing)
    }

    /// Check if ended
    pub fn is_ended(self) -> bool {
        matches!(self, Phase::End)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::Buffering => "buffering",
            Phase::Pause => "pause",
            Phase::Playing => "playing",
            Phase::End => "end",
        };
        f.write_str(name)
    }
}
