//! Contracts for the external playback engines wrapped by the track adapters.
//!
//! Engines own their own threads. Events must be delivered from the engine's
//! own context and never synchronously from inside a call made on the engine.

use crate::core::time::TimeMs;
use crate::error::TrackError;

/// Coarse state of a media (video) engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaState {
    /// Nothing loaded
    Idle,
    /// Loading or rebuffering
    Buffering,
    /// Able to render; advances only while play-when-ready is set
    Ready,
    /// Reached end of media
    Ended,
}

/// Event emitted by a media engine
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    /// Emitted whenever the state or the play-when-ready flag changes
    StateChanged {
        state: MediaState,
        play_when_ready: bool,
    },
    /// A seek finished; `position_ms` is relative to the loaded media
    SeekProcessed { position_ms: TimeMs },
    Error(TrackError),
}

pub type MediaEventSink = Box<dyn Fn(MediaEvent) + Send + Sync>;

/// Video decoding engine
pub trait MediaEngine: Send + Sync + 'static {
    /// Replace the event sink
    fn set_event_sink(&self, sink: MediaEventSink);

    /// Load a new source, discarding the current one
    fn load(&self, source: &str);

    fn set_play_when_ready(&self, play_when_ready: bool);

    fn seek_to(&self, position_ms: TimeMs);

    /// Position inside the loaded media
    fn position(&self) -> TimeMs;

    /// Length of the loaded media, `None` while unknown
    fn duration(&self) -> Option<TimeMs>;

    fn set_speed(&self, speed: f32);

    fn release(&self) -> Result<(), TrackError>;
}

/// Phase reported by a whiteboard replay engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardPhase {
    WaitingFirstFrame,
    Playing,
    Pause,
    Stopped,
    Buffering,
    Ended,
}

/// Event emitted by a whiteboard replay engine
#[derive(Debug, Clone, PartialEq)]
pub enum BoardEvent {
    Phase(BoardPhase),
    Error(TrackError),
}

pub type BoardEventSink = Box<dyn Fn(BoardEvent) + Send + Sync>;

/// Whiteboard replay engine. Seeking is synchronous on this engine.
pub trait BoardEngine: Send + Sync + 'static {
    fn set_board_sink(&self, sink: BoardEventSink);

    fn play(&self);

    fn pause(&self);

    fn stop(&self) -> Result<(), TrackError>;

    fn seek_to_schedule_time(&self, time_ms: TimeMs);

    /// Current replay position
    fn schedule_time(&self) -> TimeMs;

    /// Total replay length
    fn time_duration(&self) -> TimeMs;

    fn set_playback_speed(&self, speed: f64);
}
