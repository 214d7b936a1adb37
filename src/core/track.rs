//! Track contract shared by every playable timeline source.
//!
//! A track is one independently clocked timeline (recorded video, whiteboard
//! replay, or a coordinator wrapping several of them). Driving calls are
//! fire-and-forget: completion is only ever observed through the registered
//! [`TrackListener`], which may be invoked from any thread.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use crate::core::phase::Phase;
use crate::core::time::{TimeMs, ZERO};
use crate::error::TrackError;
use crate::playback::sync::DriftCorrector;

/// Default playback speed multiplier
pub const DEFAULT_PLAYBACK_SPEED: f32 = 1.0;

/// A playable timeline.
///
/// Implementations must be callable from any thread. Phase changes are
/// reported through the listener exactly once per real transition, and every
/// `seek()` that starts an asynchronous seek is acknowledged with exactly one
/// `on_seek_to`.
pub trait Track: Send + Sync {
    /// Diagnostic name, not semantically load-bearing
    fn name(&self) -> &str;

    fn play(&self);

    fn pause(&self);

    /// Halt and rewind to the start
    fn stop(&self) {
        self.pause();
        self.seek(ZERO);
    }

    /// Start seeking to `time_ms`; completion arrives through `on_seek_to`
    fn seek(&self, time_ms: TimeMs);

    /// Release engine resources. Must be idempotent.
    fn release(&self) -> Result<(), TrackError>;

    fn current_time(&self) -> TimeMs;

    fn duration(&self) -> TimeMs;

    fn playback_speed(&self) -> f32;

    fn set_playback_speed(&self, speed: f32);

    fn phase(&self) -> Phase;

    /// True only while `phase() == Phase::Playing`
    fn is_playing(&self) -> bool {
        self.phase().is_playing()
    }

    /// Register (or clear, with `None`) the listener for this track's events
    fn set_listener(&self, listener: Option<Arc<dyn TrackListener>>);

    /// Nudge this track toward the authoritative position `time_ms`.
    /// Called periodically by the owner of the timeline.
    fn sync_time(&self, time_ms: TimeMs) {
        self.correct_drift(time_ms, &DriftCorrector::default());
    }

    /// Drift correction with the caller's tolerance; composite tracks pass it down
    fn correct_drift(&self, time_ms: TimeMs, drift: &DriftCorrector) {
        drift.correct(self, time_ms);
    }
}

/// Receiver of track notifications.
///
/// All methods default to no-ops so listeners only implement what they need.
pub trait TrackListener: Send + Sync {
    fn on_phase_changed(&self, _source: &dyn Track, _phase: Phase) {}

    fn on_seek_to(&self, _source: &dyn Track, _time_ms: TimeMs) {}

    fn on_error(&self, _source: &dyn Track, _error: &TrackError) {}
}

/// Lock a mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Shared state for track adapters: name, phase, speed and listener slot.
///
/// Listener callbacks are always made after the internal locks are released,
/// so a listener may call straight back into the track.
pub struct TrackCore {
    name: String,
    phase: Mutex<Phase>,
    speed: Mutex<f32>,
    listener: RwLock<Option<Arc<dyn TrackListener>>>,
}

impl TrackCore {
    /// Create a core in `Phase::Idle` with the default speed
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            phase: Mutex::new(Phase::Idle),
            speed: Mutex::new(DEFAULT_PLAYBACK_SPEED),
            listener: RwLock::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn phase(&self) -> Phase {
        *lock(&self.phase)
    }

    pub fn playback_speed(&self) -> f32 {
        *lock(&self.speed)
    }

    /// Store a new speed multiplier.
    ///
    /// Returns the stored value, or `None` if `speed` is not a positive finite
    /// number (the previous speed is kept).
    pub fn set_playback_speed(&self, speed: f32) -> Option<f32> {
        if !speed.is_finite() || speed <= 0.0 {
            tracing::warn!(track = %self.name, speed, "ignoring invalid playback speed");
            return None;
        }
        *lock(&self.speed) = speed;
        Some(speed)
    }

    pub fn set_listener(&self, listener: Option<Arc<dyn TrackListener>>) {
        *self.listener.write().unwrap_or_else(PoisonError::into_inner) = listener;
    }

    pub fn listener(&self) -> Option<Arc<dyn TrackListener>> {
        self.listener
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Move to `new_phase`, notifying the listener if it actually changed.
    ///
    /// Returns true when a transition happened.
    pub fn update_phase(&self, source: &dyn Track, new_phase: Phase) -> bool {
        {
            let mut phase = lock(&self.phase);
            if *phase == new_phase {
                return false;
            }
            let from = *phase;
            tracing::trace!(track = %self.name, %from, to = %new_phase, "phase change");
            *phase = new_phase;
        }
        if let Some(listener) = self.listener() {
            listener.on_phase_changed(source, new_phase);
        }
        true
    }

    /// Report a completed seek
    pub fn notify_seek(&self, source: &dyn Track, time_ms: TimeMs) {
        tracing::trace!(track = %self.name, time_ms, "seek completed");
        if let Some(listener) = self.listener() {
            listener.on_seek_to(source, time_ms);
        }
    }

    /// Report an engine error
    pub fn notify_error(&self, source: &dyn Track, error: &TrackError) {
        tracing::warn!(track = %self.name, %error, "track error");
        if let Some(listener) = self.listener() {
            listener.on_error(source, error);
        }
    }
}

impl std::fmt::Debug for TrackCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackCore")
            .field("name", &self.name)
            .field("phase", &self.phase())
            .field("speed", &self.playback_speed())
            .finish()
    }
}
