//! Track adapter for a single recorded video on a media engine.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use crate::adapter::engine::{MediaEngine, MediaEvent, MediaState};
use crate::core::phase::Phase;
use crate::core::time::TimeMs;
use crate::core::track::{Track, TrackCore, TrackListener};
use crate::error::TrackError;

/// One video source played by a [`MediaEngine`]
pub struct VideoTrack<E: MediaEngine> {
    core: TrackCore,
    engine: Arc<E>,
    play_intent: AtomicBool,
    released: AtomicBool,
}

impl<E: MediaEngine> VideoTrack<E> {
    /// Wrap `engine` and start loading `source` paused
    pub fn new(name: impl Into<String>, engine: Arc<E>, source: &str) -> Arc<Self> {
        let track = Arc::new(Self {
            core: TrackCore::new(name),
            engine,
            play_intent: AtomicBool::new(false),
            released: AtomicBool::new(false),
        });

        let weak: Weak<Self> = Arc::downgrade(&track);
        track.engine.set_event_sink(Box::new(move |event| {
            if let Some(track) = weak.upgrade() {
                track.handle_event(event);
            }
        }));
        track.engine.set_play_when_ready(false);
        track.engine.load(source);
        track
    }

    pub fn engine(&self) -> &Arc<E> {
        &self.engine
    }

    fn handle_event(&self, event: MediaEvent) {
        if self.released.load(Ordering::SeqCst) {
            return;
        }
        match event {
            MediaEvent::StateChanged { state, play_when_ready } => {
                if let Some(phase) = map_media_state(state, play_when_ready) {
                    self.core.update_phase(self, phase);
                }
            }
            MediaEvent::SeekProcessed { position_ms } => {
                self.core.notify_seek(self, position_ms);
            }
            MediaEvent::Error(error) => {
                self.core.notify_error(self, &error);
            }
        }
    }
}

/// Phase for an engine state; `None` leaves the current phase untouched
pub(crate) fn map_media_state(state: MediaState, play_when_ready: bool) -> Option<Phase> {
    match state {
        MediaState::Idle => None,
        MediaState::Buffering => Some(Phase::Buffering),
        MediaState::Ready if play_when_ready => Some(Phase::Playing),
        MediaState::Ready => Some(Phase::Pause),
        MediaState::Ended => Some(Phase::End),
    }
}

impl<E: MediaEngine> Track for VideoTrack<E> {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn play(&self) {
        if self.released.load(Ordering::SeqCst) || self.play_intent.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::trace!(track = self.name(), "play");
        self.engine.set_play_when_ready(true);
    }

    fn pause(&self) {
        if self.released.load(Ordering::SeqCst) || !self.play_intent.swap(false, Ordering::SeqCst) {
            return;
        }
        tracing::trace!(track = self.name(), "pause");
        self.engine.set_play_when_ready(false);
    }

    fn seek(&self, time_ms: TimeMs) {
        if self.released.load(Ordering::SeqCst) {
            return;
        }
        self.engine.seek_to(time_ms.max(0));
    }

    fn release(&self) -> Result<(), TrackError> {
        if self.released.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.core.set_listener(None);
        self.engine.release()
    }

    fn current_time(&self) -> TimeMs {
        self.engine.position()
    }

    fn duration(&self) -> TimeMs {
        self.engine.duration().unwrap_or(0)
    }

    fn playback_speed(&self) -> f32 {
        self.core.playback_speed()
    }

    fn set_playback_speed(&self, speed: f32) {
        if let Some(speed) = self.core.set_playback_speed(speed) {
            self.engine.set_speed(speed);
        }
    }

    fn phase(&self) -> Phase {
        self.core.phase()
    }

    fn is_playing(&self) -> bool {
        self.play_intent.load(Ordering::SeqCst) && self.core.phase().is_playing()
    }

    fn set_listener(&self, listener: Option<Arc<dyn TrackListener>>) {
        self.core.set_listener(listener);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::engine::MediaEventSink;
    use crate::core::track::lock;
    use std::sync::atomic::AtomicI64;
    use std::sync::{Mutex, RwLock};

    /// Engine that records calls; tests push events by hand
    #[derive(Default)]
    struct ScriptedEngine {
        sink: RwLock<Option<MediaEventSink>>,
        calls: Mutex<Vec<String>>,
        position: AtomicI64,
    }

    impl ScriptedEngine {
        fn emit(&self, event: MediaEvent) {
            if let Some(sink) = self.sink.read().unwrap().as_ref() {
                sink(event);
            }
        }

        fn calls(&self) -> Vec<String> {
            lock(&self.calls).clone()
        }
    }

    impl MediaEngine for ScriptedEngine {
        fn set_event_sink(&self, sink: MediaEventSink) {
            *self.sink.write().unwrap() = Some(sink);
        }
        fn load(&self, source: &str) {
            lock(&self.calls).push(format!("load {}", source));
        }
        fn set_play_when_ready(&self, play_when_ready: bool) {
            lock(&self.calls).push(format!("pwr {}", play_when_ready));
        }
        fn seek_to(&self, position_ms: TimeMs) {
            lock(&self.calls).push(format!("seek {}", position_ms));
            self.position.store(position_ms, Ordering::SeqCst);
        }
        fn position(&self) -> TimeMs {
            self.position.load(Ordering::SeqCst)
        }
        fn duration(&self) -> Option<TimeMs> {
            Some(8_000)
        }
        fn set_speed(&self, speed: f32) {
            lock(&self.calls).push(format!("speed {}", speed));
        }
        fn release(&self) -> Result<(), TrackError> {
            lock(&self.calls).push("release".to_string());
            Ok(())
        }
    }

    #[test]
    fn test_state_mapping() {
        assert_eq!(map_media_state(MediaState::Idle, true), None);
        assert_eq!(map_media_state(MediaState::Buffering, true), Some(Phase::Buffering));
        assert_eq!(map_media_state(MediaState::Ready, true), Some(Phase::Playing));
        assert_eq!(map_media_state(MediaState::Ready, false), Some(Phase::Pause));
        assert_eq!(map_media_state(MediaState::Ended, false), Some(Phase::End));
    }

    #[test]
    fn test_new_loads_paused() {
        let engine = Arc::new(ScriptedEngine::default());
        let _track = VideoTrack::new("video", engine.clone(), "a.m3u8");
        assert_eq!(engine.calls(), vec!["pwr false", "load a.m3u8"]);
    }

    #[test]
    fn test_play_pause_are_idempotent() {
        let engine = Arc::new(ScriptedEngine::default());
        let track = VideoTrack::new("video", engine.clone(), "a.m3u8");
        track.play();
        track.play();
        track.pause();
        track.pause();
        assert_eq!(engine.calls()[2..], ["pwr true", "pwr false"]);
    }

    #[test]
    fn test_events_drive_phase() {
        let engine = Arc::new(ScriptedEngine::default());
        let track = VideoTrack::new("video", engine.clone(), "a.m3u8");
        track.play();

        engine.emit(MediaEvent::StateChanged { state: MediaState::Buffering, play_when_ready: true });
        assert_eq!(track.phase(), Phase::Buffering);
        assert!(!track.is_playing());

        engine.emit(MediaEvent::StateChanged { state: MediaState::Ready, play_when_ready: true });
        assert_eq!(track.phase(), Phase::Playing);
        assert!(track.is_playing());
    }

    #[test]
    fn test_release_is_idempotent_and_silences_events() {
        let engine = Arc::new(ScriptedEngine::default());
        let track = VideoTrack::new("video", engine.clone(), "a.m3u8");
        assert!(track.release().is_ok());
        assert!(track.release().is_ok());
        engine.emit(MediaEvent::StateChanged { state: MediaState::Ready, play_when_ready: true });

        assert_eq!(track.phase(), Phase::Idle);
        assert_eq!(engine.calls().iter().filter(|c| *c == "release").count(), 1);
    }
}
