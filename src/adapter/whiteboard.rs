//! Track adapter for the interactive-whiteboard replay engine.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use crate::adapter::engine::{BoardEngine, BoardEvent, BoardPhase};
use crate::core::phase::Phase;
use crate::core::time::TimeMs;
use crate::core::track::{Track, TrackCore, TrackListener};
use crate::error::TrackError;

/// Whiteboard replay played by a [`BoardEngine`]
pub struct WhiteboardTrack<E: BoardEngine> {
    core: TrackCore,
    engine: Arc<E>,
    released: AtomicBool,
}

impl<E: BoardEngine> WhiteboardTrack<E> {
    pub fn new(name: impl Into<String>, engine: Arc<E>) -> Arc<Self> {
        let track = Arc::new(Self {
            core: TrackCore::new(name),
            engine,
            released: AtomicBool::new(false),
        });

        let weak: Weak<Self> = Arc::downgrade(&track);
        track.engine.set_board_sink(Box::new(move |event| {
            if let Some(track) = weak.upgrade() {
                track.handle_event(event);
            }
        }));
        track
    }

    pub fn engine(&self) -> &Arc<E> {
        &self.engine
    }

    fn handle_event(&self, event: BoardEvent) {
        if self.released.load(Ordering::SeqCst) {
            return;
        }
        match event {
            BoardEvent::Phase(board_phase) => {
                let phase = map_board_phase(board_phase);
                if matches!(phase, Phase::Playing | Phase::Pause) {
                    // The engine resets its speed on some transitions
                    self.engine.set_playback_speed(f64::from(self.core.playback_speed()));
                }
                self.core.update_phase(self, phase);
            }
            BoardEvent::Error(error) => self.core.notify_error(self, &error),
        }
    }
}

pub(crate) fn map_board_phase(phase: BoardPhase) -> Phase {
    match phase {
        BoardPhase::WaitingFirstFrame | BoardPhase::Buffering => Phase::Buffering,
        BoardPhase::Playing => Phase::Playing,
        BoardPhase::Pause => Phase::Pause,
        BoardPhase::Stopped | BoardPhase::Ended => Phase::End,
    }
}

impl<E: BoardEngine> Track for WhiteboardTrack<E> {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn play(&self) {
        if !self.released.load(Ordering::SeqCst) {
            self.engine.play();
        }
    }

    fn pause(&self) {
        if !self.released.load(Ordering::SeqCst) {
            self.engine.pause();
        }
    }

    /// The engine seeks synchronously, so completion is reported right away
    fn seek(&self, time_ms: TimeMs) {
        if self.released.load(Ordering::SeqCst) {
            return;
        }
        let time_ms = time_ms.max(0);
        self.engine.seek_to_schedule_time(time_ms);
        self.core.notify_seek(self, time_ms);
    }

    fn release(&self) -> Result<(), TrackError> {
        if self.released.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.core.set_listener(None);
        self.engine.stop()
    }

    fn current_time(&self) -> TimeMs {
        self.engine.schedule_time()
    }

    fn duration(&self) -> TimeMs {
        self.engine.time_duration()
    }

    fn playback_speed(&self) -> f32 {
        self.core.playback_speed()
    }

    fn set_playback_speed(&self, speed: f32) {
        if let Some(speed) = self.core.set_playback_speed(speed) {
            self.engine.set_playback_speed(f64::from(speed));
        }
    }

    fn phase(&self) -> Phase {
        self.core.phase()
    }

    fn set_listener(&self, listener: Option<Arc<dyn TrackListener>>) {
        self.core.set_listener(listener);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::engine::BoardEventSink;
    use crate::core::track::lock;
    use std::sync::{Mutex, RwLock};

    #[derive(Default)]
    struct ScriptedBoard {
        sink: RwLock<Option<BoardEventSink>>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedBoard {
        fn emit(&self, event: BoardEvent) {
            if let Some(sink) = self.sink.read().unwrap().as_ref() {
                sink(event);
            }
        }
    }

    impl BoardEngine for ScriptedBoard {
        fn set_board_sink(&self, sink: BoardEventSink) {
            *self.sink.write().unwrap() = Some(sink);
        }
        fn play(&self) {
            lock(&self.calls).push("play".to_string());
        }
        fn pause(&self) {
            lock(&self.calls).push("pause".to_string());
        }
        fn stop(&self) -> Result<(), TrackError> {
            lock(&self.calls).push("stop".to_string());
            Err(TrackError::Engine("already stopped".to_string()))
        }
        fn seek_to_schedule_time(&self, time_ms: TimeMs) {
            lock(&self.calls).push(format!("seek {}", time_ms));
        }
        fn schedule_time(&self) -> TimeMs {
            0
        }
        fn time_duration(&self) -> TimeMs {
            15_000
        }
        fn set_playback_speed(&self, speed: f64) {
            lock(&self.calls).push(format!("speed {}", speed));
        }
    }

    #[derive(Default)]
    struct Seeks(Mutex<Vec<TimeMs>>);

    impl TrackListener for Seeks {
        fn on_seek_to(&self, _source: &dyn Track, time_ms: TimeMs) {
            lock(&self.0).push(time_ms);
        }
    }

    #[test]
    fn test_phase_mapping() {
        assert_eq!(map_board_phase(BoardPhase::WaitingFirstFrame), Phase::Buffering);
        assert_eq!(map_board_phase(BoardPhase::Buffering), Phase::Buffering);
        assert_eq!(map_board_phase(BoardPhase::Playing), Phase::Playing);
        assert_eq!(map_board_phase(BoardPhase::Pause), Phase::Pause);
        assert_eq!(map_board_phase(BoardPhase::Stopped), Phase::End);
        assert_eq!(map_board_phase(BoardPhase::Ended), Phase::End);
    }

    #[test]
    fn test_seek_reports_completion_immediately() {
        let engine = Arc::new(ScriptedBoard::default());
        let track = WhiteboardTrack::new("board", engine.clone());
        let seeks = Arc::new(Seeks::default());
        track.set_listener(Some(seeks.clone()));

        track.seek(5_000);
        assert_eq!(*lock(&engine.calls), vec!["seek 5000"]);
        assert_eq!(*lock(&seeks.0), vec![5_000]);
    }

    #[test]
    fn test_speed_reapplied_on_play_phases() {
        let engine = Arc::new(ScriptedBoard::default());
        let track = WhiteboardTrack::new("board", engine.clone());
        track.set_playback_speed(2.0);
        lock(&engine.calls).clear();

        engine.emit(BoardEvent::Phase(BoardPhase::Buffering));
        engine.emit(BoardEvent::Phase(BoardPhase::Playing));
        assert_eq!(*lock(&engine.calls), vec!["speed 2"]);
        assert_eq!(track.phase(), Phase::Playing);
    }

    #[test]
    fn test_release_surfaces_engine_error_once() {
        let engine = Arc::new(ScriptedBoard::default());
        let track = WhiteboardTrack::new("board", engine.clone());
        assert!(track.release().is_err());
        assert!(track.release().is_ok());
        assert_eq!(*lock(&engine.calls), vec!["stop"]);
    }
}
