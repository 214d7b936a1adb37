//! Test helper modules for syncplay integration tests
//!
//! Provides reusable test infrastructure components:
//! - ManualTrack: a track whose engine events are driven by the test
//! - Recorder: a listener that records everything it is told

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use syncplay::core::{Phase, TimeMs, Track, TrackCore, TrackListener};
use syncplay::TrackError;

/// Driving call received by a [`ManualTrack`]
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Play,
    Pause,
    Seek(TimeMs),
    Speed(f32),
    Release,
}

/// Track whose phase changes and seek completions are reported by the test.
///
/// With `echo` enabled it behaves like an engine that is always ready:
/// `play()` and `pause()` report `Playing` and `Pause` straight away.
pub struct ManualTrack {
    core: TrackCore,
    calls: Mutex<Vec<Call>>,
    position: AtomicI64,
    duration: AtomicI64,
    echo: AtomicBool,
    fail_release: AtomicBool,
}

impl ManualTrack {
    pub fn new(name: &str, duration: TimeMs) -> Arc<Self> {
        Arc::new(Self {
            core: TrackCore::new(name),
            calls: Mutex::new(Vec::new()),
            position: AtomicI64::new(0),
            duration: AtomicI64::new(duration),
            echo: AtomicBool::new(false),
            fail_release: AtomicBool::new(false),
        })
    }

    /// Same as `new`, with play/pause echoed as phase reports
    pub fn echoing(name: &str, duration: TimeMs) -> Arc<Self> {
        let track = Self::new(name, duration);
        track.echo.store(true, Ordering::SeqCst);
        track
    }

    pub fn failing_release(self: &Arc<Self>) -> Arc<Self> {
        self.fail_release.store(true, Ordering::SeqCst);
        Arc::clone(self)
    }

    pub fn report(&self, phase: Phase) {
        self.core.update_phase(self, phase);
    }

    pub fn complete_seek(&self, time_ms: TimeMs) {
        self.position.store(time_ms, Ordering::SeqCst);
        self.core.notify_seek(self, time_ms);
    }

    pub fn fail(&self, error: TrackError) {
        self.core.notify_error(self, &error);
    }

    pub fn set_position(&self, time_ms: TimeMs) {
        self.position.store(time_ms, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn take_calls(&self) -> Vec<Call> {
        std::mem::take(&mut *self.calls.lock().unwrap())
    }

    pub fn seeks(&self) -> Vec<TimeMs> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Seek(time_ms) => Some(time_ms),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, wanted: &Call) -> usize {
        self.calls().iter().filter(|call| *call == wanted).count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

impl Track for ManualTrack {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn play(&self) {
        self.record(Call::Play);
        if self.echo.load(Ordering::SeqCst) {
            self.report(Phase::Playing);
        }
    }

    fn pause(&self) {
        self.record(Call::Pause);
        if self.echo.load(Ordering::SeqCst) {
            self.report(Phase::Pause);
        }
    }

    fn seek(&self, time_ms: TimeMs) {
        self.record(Call::Seek(time_ms));
    }

    fn release(&self) -> Result<(), TrackError> {
        self.record(Call::Release);
        self.core.set_listener(None);
        if self.fail_release.load(Ordering::SeqCst) {
            return Err(TrackError::Engine("release refused".to_string()));
        }
        Ok(())
    }

    fn current_time(&self) -> TimeMs {
        self.position.load(Ordering::SeqCst)
    }

    fn duration(&self) -> TimeMs {
        self.duration.load(Ordering::SeqCst)
    }

    fn playback_speed(&self) -> f32 {
        self.core.playback_speed()
    }

    fn set_playback_speed(&self, speed: f32) {
        self.record(Call::Speed(speed));
        self.core.set_playback_speed(speed);
    }

    fn phase(&self) -> Phase {
        self.core.phase()
    }

    fn set_listener(&self, listener: Option<Arc<dyn TrackListener>>) {
        self.core.set_listener(listener);
    }
}

/// Notification seen by a [`Recorder`]
#[derive(Debug, Clone, PartialEq)]
pub enum Heard {
    Phase(Phase),
    Seek(TimeMs),
    Error { source: String, error: TrackError },
}

/// Listener recording every notification in arrival order
#[derive(Default)]
pub struct Recorder {
    heard: Mutex<Vec<Heard>>,
}

impl Recorder {
    pub fn attach(track: &dyn Track) -> Arc<Self> {
        let recorder = Arc::new(Self::default());
        track.set_listener(Some(recorder.clone()));
        recorder
    }

    pub fn heard(&self) -> Vec<Heard> {
        self.heard.lock().unwrap().clone()
    }

    pub fn phases(&self) -> Vec<Phase> {
        self.heard()
            .into_iter()
            .filter_map(|heard| match heard {
                Heard::Phase(phase) => Some(phase),
                _ => None,
            })
            .collect()
    }

    pub fn seeks(&self) -> Vec<TimeMs> {
        self.heard()
            .into_iter()
            .filter_map(|heard| match heard {
                Heard::Seek(time_ms) => Some(time_ms),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.heard.lock().unwrap().clear();
    }
}

impl TrackListener for Recorder {
    fn on_phase_changed(&self, _source: &dyn Track, phase: Phase) {
        self.heard.lock().unwrap().push(Heard::Phase(phase));
    }

    fn on_seek_to(&self, _source: &dyn Track, time_ms: TimeMs) {
        self.heard.lock().unwrap().push(Heard::Seek(time_ms));
    }

    fn on_error(&self, source: &dyn Track, error: &TrackError) {
        self.heard.lock().unwrap().push(Heard::Error {
            source: source.name().to_string(),
            error: error.clone(),
        });
    }
}
