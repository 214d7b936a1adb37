//! Track adapter splicing several recordings into one video timeline.
//!
//! A class may be recorded as several files with gaps between them. The track
//! keeps one of them loaded on the engine at a time and maps between session
//! positions and positions inside the loaded file. Inside a gap nothing is
//! loaded and the track reports `Playing`/`Pause` from the caller's intent, so
//! a gap never holds the rest of the replay back.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use crate::adapter::engine::{MediaEngine, MediaEvent, MediaState};
use crate::adapter::video::map_media_state;
use crate::core::phase::Phase;
use crate::core::segment::SegmentList;
use crate::core::time::TimeMs;
use crate::core::track::{lock, Track, TrackCore, TrackListener};
use crate::error::TrackError;
use crate::playback::sync::DriftCorrector;

#[derive(Debug, Default)]
struct Cursor {
    /// Segment currently loaded on the engine
    loaded: Option<usize>,
    /// Session position while nothing is loaded
    parked_at: TimeMs,
    /// A caller-issued seek still awaits its engine acknowledgement
    seek_pending: bool,
}

/// Engine calls decided under the cursor lock, executed after it is released
#[derive(Debug)]
enum Step {
    Load(String),
    PlayWhenReady(bool),
    SeekEngine(TimeMs),
    Phase(Phase),
    SeekDone(TimeMs),
}

/// Sequentially spliced recordings on one [`MediaEngine`]
pub struct SegmentedVideoTrack<E: MediaEngine> {
    core: TrackCore,
    engine: Arc<E>,
    segments: SegmentList,
    cursor: Mutex<Cursor>,
    play_intent: AtomicBool,
    released: AtomicBool,
}

impl<E: MediaEngine> SegmentedVideoTrack<E> {
    /// Wrap `engine` and position the track at the start of the session
    pub fn new(name: impl Into<String>, engine: Arc<E>, segments: SegmentList) -> Arc<Self> {
        let track = Arc::new(Self {
            core: TrackCore::new(name),
            engine,
            segments,
            cursor: Mutex::new(Cursor::default()),
            play_intent: AtomicBool::new(false),
            released: AtomicBool::new(false),
        });

        let weak: Weak<Self> = Arc::downgrade(&track);
        track.engine.set_event_sink(Box::new(move |event| {
            if let Some(track) = weak.upgrade() {
                track.handle_event(event);
            }
        }));
        if track.segments.is_empty() {
            tracing::warn!(track = track.name(), "no recorded segments, track stays parked");
        } else {
            tracing::debug!(track = track.name(), segments = track.segments.len(), "segmented track created");
        }
        track.engine.set_play_when_ready(false);
        let steps = track.move_to(&mut lock(&track.cursor), 0, false);
        track.run(steps);
        track
    }

    pub fn segments(&self) -> &SegmentList {
        &self.segments
    }

    /// Index of the loaded segment, `None` while parked in a gap
    pub fn loaded_segment(&self) -> Option<usize> {
        lock(&self.cursor).loaded
    }

    fn intent(&self) -> bool {
        self.play_intent.load(Ordering::SeqCst)
    }

    /// Phase reported while nothing is loaded at `position`
    fn parked_phase(&self, position: TimeMs) -> Phase {
        if position >= self.segments.duration() {
            Phase::End
        } else if self.intent() {
            Phase::Playing
        } else {
            Phase::Pause
        }
    }

    /// Steps that bring the engine to session position `position`.
    ///
    /// `acknowledge` marks a caller-issued seek that must be answered with
    /// exactly one `on_seek_to`.
    fn move_to(&self, cursor: &mut Cursor, position: TimeMs, acknowledge: bool) -> Vec<Step> {
        let mut steps = Vec::new();
        let located = self
            .segments
            .locate(position)
            .and_then(|(index, segment)| Some((index, segment, segment.to_local(position)?)));
        match located {
            Some((index, segment, local)) => {
                if cursor.loaded != Some(index) {
                    tracing::debug!(track = self.name(), segment = index, source = %segment.source, "switching segment");
                    cursor.loaded = Some(index);
                    steps.push(Step::Load(segment.source.clone()));
                    steps.push(Step::PlayWhenReady(self.intent()));
                }
                cursor.seek_pending |= acknowledge;
                steps.push(Step::SeekEngine(local));
            }
            None => {
                if cursor.loaded.take().is_some() {
                    steps.push(Step::PlayWhenReady(false));
                }
                cursor.parked_at = position;
                cursor.seek_pending = false;
                steps.push(Step::Phase(self.parked_phase(position)));
                if acknowledge {
                    steps.push(Step::SeekDone(position));
                }
            }
        }
        steps
    }

    fn run(&self, steps: Vec<Step>) {
        for step in steps {
            match step {
                Step::Load(source) => self.engine.load(&source),
                Step::PlayWhenReady(play) => self.engine.set_play_when_ready(play),
                Step::SeekEngine(local) => self.engine.seek_to(local),
                Step::Phase(phase) => {
                    self.core.update_phase(self, phase);
                }
                Step::SeekDone(position) => self.core.notify_seek(self, position),
            }
        }
    }

    fn handle_event(&self, event: MediaEvent) {
        if self.released.load(Ordering::SeqCst) {
            return;
        }
        match event {
            MediaEvent::StateChanged { state: MediaState::Ended, .. } => {
                let steps = {
                    let mut cursor = lock(&self.cursor);
                    let Some(index) = cursor.loaded.take() else { return };
                    let end = self.segments.get(index).map(|s| s.end).unwrap_or(0);
                    cursor.parked_at = end;
                    tracing::debug!(track = self.name(), segment = index, end, "segment finished");
                    vec![Step::Phase(self.parked_phase(end))]
                };
                self.run(steps);
            }
            MediaEvent::StateChanged { state, play_when_ready } => {
                if lock(&self.cursor).loaded.is_none() {
                    return;
                }
                if let Some(phase) = map_media_state(state, play_when_ready) {
                    self.core.update_phase(self, phase);
                }
            }
            MediaEvent::SeekProcessed { position_ms } => {
                let session_position = {
                    let mut cursor = lock(&self.cursor);
                    let Some(index) = cursor.loaded else { return };
                    if !std::mem::take(&mut cursor.seek_pending) {
                        return;
                    }
                    self.segments
                        .get(index)
                        .map(|segment| segment.to_session(position_ms))
                        .unwrap_or(position_ms)
                };
                self.core.notify_seek(self, session_position);
            }
            MediaEvent::Error(error) => {
                self.core.notify_error(self, &error);
            }
        }
    }
}

impl<E: MediaEngine> Track for SegmentedVideoTrack<E> {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn play(&self) {
        if self.released.load(Ordering::SeqCst) || self.play_intent.swap(true, Ordering::SeqCst) {
            return;
        }
        let steps = {
            let cursor = lock(&self.cursor);
            match cursor.loaded {
                Some(_) => vec![Step::PlayWhenReady(true)],
                None => vec![Step::Phase(self.parked_phase(cursor.parked_at))],
            }
        };
        self.run(steps);
    }

    fn pause(&self) {
        if self.released.load(Ordering::SeqCst) || !self.play_intent.swap(false, Ordering::SeqCst) {
            return;
        }
        let steps = {
            let cursor = lock(&self.cursor);
            match cursor.loaded {
                Some(_) => vec![Step::PlayWhenReady(false)],
                None => vec![Step::Phase(self.parked_phase(cursor.parked_at))],
            }
        };
        self.run(steps);
    }

    fn seek(&self, time_ms: TimeMs) {
        if self.released.load(Ordering::SeqCst) {
            return;
        }
        let steps = self.move_to(&mut lock(&self.cursor), time_ms.max(0), true);
        self.run(steps);
    }

    fn release(&self) -> Result<(), TrackError> {
        if self.released.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.core.set_listener(None);
        self.engine.release()
    }

    fn current_time(&self) -> TimeMs {
        let cursor = lock(&self.cursor);
        match cursor.loaded.and_then(|index| self.segments.get(index)) {
            Some(segment) => segment.to_session(self.engine.position()),
            None => cursor.parked_at,
        }
    }

    fn duration(&self) -> TimeMs {
        self.segments.duration()
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

    fn set_listener(&self, listener: Option<Arc<dyn TrackListener>>) {
        self.core.set_listener(listener);
    }

    /// Follow the authoritative position across segment boundaries and gaps,
    /// re-seeking inside a segment only when drift exceeds the tolerance
    fn correct_drift(&self, time_ms: TimeMs, drift: &DriftCorrector) {
        if self.released.load(Ordering::SeqCst) {
            return;
        }
        let steps = {
            let mut cursor = lock(&self.cursor);
            match (cursor.loaded, self.segments.locate(time_ms)) {
                (Some(loaded), Some((index, segment))) if loaded == index => {
                    let position = segment.to_session(self.engine.position());
                    if drift.needs_correction(time_ms, position, segment.end) {
                        tracing::debug!(track = self.name(), target = time_ms, position, "correcting drift");
                        vec![Step::SeekEngine(time_ms - segment.begin)]
                    } else {
                        Vec::new()
                    }
                }
                (None, None) => {
                    cursor.parked_at = time_ms;
                    vec![Step::Phase(self.parked_phase(time_ms))]
                }
                _ => self.move_to(&mut cursor, time_ms, false),
            }
        };
        self.run(steps);
    }
}
