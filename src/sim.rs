//! Simulated playback engine for demos and threaded tests.
//!
//! Each engine owns a worker thread that advances a virtual position at the
//! configured speed, buffers on load, seek and injected stalls, and delivers
//! its events from that thread. One engine can stand in for either a video
//! engine or a whiteboard engine.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, Sender};

use crate::adapter::engine::{
    BoardEngine, BoardEvent, BoardEventSink, BoardPhase, MediaEngine, MediaEvent, MediaEventSink,
    MediaState,
};
use crate::core::time::TimeMs;
use crate::core::track::lock;
use crate::error::{SyncError, TrackError};

/// Timing of a simulated engine
#[derive(Debug, Clone)]
pub struct SimSettings {
    /// Buffering after a new source is loaded
    pub startup_buffer_ms: u64,
    /// Buffering after every seek
    pub seek_buffer_ms: u64,
    /// Worker tick period
    pub tick_ms: u64,
    /// Length of sources without an explicit entry in `durations`
    pub default_duration_ms: TimeMs,
    pub durations: HashMap<String, TimeMs>,
}

impl Default for SimSettings {
    fn default() -> Self {
        Self {
            startup_buffer_ms: 300,
            seek_buffer_ms: 150,
            tick_ms: 20,
            default_duration_ms: 60_000,
            durations: HashMap::new(),
        }
    }
}

impl SimSettings {
    pub fn with_duration(mut self, source: impl Into<String>, duration_ms: TimeMs) -> Self {
        self.durations.insert(source.into(), duration_ms);
        self
    }

    pub fn with_buffering(mut self, startup_ms: u64, seek_ms: u64) -> Self {
        self.startup_buffer_ms = startup_ms;
        self.seek_buffer_ms = seek_ms;
        self
    }

    fn duration_of(&self, source: &str) -> TimeMs {
        self.durations
            .get(source)
            .copied()
            .unwrap_or(self.default_duration_ms)
    }
}

#[derive(Debug)]
enum Command {
    Load(String),
    PlayWhenReady(bool),
    Seek { position_ms: TimeMs, acknowledge: bool },
    Speed(f64),
    Stall(u64),
    Stop,
    Fail(TrackError),
    Shutdown,
}

type MediaCallback = Arc<dyn Fn(MediaEvent) + Send + Sync>;
type BoardCallback = Arc<dyn Fn(BoardEvent) + Send + Sync>;

/// State shared between the handle and the worker
#[derive(Default)]
struct Shared {
    position: AtomicI64,
    /// Negative while unknown
    duration: AtomicI64,
    media_sink: RwLock<Option<MediaCallback>>,
    board_sink: RwLock<Option<BoardCallback>>,
}

impl Shared {
    fn emit_media(&self, event: MediaEvent) {
        let sink = self.media_sink.read().ok().and_then(|sink| sink.clone());
        if let Some(sink) = sink {
            sink(event);
        }
    }

    fn emit_board(&self, event: BoardEvent) {
        let sink = self.board_sink.read().ok().and_then(|sink| sink.clone());
        if let Some(sink) = sink {
            sink(event);
        }
    }
}

/// Engine simulated on its own thread
pub struct SimulatedEngine {
    name: String,
    tx: Sender<Command>,
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
    worker_id: ThreadId,
}

impl SimulatedEngine {
    /// Spawn the worker thread
    pub fn spawn(name: impl Into<String>, settings: SimSettings) -> Result<Arc<Self>, SyncError> {
        let name = name.into();
        let (tx, rx) = channel::unbounded();
        let shared = Arc::new(Shared {
            duration: AtomicI64::new(-1),
            ..Shared::default()
        });

        let worker_shared = Arc::clone(&shared);
        let worker_name = name.clone();
        let handle = thread::Builder::new()
            .name(format!("sim-{}", name))
            .spawn(move || Worker::new(worker_name, settings, worker_shared).run(rx))?;

        Ok(Arc::new(Self {
            name,
            tx,
            shared,
            worker_id: handle.thread().id(),
            worker: Mutex::new(Some(handle)),
        }))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Inject a rebuffer of `duration_ms`
    pub fn stall(&self, duration_ms: u64) {
        self.send(Command::Stall(duration_ms));
    }

    /// Inject an engine error
    pub fn fail(&self, error: TrackError) {
        self.send(Command::Fail(error));
    }

    fn send(&self, command: Command) -> bool {
        if self.tx.send(command).is_err() {
            tracing::trace!(engine = %self.name, "command after shutdown dropped");
            return false;
        }
        true
    }

    fn shutdown(&self) {
        let handle = lock(&self.worker).take();
        let Some(handle) = handle else { return };
        self.send(Command::Shutdown);
        // The last handle may be dropped from inside one of our own callbacks
        if thread::current().id() == self.worker_id {
            return;
        }
        if handle.join().is_err() {
            tracing::error!(engine = %self.name, "simulated engine thread panicked");
        }
    }
}

impl Drop for SimulatedEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl MediaEngine for SimulatedEngine {
    fn set_event_sink(&self, sink: MediaEventSink) {
        if let Ok(mut slot) = self.shared.media_sink.write() {
            *slot = Some(Arc::from(sink));
        }
    }

    fn load(&self, source: &str) {
        self.send(Command::Load(source.to_string()));
    }

    fn set_play_when_ready(&self, play_when_ready: bool) {
        self.send(Command::PlayWhenReady(play_when_ready));
    }

    fn seek_to(&self, position_ms: TimeMs) {
        self.send(Command::Seek {
            position_ms,
            acknowledge: true,
        });
    }

    fn position(&self) -> TimeMs {
        self.shared.position.load(Ordering::SeqCst)
    }

    fn duration(&self) -> Option<TimeMs> {
        let duration = self.shared.duration.load(Ordering::SeqCst);
        (duration >= 0).then_some(duration)
    }

    fn set_speed(&self, speed: f32) {
        self.send(Command::Speed(f64::from(speed)));
    }

    fn release(&self) -> Result<(), TrackError> {
        self.shutdown();
        Ok(())
    }
}

impl BoardEngine for SimulatedEngine {
    fn set_board_sink(&self, sink: BoardEventSink) {
        if let Ok(mut slot) = self.shared.board_sink.write() {
            *slot = Some(Arc::from(sink));
        }
    }

    fn play(&self) {
        self.send(Command::PlayWhenReady(true));
    }

    fn pause(&self) {
        self.send(Command::PlayWhenReady(false));
    }

    fn stop(&self) -> Result<(), TrackError> {
        if !self.send(Command::Stop) {
            return Err(TrackError::Engine(format!("{} already shut down", self.name)));
        }
        self.shutdown();
        Ok(())
    }

    fn seek_to_schedule_time(&self, time_ms: TimeMs) {
        let time_ms = match self.duration() {
            Some(duration) => time_ms.clamp(0, duration),
            None => time_ms.max(0),
        };
        self.shared.position.store(time_ms, Ordering::SeqCst);
        self.send(Command::Seek {
            position_ms: time_ms,
            acknowledge: false,
        });
    }

    fn schedule_time(&self) -> TimeMs {
        self.position()
    }

    fn time_duration(&self) -> TimeMs {
        self.duration().unwrap_or(0)
    }

    fn set_playback_speed(&self, speed: f64) {
        self.send(Command::Speed(speed));
    }
}

impl std::fmt::Debug for SimulatedEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedEngine")
            .field("name", &self.name)
            .field("position", &self.position())
            .field("duration", &self.duration())
            .finish()
    }
}

/// State owned by the worker thread
struct Worker {
    name: String,
    settings: SimSettings,
    shared: Arc<Shared>,
    state: MediaState,
    play_when_ready: bool,
    speed: f64,
    buffer_until: Option<Instant>,
    pending_ack: Option<TimeMs>,
    first_frame: bool,
    last_tick: Instant,
}

impl Worker {
    fn new(name: String, settings: SimSettings, shared: Arc<Shared>) -> Self {
        Self {
            name,
            settings,
            shared,
            state: MediaState::Idle,
            play_when_ready: false,
            speed: 1.0,
            buffer_until: None,
            pending_ack: None,
            first_frame: true,
            last_tick: Instant::now(),
        }
    }

    fn run(mut self, rx: Receiver<Command>) {
        let ticker = channel::tick(Duration::from_millis(self.settings.tick_ms.max(1)));
        tracing::trace!(engine = %self.name, "simulated engine started");
        loop {
            crossbeam::select! {
                recv(rx) -> command => match command {
                    Ok(Command::Shutdown) | Err(_) => break,
                    Ok(command) => self.handle(command),
                },
                recv(ticker) -> _ => self.tick(),
            }
        }
        tracing::trace!(engine = %self.name, "simulated engine stopped");
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Load(source) => {
                let duration = self.settings.duration_of(&source);
                tracing::debug!(engine = %self.name, %source, duration, "loading");
                self.shared.duration.store(duration, Ordering::SeqCst);
                self.shared.position.store(0, Ordering::SeqCst);
                self.pending_ack = None;
                self.first_frame = true;
                self.buffer_for(self.settings.startup_buffer_ms);
            }
            Command::PlayWhenReady(play_when_ready) => {
                if self.play_when_ready != play_when_ready {
                    self.play_when_ready = play_when_ready;
                    if self.state != MediaState::Idle {
                        self.publish_state();
                    }
                }
            }
            Command::Seek { position_ms, acknowledge } => {
                if self.state == MediaState::Idle {
                    return;
                }
                let duration = self.shared.duration.load(Ordering::SeqCst).max(0);
                let position_ms = position_ms.clamp(0, duration);
                self.shared.position.store(position_ms, Ordering::SeqCst);
                if !acknowledge {
                    if self.state == MediaState::Ended && position_ms < duration {
                        self.set_state(MediaState::Ready);
                    }
                    return;
                }
                self.pending_ack = Some(position_ms);
                if self.settings.seek_buffer_ms > 0 {
                    self.buffer_for(self.settings.seek_buffer_ms);
                } else {
                    self.finish_buffering();
                }
            }
            Command::Speed(speed) => {
                if speed.is_finite() && speed > 0.0 {
                    self.speed = speed;
                }
            }
            Command::Stall(duration_ms) => {
                if matches!(self.state, MediaState::Ready | MediaState::Buffering) {
                    tracing::debug!(engine = %self.name, duration_ms, "stalling");
                    self.buffer_for(duration_ms);
                }
            }
            Command::Stop => {
                self.buffer_until = None;
                self.pending_ack = None;
                self.play_when_ready = false;
                self.state = MediaState::Idle;
                self.shared.emit_board(BoardEvent::Phase(BoardPhase::Stopped));
            }
            Command::Fail(error) => {
                self.shared.emit_media(MediaEvent::Error(error.clone()));
                self.shared.emit_board(BoardEvent::Error(error));
            }
            Command::Shutdown => {}
        }
    }

    fn tick(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_tick);
        self.last_tick = now;

        if let Some(until) = self.buffer_until {
            if now >= until {
                self.finish_buffering();
            }
            return;
        }
        if self.state != MediaState::Ready || !self.play_when_ready {
            return;
        }

        let advance = (elapsed.as_secs_f64() * 1000.0 * self.speed) as TimeMs;
        let duration = self.shared.duration.load(Ordering::SeqCst).max(0);
        let mut position = 0;
        let _ = self
            .shared
            .position
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                position = (current + advance).min(duration);
                Some(position)
            });
        if position >= duration {
            tracing::debug!(engine = %self.name, position, "end of media");
            self.set_state(MediaState::Ended);
        }
    }

    fn buffer_for(&mut self, duration_ms: u64) {
        self.buffer_until = Some(Instant::now() + Duration::from_millis(duration_ms));
        self.set_state(MediaState::Buffering);
    }

    fn finish_buffering(&mut self) {
        self.buffer_until = None;
        self.last_tick = Instant::now();
        self.first_frame = false;
        self.set_state(MediaState::Ready);
        if let Some(position_ms) = self.pending_ack.take() {
            self.shared.emit_media(MediaEvent::SeekProcessed { position_ms });
        }
    }

    fn set_state(&mut self, state: MediaState) {
        if self.state != state {
            self.state = state;
            self.publish_state();
        }
    }

    fn publish_state(&self) {
        self.shared.emit_media(MediaEvent::StateChanged {
            state: self.state,
            play_when_ready: self.play_when_ready,
        });
        let board_phase = match self.state {
            MediaState::Idle => return,
            MediaState::Buffering if self.first_frame => BoardPhase::WaitingFirstFrame,
            MediaState::Buffering => BoardPhase::Buffering,
            MediaState::Ready if self.play_when_ready => BoardPhase::Playing,
            MediaState::Ready => BoardPhase::Pause,
            MediaState::Ended => BoardPhase::Ended,
        };
        self.shared.emit_board(BoardEvent::Phase(board_phase));
    }
}
