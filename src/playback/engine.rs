//! Replay session driving a combined track from a worker thread.
//! Commands travel over a crossbeam channel; events fan out on an `EventBus`.

use crossbeam::channel::{self, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tokio::sync::broadcast;

use crate::config::SyncConfig;
use crate::core::phase::Phase;
use crate::core::time::TimeMs;
use crate::core::track::{lock, Track, TrackListener};
use crate::error::{SyncError, TrackError};
use crate::playback::coordinator::combine;
use crate::playback::events::{EventBus, ReplayEvent};

/// Command sent to the session worker
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    Play,
    Pause,
    Seek(TimeMs),
    SetSpeed(f32),
    /// Pause and rewind to the start
    Stop,
    Shutdown,
}

/// Owner of a replay: one combined track, its tick worker and its event bus
pub struct ReplaySession {
    root: Arc<dyn Track>,
    clock: Arc<dyn Track>,
    bus: EventBus,
    command_tx: Sender<SessionCommand>,
    worker: Mutex<Option<thread::JoinHandle<()>>>,
    closed: AtomicBool,
}

impl ReplaySession {
    /// Combine `tracks` and start the session worker.
    ///
    /// `clock_index` selects the authoritative track whose position drives
    /// drift correction; it also becomes the coordinator's reference track
    /// unless `config` names one.
    pub fn start(
        tracks: Vec<Arc<dyn Track>>,
        clock_index: usize,
        mut config: SyncConfig,
    ) -> Result<Self, SyncError> {
        config.validate()?;
        if tracks.is_empty() {
            return Err(SyncError::NoTracks);
        }
        let clock = tracks
            .get(clock_index)
            .cloned()
            .ok_or(SyncError::InvalidReference {
                index: clock_index,
                len: tracks.len(),
            })?;
        config.reference_track.get_or_insert(clock_index);

        let root = combine(tracks, &config)?;
        let bus = EventBus::new(config.event_capacity);
        let (command_tx, command_rx) = channel::unbounded();

        root.set_listener(Some(Arc::new(SessionListener {
            bus: bus.clone(),
            commands: command_tx.clone(),
            rewind_on_end: config.rewind_on_end,
        })));

        let worker = SessionWorker {
            root: Arc::clone(&root),
            clock: Arc::clone(&clock),
            bus: bus.clone(),
            interval: Duration::from_millis(config.tick_interval_ms),
        };
        let handle = thread::Builder::new()
            .name("replay-session".to_string())
            .spawn(move || worker.run(command_rx))?;

        tracing::info!(
            root = root.name(),
            clock = clock.name(),
            tick_ms = config.tick_interval_ms,
            "replay session started"
        );

        Ok(Self {
            root,
            clock,
            bus,
            command_tx,
            worker: Mutex::new(Some(handle)),
            closed: AtomicBool::new(false),
        })
    }

    pub fn play(&self) -> Result<(), SyncError> {
        self.send(SessionCommand::Play)
    }

    pub fn pause(&self) -> Result<(), SyncError> {
        self.send(SessionCommand::Pause)
    }

    pub fn seek(&self, time_ms: TimeMs) -> Result<(), SyncError> {
        self.send(SessionCommand::Seek(time_ms))
    }

    pub fn set_playback_speed(&self, speed: f32) -> Result<(), SyncError> {
        self.send(SessionCommand::SetSpeed(speed))
    }

    pub fn stop(&self) -> Result<(), SyncError> {
        self.send(SessionCommand::Stop)
    }

    /// New receiver for the session's events
    pub fn subscribe(&self) -> broadcast::Receiver<ReplayEvent> {
        self.bus.subscribe()
    }

    /// Combined track driven by this session
    pub fn root(&self) -> &Arc<dyn Track> {
        &self.root
    }

    /// Position of the authoritative track
    pub fn current_time(&self) -> TimeMs {
        self.clock.current_time()
    }

    pub fn duration(&self) -> TimeMs {
        self.root.duration()
    }

    pub fn phase(&self) -> Phase {
        self.root.phase()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Stop the worker and release every track. Safe to call more than once.
    pub fn close(&self) -> Result<(), SyncError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let _ = self.command_tx.send(SessionCommand::Shutdown);
        let handle = lock(&self.worker).take();
        let joined = match handle {
            Some(handle) => handle
                .join()
                .map_err(|_| SyncError::Thread("replay session worker panicked".to_string())),
            None => Ok(()),
        };

        self.root.set_listener(None);
        if let Err(error) = self.root.release() {
            tracing::warn!(root = self.root.name(), %error, "release failed");
        }
        self.bus.publish(ReplayEvent::Closed);
        tracing::info!(root = self.root.name(), "replay session closed");
        joined
    }

    fn send(&self, command: SessionCommand) -> Result<(), SyncError> {
        if self.is_closed() {
            return Err(SyncError::SessionClosed);
        }
        self.command_tx
            .send(command)
            .map_err(|_| SyncError::SessionClosed)
    }
}

impl Drop for ReplaySession {
    fn drop(&mut self) {
        if let Err(error) = self.close() {
            tracing::error!(%error, "replay session shutdown failed");
        }
    }
}

/// State moved onto the worker thread
struct SessionWorker {
    root: Arc<dyn Track>,
    clock: Arc<dyn Track>,
    bus: EventBus,
    interval: Duration,
}

impl SessionWorker {
    fn run(self, commands: Receiver<SessionCommand>) {
        let ticker = channel::tick(self.interval);
        loop {
            crossbeam::select! {
                recv(commands) -> command => match command {
                    Ok(SessionCommand::Shutdown) | Err(_) => break,
                    Ok(command) => self.execute(command),
                },
                recv(ticker) -> _ => self.tick(),
            }
        }
        tracing::debug!(root = self.root.name(), "session worker stopped");
    }

    fn execute(&self, command: SessionCommand) {
        tracing::debug!(?command, "session command");
        match command {
            SessionCommand::Play => self.root.play(),
            SessionCommand::Pause => self.root.pause(),
            SessionCommand::Seek(time_ms) => self.root.seek(time_ms),
            SessionCommand::SetSpeed(speed) => self.root.set_playback_speed(speed),
            SessionCommand::Stop => self.root.stop(),
            SessionCommand::Shutdown => {}
        }
    }

    fn tick(&self) {
        if !self.root.phase().is_playing() {
            return;
        }
        let time_ms = self.clock.current_time();
        self.root.sync_time(time_ms);
        self.bus.publish(ReplayEvent::Position {
            time_ms,
            duration_ms: self.root.duration(),
        });
    }
}

/// Listener on the root track translating callbacks into replay events
struct SessionListener {
    bus: EventBus,
    commands: Sender<SessionCommand>,
    rewind_on_end: bool,
}

impl TrackListener for SessionListener {
    fn on_phase_changed(&self, source: &dyn Track, phase: Phase) {
        tracing::info!(track = source.name(), %phase, "replay phase");
        self.bus.publish(ReplayEvent::Phase(phase));
        if phase.is_ended() && self.rewind_on_end {
            let _ = self.commands.send(SessionCommand::Stop);
        }
    }

    fn on_seek_to(&self, _source: &dyn Track, time_ms: TimeMs) {
        self.bus.publish(ReplayEvent::SeekCompleted(time_ms));
    }

    fn on_error(&self, source: &dyn Track, error: &TrackError) {
        tracing::warn!(track = source.name(), %error, "track error");
        self.bus.publish(ReplayEvent::TrackError {
            track: source.name().to_string(),
            error: error.clone(),
        });
    }
}
