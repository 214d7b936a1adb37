//! Composite track that advances N child tracks as one logical timeline.
//!
//! Driving calls fan out to every child. Child notifications, which arrive on
//! arbitrary engine threads, are folded back into one logical phase and one
//! seek-completion stream. All bookkeeping lives behind a single mutex; the
//! resulting calls into children and the upward notifications are made after
//! that mutex is released, so children and listeners may call straight back in.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use crate::config::SyncConfig;
use crate::core::phase::Phase;
use crate::core::time::TimeMs;
use crate::core::track::{lock, Track, TrackCore, TrackListener};
use crate::error::{SyncError, TrackError};
use crate::playback::sync::DriftCorrector;

/// Reconciliation state, only touched under `Coordinator::state`
#[derive(Debug)]
struct CoordinatorState {
    /// Last phase each child reported
    reported: Vec<Phase>,
    /// Children paused by the coordinator because a sibling was buffering,
    /// until they report `Playing` again
    suppressed_pause: Vec<bool>,
    /// Children with an unacknowledged seek
    awaiting_seek: Vec<bool>,
    seek_target: Option<TimeMs>,
    /// Latest logical phase decision
    logical: Phase,
    /// Upward notifications in decision order
    outbox: VecDeque<Upward>,
    /// Some thread is delivering the outbox
    draining: bool,
}

impl CoordinatorState {
    fn new(reported: Vec<Phase>) -> Self {
        let count = reported.len();
        let logical = match reported.split_first() {
            Some((first, rest)) if rest.iter().all(|p| p == first) => *first,
            _ => Phase::Idle,
        };
        Self {
            reported,
            suppressed_pause: vec![false; count],
            awaiting_seek: vec![false; count],
            seek_target: None,
            logical,
            outbox: VecDeque::new(),
            draining: false,
        }
    }

    fn pending_seeks(&self) -> usize {
        self.awaiting_seek.iter().filter(|&&awaiting| awaiting).count()
    }

    fn decide(&mut self, phase: Phase) {
        if self.logical != phase {
            self.logical = phase;
            self.outbox.push_back(Upward::Phase(phase));
        }
    }
}

/// Child call decided by a reconciliation step, made without the lock held
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChildCall {
    Pause(usize),
    Play(usize),
}

/// Notification for the coordinator's own listener
#[derive(Debug)]
enum Upward {
    Phase(Phase),
    SeekSettled(TimeMs),
    Error(usize, TrackError),
}

/// Composite track synchronizing its children.
///
/// A coordinator is itself a [`Track`], so coordinators nest: a parent sees
/// one phase stream and one seek completion per seek from each child
/// coordinator, exactly as from a leaf track.
pub struct Coordinator {
    core: TrackCore,
    children: Vec<Arc<dyn Track>>,
    state: Mutex<CoordinatorState>,
    drift: DriftCorrector,
    reference: Option<usize>,
    released: AtomicBool,
}

impl Coordinator {
    /// Wrap `children` and register the coordinator as their listener.
    ///
    /// Fails if `children` is empty or the configured reference track is out
    /// of range.
    pub fn new(
        name: impl Into<String>,
        children: Vec<Arc<dyn Track>>,
        config: &SyncConfig,
    ) -> Result<Arc<Self>, SyncError> {
        if children.is_empty() {
            return Err(SyncError::NoTracks);
        }
        if let Some(index) = config.reference_track {
            if index >= children.len() {
                return Err(SyncError::InvalidReference {
                    index,
                    len: children.len(),
                });
            }
        }

        let state = CoordinatorState::new(children.iter().map(|child| child.phase()).collect());
        let initial = state.logical;
        let coordinator = Arc::new(Self {
            core: TrackCore::new(name),
            children,
            state: Mutex::new(state),
            drift: config.drift_corrector(),
            reference: config.reference_track,
            released: AtomicBool::new(false),
        });
        // No listener yet, so this only seeds the phase
        coordinator.core.update_phase(coordinator.as_ref(), initial);

        for (index, child) in coordinator.children.iter().enumerate() {
            child.set_listener(Some(Arc::new(ChildListener {
                index,
                coordinator: Arc::downgrade(&coordinator),
            })));
        }

        tracing::debug!(
            coordinator = coordinator.name(),
            children = coordinator.children.len(),
            "coordinator created"
        );
        Ok(coordinator)
    }

    pub fn children(&self) -> &[Arc<dyn Track>] {
        &self.children
    }

    /// Children currently paused on behalf of a buffering sibling
    pub fn suppressed_pauses(&self) -> Vec<usize> {
        let state = lock(&self.state);
        state
            .suppressed_pause
            .iter()
            .enumerate()
            .filter_map(|(index, &suppressed)| suppressed.then_some(index))
            .collect()
    }

    /// Number of children that have not yet acknowledged the latest seek
    pub fn pending_seeks(&self) -> usize {
        lock(&self.state).pending_seeks()
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    fn on_child_phase(&self, index: usize, phase: Phase) {
        let calls = {
            let mut state = lock(&self.state);
            if state.reported[index] == phase {
                tracing::trace!(
                    coordinator = self.name(),
                    child = self.children[index].name(),
                    %phase,
                    "ignoring repeated phase report"
                );
                return;
            }
            state.reported[index] = phase;
            tracing::debug!(
                coordinator = self.name(),
                child = self.children[index].name(),
                %phase,
                "child phase changed"
            );
            self.reconcile(&mut state, index, phase)
        };
        self.call_children(calls);
        self.deliver();
    }

    /// One reconciliation step for child `index` entering `phase`
    fn reconcile(&self, state: &mut CoordinatorState, index: usize, phase: Phase) -> Vec<ChildCall> {
        let mut calls = Vec::new();
        let siblings = (0..self.children.len()).filter(|&j| j != index);

        match phase {
            Phase::Idle => {}
            Phase::Buffering => {
                for j in siblings {
                    if state.reported[j].is_playing() {
                        state.suppressed_pause[j] = true;
                        calls.push(ChildCall::Pause(j));
                    }
                }
                state.decide(Phase::Buffering);
            }
            Phase::Pause if state.suppressed_pause[index] => {
                tracing::trace!(
                    coordinator = self.name(),
                    child = self.children[index].name(),
                    "pause echo of a buffering hold"
                );
            }
            Phase::Pause => {
                for j in siblings {
                    if state.reported[j].is_playing() {
                        calls.push(ChildCall::Pause(j));
                    }
                }
                state.decide(Phase::Pause);
            }
            Phase::Playing => {
                state.suppressed_pause[index] = false;
                // Held siblings stay marked until they report Playing themselves,
                // so a pause echo still in flight is not taken for a user pause
                for j in siblings {
                    if state.suppressed_pause[j] {
                        calls.push(ChildCall::Play(j));
                    }
                }
                // Ended children have nothing left to play and do not hold the timeline back
                let all_playing = state
                    .reported
                    .iter()
                    .all(|p| p.is_playing() || p.is_ended());
                if all_playing {
                    state.decide(Phase::Playing);
                }
            }
            Phase::End => {
                state.suppressed_pause[index] = false;
                if state.reported.iter().all(|p| p.is_ended()) {
                    state.decide(Phase::End);
                }
            }
        }
        calls
    }

    fn on_child_seek(&self, index: usize, achieved_ms: TimeMs) {
        {
            let mut state = lock(&self.state);
            if !state.awaiting_seek[index] {
                // Corrective seeks from drift correction land here too
                tracing::debug!(
                    coordinator = self.name(),
                    child = self.children[index].name(),
                    achieved_ms,
                    "ignoring seek completion without a pending seek"
                );
                return;
            }
            state.awaiting_seek[index] = false;
            let pending = state.pending_seeks();
            tracing::debug!(
                coordinator = self.name(),
                child = self.children[index].name(),
                achieved_ms,
                pending,
                "child seek completed"
            );
            if pending > 0 {
                return;
            }
            match state.seek_target.take() {
                Some(target) => state.outbox.push_back(Upward::SeekSettled(target)),
                None => return,
            }
        }
        self.deliver();
    }

    fn on_child_error(&self, index: usize, error: &TrackError) {
        lock(&self.state)
            .outbox
            .push_back(Upward::Error(index, error.clone()));
        self.deliver();
    }

    fn call_children(&self, calls: Vec<ChildCall>) {
        for call in calls {
            if self.is_released() {
                return;
            }
            match call {
                ChildCall::Pause(j) => {
                    tracing::debug!(coordinator = self.name(), child = self.children[j].name(), "holding child");
                    self.children[j].pause();
                }
                ChildCall::Play(j) => {
                    tracing::debug!(coordinator = self.name(), child = self.children[j].name(), "resuming held child");
                    self.children[j].play();
                }
            }
        }
    }

    /// Deliver queued upward notifications in order.
    ///
    /// Only one thread delivers at a time; a thread that finds delivery in
    /// progress leaves its notifications to the current deliverer, which also
    /// covers listeners calling back into the coordinator.
    fn deliver(&self) {
        {
            let mut state = lock(&self.state);
            if state.draining {
                return;
            }
            state.draining = true;
        }
        loop {
            let next = {
                let mut state = lock(&self.state);
                match state.outbox.pop_front() {
                    Some(next) => next,
                    None => {
                        state.draining = false;
                        return;
                    }
                }
            };
            if self.is_released() {
                continue;
            }
            match next {
                Upward::Phase(phase) => {
                    self.core.update_phase(self, phase);
                }
                Upward::SeekSettled(target) => {
                    tracing::debug!(coordinator = self.name(), target, "seek settled");
                    self.core.notify_seek(self, target);
                }
                Upward::Error(j, error) => {
                    if let Some(listener) = self.core.listener() {
                        listener.on_error(self.children[j].as_ref(), &error);
                    }
                }
            }
        }
    }
}

impl Track for Coordinator {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn play(&self) {
        if self.is_released() {
            return;
        }
        // An explicit intent supersedes any buffering hold
        lock(&self.state).suppressed_pause.fill(false);
        for child in &self.children {
            child.play();
        }
    }

    fn pause(&self) {
        if self.is_released() {
            return;
        }
        lock(&self.state).suppressed_pause.fill(false);
        for child in &self.children {
            child.pause();
        }
    }

    fn seek(&self, time_ms: TimeMs) {
        if self.is_released() {
            return;
        }
        {
            let mut state = lock(&self.state);
            state.awaiting_seek.fill(true);
            state.seek_target = Some(time_ms);
        }
        tracing::debug!(coordinator = self.name(), time_ms, children = self.children.len(), "seek");
        for child in &self.children {
            child.seek(time_ms);
        }
    }

    fn release(&self) -> Result<(), TrackError> {
        if self.released.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        for child in &self.children {
            child.set_listener(None);
        }
        for child in &self.children {
            if let Err(error) = child.release() {
                tracing::warn!(coordinator = self.name(), child = child.name(), %error, "child release failed");
            }
        }
        self.core.set_listener(None);
        tracing::debug!(coordinator = self.name(), "released");
        Ok(())
    }

    fn current_time(&self) -> TimeMs {
        match self.reference {
            Some(index) => self.children[index].current_time(),
            None => self
                .children
                .iter()
                .map(|child| child.current_time())
                .max()
                .unwrap_or(0),
        }
    }

    fn duration(&self) -> TimeMs {
        self.children
            .iter()
            .map(|child| child.duration())
            .max()
            .unwrap_or(0)
    }

    fn playback_speed(&self) -> f32 {
        self.core.playback_speed()
    }

    fn set_playback_speed(&self, speed: f32) {
        if let Some(speed) = self.core.set_playback_speed(speed) {
            for child in &self.children {
                child.set_playback_speed(speed);
            }
        }
    }

    fn phase(&self) -> Phase {
        self.core.phase()
    }

    fn set_listener(&self, listener: Option<Arc<dyn TrackListener>>) {
        self.core.set_listener(listener);
    }

    fn sync_time(&self, time_ms: TimeMs) {
        self.correct_drift(time_ms, &self.drift);
    }

    fn correct_drift(&self, time_ms: TimeMs, drift: &DriftCorrector) {
        if self.is_released() {
            return;
        }
        for child in &self.children {
            child.correct_drift(time_ms, drift);
        }
    }
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("name", &self.name())
            .field("children", &self.children.len())
            .field("state", &*lock(&self.state))
            .finish()
    }
}

/// Per-child listener routing callbacks into the owning coordinator
struct ChildListener {
    index: usize,
    coordinator: Weak<Coordinator>,
}

impl ChildListener {
    fn coordinator(&self) -> Option<Arc<Coordinator>> {
        self.coordinator
            .upgrade()
            .filter(|coordinator| !coordinator.is_released())
    }
}

impl TrackListener for ChildListener {
    fn on_phase_changed(&self, _source: &dyn Track, phase: Phase) {
        if let Some(coordinator) = self.coordinator() {
            coordinator.on_child_phase(self.index, phase);
        }
    }

    fn on_seek_to(&self, _source: &dyn Track, time_ms: TimeMs) {
        if let Some(coordinator) = self.coordinator() {
            coordinator.on_child_seek(self.index, time_ms);
        }
    }

    fn on_error(&self, _source: &dyn Track, error: &TrackError) {
        if let Some(coordinator) = self.coordinator() {
            coordinator.on_child_error(self.index, error);
        }
    }
}

/// Combine tracks into one logical track.
///
/// No tracks is an error, a single track is returned unchanged, and two or
/// more are wrapped in a [`Coordinator`].
pub fn combine(
    mut tracks: Vec<Arc<dyn Track>>,
    config: &SyncConfig,
) -> Result<Arc<dyn Track>, SyncError> {
    match tracks.len() {
        0 => Err(SyncError::NoTracks),
        1 => Ok(tracks.remove(0)),
        _ => {
            let name = tracks
                .iter()
                .map(|track| track.name())
                .collect::<Vec<_>>()
                .join("+");
            let coordinator: Arc<dyn Track> = Coordinator::new(name, tracks, config)?;
            Ok(coordinator)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed {
        core: TrackCore,
        position: TimeMs,
        duration: TimeMs,
    }

    impl Fixed {
        fn new(name: &str, position: TimeMs, duration: TimeMs) -> Arc<Self> {
            Arc::new(Self {
                core: TrackCore::new(name),
                position,
                duration,
            })
        }
    }

    impl Track for Fixed {
        fn name(&self) -> &str {
            self.core.name()
        }
        fn play(&self) {}
        fn pause(&self) {}
        fn seek(&self, _time_ms: TimeMs) {}
        fn release(&self) -> Result<(), TrackError> {
            Ok(())
        }
        fn current_time(&self) -> TimeMs {
            self.position
        }
        fn duration(&self) -> TimeMs {
            self.duration
        }
        fn playback_speed(&self) -> f32 {
            self.core.playback_speed()
        }
        fn set_playback_speed(&self, speed: f32) {
            self.core.set_playback_speed(speed);
        }
        fn phase(&self) -> Phase {
            self.core.phase()
        }
        fn set_listener(&self, listener: Option<Arc<dyn TrackListener>>) {
            self.core.set_listener(listener);
        }
    }

    #[test]
    fn test_empty_children_rejected() {
        let result = Coordinator::new("empty", Vec::new(), &SyncConfig::default());
        assert!(matches!(result, Err(SyncError::NoTracks)));
    }

    #[test]
    fn test_reference_out_of_range_rejected() {
        let config = SyncConfig::default().with_reference_track(2);
        let children: Vec<Arc<dyn Track>> = vec![Fixed::new("a", 0, 1), Fixed::new("b", 0, 1)];
        let result = Coordinator::new("bad", children, &config);
        assert!(matches!(result, Err(SyncError::InvalidReference { index: 2, len: 2 })));
    }

    #[test]
    fn test_current_time_uses_reference_or_max() {
        let children: Vec<Arc<dyn Track>> =
            vec![Fixed::new("video", 4_000, 10_000), Fixed::new("board", 4_200, 15_000)];

        let furthest = Coordinator::new("max", children.clone(), &SyncConfig::default()).unwrap();
        assert_eq!(furthest.current_time(), 4_200);
        assert_eq!(furthest.duration(), 15_000);

        let config = SyncConfig::default().with_reference_track(0);
        let referenced = Coordinator::new("ref", children, &config).unwrap();
        assert_eq!(referenced.current_time(), 4_000);
    }

    #[test]
    fn test_combine_single_track_is_passthrough() {
        let board: Arc<dyn Track> = Fixed::new("board", 0, 5_000);
        let combined = combine(vec![board.clone()], &SyncConfig::default()).unwrap();
        assert!(Arc::ptr_eq(&combined, &board));
    }

    #[test]
    fn test_combine_names_coordinator_after_children() {
        let tracks: Vec<Arc<dyn Track>> = vec![Fixed::new("video", 0, 1), Fixed::new("board", 0, 1)];
        let combined = combine(tracks, &SyncConfig::default()).unwrap();
        assert_eq!(combined.name(), "video+board");
        assert!(matches!(combine(Vec::new(), &SyncConfig::default()), Err(SyncError::NoTracks)));
    }

    #[test]
    fn test_speed_propagates_to_children() {
        let video = Fixed::new("video", 0, 1);
        let board = Fixed::new("board", 0, 1);
        let children: Vec<Arc<dyn Track>> = vec![video.clone(), board.clone()];
        let coordinator = Coordinator::new("speed", children, &SyncConfig::default()).unwrap();

        coordinator.set_playback_speed(1.5);
        assert_eq!(video.playback_speed(), 1.5);
        assert_eq!(board.playback_speed(), 1.5);

        coordinator.set_playback_speed(-1.0);
        assert_eq!(coordinator.playback_speed(), 1.5);
    }
}
