//! Replay synchronization settings.

use crate::core::time::TimeMs;
use crate::error::SyncError;
use crate::playback::sync::{DriftCorrector, DRIFT_THRESHOLD_MS};

/// Environment variable overriding `drift_threshold_ms`
pub const ENV_DRIFT_MS: &str = "SYNCPLAY_DRIFT_MS";
/// Environment variable overriding `tick_interval_ms`
pub const ENV_TICK_MS: &str = "SYNCPLAY_TICK_MS";

/// Settings for coordinators and replay sessions
#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    /// Tolerance before a child track is re-seeked
    pub drift_threshold_ms: TimeMs,
    /// Period of the session's sync/position tick
    pub tick_interval_ms: u64,
    /// Child whose position is the coordinator's current time; `None` uses the furthest child
    pub reference_track: Option<usize>,
    /// Pause and rewind to 0 when the whole replay ends
    pub rewind_on_end: bool,
    /// Buffered events per session subscriber
    pub event_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            drift_threshold_ms: DRIFT_THRESHOLD_MS,
            tick_interval_ms: 500,
            reference_track: None,
            rewind_on_end: true,
            event_capacity: 64,
        }
    }
}

impl SyncConfig {
    /// Defaults, overridden by `SYNCPLAY_DRIFT_MS` / `SYNCPLAY_TICK_MS` when set
    pub fn from_env() -> Result<Self, SyncError> {
        let mut config = Self::default();
        if let Some(drift) = read_env(ENV_DRIFT_MS)? {
            config.drift_threshold_ms = drift;
        }
        if let Some(tick) = read_env(ENV_TICK_MS)? {
            config.tick_interval_ms = tick;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn with_drift_threshold(mut self, threshold_ms: TimeMs) -> Self {
        self.drift_threshold_ms = threshold_ms;
        self
    }

    pub fn with_tick_interval(mut self, tick_interval_ms: u64) -> Self {
        self.tick_interval_ms = tick_interval_ms;
        self
    }

    pub fn with_reference_track(mut self, index: usize) -> Self {
        self.reference_track = Some(index);
        self
    }

    pub fn with_rewind_on_end(mut self, rewind: bool) -> Self {
        self.rewind_on_end = rewind;
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<(), SyncError> {
        if self.drift_threshold_ms < 0 {
            return Err(SyncError::Config(format!(
                "drift_threshold_ms must be >= 0, got {}",
                self.drift_threshold_ms
            )));
        }
        if self.tick_interval_ms == 0 {
            return Err(SyncError::Config("tick_interval_ms must be > 0".to_string()));
        }
        if self.event_capacity == 0 {
            return Err(SyncError::Config("event_capacity must be > 0".to_string()));
        }
        Ok(())
    }

    /// Drift corrector for these settings
    pub fn drift_corrector(&self) -> DriftCorrector {
        DriftCorrector::new(self.drift_threshold_ms)
    }
}

fn read_env<T: std::str::FromStr>(key: &str) -> Result<Option<T>, SyncError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| SyncError::Config(format!("{} is not a valid number: {:?}", key, raw))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.drift_threshold_ms, 1_000);
        assert_eq!(config.tick_interval_ms, 500);
        assert_eq!(config.reference_track, None);
        assert!(config.rewind_on_end);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = SyncConfig::default()
            .with_drift_threshold(250)
            .with_tick_interval(100)
            .with_reference_track(1)
            .with_rewind_on_end(false);
        assert_eq!(config.drift_corrector().threshold_ms(), 250);
        assert_eq!(config.tick_interval_ms, 100);
        assert_eq!(config.reference_track, Some(1));
        assert!(!config.rewind_on_end);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(SyncConfig::default().with_tick_interval(0).validate().is_err());
        assert!(SyncConfig::default().with_drift_threshold(-1).validate().is_err());
        assert!(SyncConfig::default().with_event_capacity(0).validate().is_err());
    }
}
