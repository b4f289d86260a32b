//! Core types for playback sessions

use animusic_core::Track;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Playback status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlaybackStatus {
    /// No track loaded
    Idle,

    /// Audio engine is opening the current track
    Loading,

    /// Currently playing
    Playing,

    /// Paused mid-track
    Paused,

    /// Transient: playback just ended, about to become Idle
    Stopped,
}

impl PlaybackStatus {
    /// Whether a handle is loaded and audible or resumable
    pub fn is_active(self) -> bool {
        matches!(self, Self::Playing | Self::Paused)
    }
}

/// Immutable view of the playback session
///
/// A new value is published on every transition; a published value is never
/// modified afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackState {
    /// Track currently loaded, loading, or paused
    pub current_track: Option<Arc<Track>>,

    /// Session status
    pub status: PlaybackStatus,

    /// Last known playhead position
    pub position: Duration,

    /// Track duration (zero while unknown)
    pub duration: Duration,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            current_track: None,
            status: PlaybackStatus::Idle,
            position: Duration::ZERO,
            duration: Duration::ZERO,
        }
    }
}

impl PlaybackState {
    /// Playing or paused state for a track
    pub(crate) fn active(
        track: Arc<Track>,
        status: PlaybackStatus,
        position: Duration,
        duration: Duration,
    ) -> Self {
        Self {
            current_track: Some(track),
            status,
            position,
            duration,
        }
    }

    /// Id of the current track, if any
    pub fn current_track_id(&self) -> Option<&animusic_core::TrackId> {
        self.current_track.as_deref().map(Track::id)
    }
}

/// Sleep timer lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SleepTimerState {
    /// No timer outstanding
    Inactive,

    /// Counting down at full volume
    Armed,

    /// Inside the fade-out window, volume ramping to zero
    FadingOut,

    /// Expired; the stop is being issued
    Fired,
}

/// Immutable view of the sleep timer
#[derive(Debug, Clone, PartialEq)]
pub struct SleepTimerSnapshot {
    /// Timer state
    pub state: SleepTimerState,

    /// Time left when this snapshot was published
    pub remaining: Duration,

    /// Whether the timer ends with a fade-out
    pub fade_enabled: bool,

    /// Length of the fade-out window
    pub fade_window: Duration,

    /// Expiry instant while armed
    pub deadline: Option<Instant>,
}

impl SleepTimerSnapshot {
    /// Snapshot for a session without a timer
    pub fn inactive(fade_window: Duration) -> Self {
        Self {
            state: SleepTimerState::Inactive,
            remaining: Duration::ZERO,
            fade_enabled: false,
            fade_window,
            deadline: None,
        }
    }

    /// Time left right now, for live countdown rendering
    pub fn remaining_now(&self) -> Duration {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
            .unwrap_or(Duration::ZERO)
    }

    /// Whether a countdown is outstanding
    pub fn is_running(&self) -> bool {
        matches!(
            self.state,
            SleepTimerState::Armed | SleepTimerState::FadingOut
        )
    }
}

/// Everything a subscriber renders from
///
/// Cloning is two reference-count bumps.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Current playback state
    pub playback: Arc<PlaybackState>,

    /// Current sleep timer state
    pub sleep_timer: Arc<SleepTimerSnapshot>,
}

impl Snapshot {
    /// Whether the playback part differs from `other`
    ///
    /// Published states are never mutated, so pointer identity is enough.
    pub fn playback_changed(&self, other: &Snapshot) -> bool {
        !Arc::ptr_eq(&self.playback, &other.playback)
    }

    /// Whether the sleep timer part differs from `other`
    pub fn sleep_timer_changed(&self, other: &Snapshot) -> bool {
        !Arc::ptr_eq(&self.sleep_timer, &other.sleep_timer)
    }
}

/// Configuration for playback sessions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Position ticker period while playing (default: 1000)
    pub position_poll_ms: u64,

    /// Minimum spacing of ticker checkpoint writes (default: 5)
    pub checkpoint_interval_secs: u64,

    /// Extra attempts for a checkpoint read/write (default: 1)
    pub checkpoint_retries: u32,

    /// Sleep timer fade-out window (default: 30)
    pub fade_window_secs: u64,

    /// Discrete volume steps across the fade window (default: 10)
    pub fade_steps: u32,

    /// Longest sleep timer accepted (default: 999)
    pub max_sleep_minutes: u32,

    /// Play the navigator's next track when a track ends (default: false)
    pub advance_on_completion: bool,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            position_poll_ms: 1000,
            checkpoint_interval_secs: 5,
            checkpoint_retries: 1,
            fade_window_secs: 30,
            fade_steps: 10,
            max_sleep_minutes: 999,
            advance_on_completion: false,
        }
    }
}

impl PlaybackConfig {
    /// Position ticker period
    pub fn position_poll(&self) -> Duration {
        Duration::from_millis(self.position_poll_ms)
    }

    /// Minimum spacing of ticker checkpoint writes
    pub fn checkpoint_interval(&self) -> Duration {
        Duration::from_secs(self.checkpoint_interval_secs)
    }

    /// Sleep timer fade-out window
    pub fn fade_window(&self) -> Duration {
        Duration::from_secs(self.fade_window_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = PlaybackConfig::default();
        assert_eq!(config.position_poll(), Duration::from_secs(1));
        assert_eq!(config.checkpoint_interval(), Duration::from_secs(5));
        assert_eq!(config.fade_window(), Duration::from_secs(30));
        assert_eq!(config.fade_steps, 10);
        assert_eq!(config.max_sleep_minutes, 999);
        assert!(!config.advance_on_completion);
    }

    #[test]
    fn default_state_is_idle() {
        let state = PlaybackState::default();
        assert_eq!(state.status, PlaybackStatus::Idle);
        assert!(state.current_track.is_none());
        assert_eq!(state.current_track_id(), None);
    }

    #[test]
    fn snapshot_change_detection_uses_identity() {
        let a = Snapshot {
            playback: Arc::new(PlaybackState::default()),
            sleep_timer: Arc::new(SleepTimerSnapshot::inactive(Duration::from_secs(30))),
        };
        let same = a.clone();
        let replaced = Snapshot {
            playback: Arc::new(PlaybackState::default()),
            ..a.clone()
        };

        assert!(!same.playback_changed(&a));
        assert!(replaced.playback_changed(&a));
        assert!(!replaced.sleep_timer_changed(&a));
    }

    #[test]
    fn inactive_timer_has_nothing_remaining() {
        let timer = SleepTimerSnapshot::inactive(Duration::from_secs(30));
        assert!(!timer.is_running());
        assert_eq!(timer.remaining_now(), Duration::ZERO);
    }
}
