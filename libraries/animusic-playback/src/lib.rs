//! AniMusic - Playback Sessions
//!
//! The playback engine behind every AniMusic screen.
//!
//! This crate provides:
//! - A single playback session that owns the audio engine handle
//! - Serialized play/pause/resume/stop/seek/skip commands
//! - Checkpoint resume (per-track last position, saved while playing)
//! - A sleep timer with an optional linear fade-out
//! - An observable state store for UI subscribers
//!
//! # Architecture
//!
//! `animusic-playback` is platform-agnostic. The native player, durable
//! storage, and track lists are injected through the traits in
//! `animusic-core`:
//! - [`AudioEngine`](animusic_core::AudioEngine) plays one handle at a time
//! - [`CheckpointStore`](animusic_core::CheckpointStore) persists positions
//! - [`TrackNavigator`](animusic_core::TrackNavigator) answers skip commands
//!
//! Timers and background polling run on the ambient Tokio runtime.
//!
//! # Example
//!
//! ```rust,no_run
//! use animusic_playback::{PlaybackConfig, PlaybackSession, SleepTimerState};
//! # use animusic_core::{AudioEngine, CheckpointStore, Track};
//! # use std::sync::Arc;
//! # async fn example(engine: Arc<dyn AudioEngine>, store: Arc<dyn CheckpointStore>) -> animusic_playback::Result<()> {
//!
//! let config = PlaybackConfig::load(None)?;
//! let session = PlaybackSession::new(engine, store, config);
//!
//! let track = Track::new("t1", "Opening", "Band", "https://cdn.example.com/t1.mp3");
//! session.play(track.clone()).await?;
//!
//! // Reselecting from another screen does not restart the track
//! session.play(track).await?;
//!
//! let timer = session.attach_sleep_timer(15, true).await?;
//! assert_eq!(timer.state, SleepTimerState::Armed);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod checkpoint;
pub mod config;
pub mod error;
pub mod session;
mod sleep_timer;
pub mod store;
pub mod types;
pub mod volume;

// Re-export main types
pub use checkpoint::Checkpoints;
pub use error::{PlaybackError, Result};
pub use session::PlaybackSession;
pub use store::{StateStore, Subscription};
pub use types::{
    PlaybackConfig, PlaybackState, PlaybackStatus, SleepTimerSnapshot, SleepTimerState, Snapshot,
};
pub use volume::{FadeRamp, FULL_VOLUME};
