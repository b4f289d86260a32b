//! Best-effort checkpoint persistence
//!
//! Wraps a [`CheckpointStore`] with the resume rules the session relies on.
//! Failures are retried, logged, and swallowed: checkpoint I/O never blocks
//! or fails playback.

use crate::error::PlaybackError;
use animusic_core::{CheckpointStore, Track, TrackId};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Checkpoint reader/writer used by the session
#[derive(Clone)]
pub struct Checkpoints {
    store: Arc<dyn CheckpointStore>,
    retries: u32,
}

impl std::fmt::Debug for Checkpoints {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Checkpoints")
            .field("retries", &self.retries)
            .finish_non_exhaustive()
    }
}

impl Checkpoints {
    /// Wrap a store; failed calls are attempted `retries` more times
    pub fn new(store: Arc<dyn CheckpointStore>, retries: u32) -> Self {
        Self { store, retries }
    }

    /// Position to resume `track` from, if a usable checkpoint exists
    ///
    /// Zero, out-of-range, and unreadable checkpoints all mean "start at 0".
    pub async fn restore(&self, track: &Track, duration: Duration) -> Option<Duration> {
        let id = track.id();
        let stored = match self.read(id).await {
            Ok(stored) => stored?,
            Err(err) => {
                warn!(track_id = %id, error = %err, "Checkpoint read failed, starting from 0");
                return None;
            }
        };

        if stored.is_zero() {
            return None;
        }
        if !duration.is_zero() && stored >= duration {
            debug!(track_id = %id, ?stored, ?duration, "Ignoring checkpoint past end of track");
            return None;
        }

        debug!(track_id = %id, position = ?stored, "Restoring checkpoint");
        Some(stored)
    }

    /// Store a position; zero positions are skipped
    pub async fn save(&self, id: &TrackId, position: Duration) {
        if position.is_zero() {
            return;
        }
        self.write(id, position).await;
    }

    /// Forget the resume point so the next play starts from the beginning
    pub async fn reset(&self, id: &TrackId) {
        self.write(id, Duration::ZERO).await;
    }

    async fn write(&self, id: &TrackId, position: Duration) {
        let mut attempt = 0;
        loop {
            match self.store.set(id, position).await {
                Ok(()) => {
                    debug!(track_id = %id, ?position, "Checkpoint saved");
                    return;
                }
                Err(err) if attempt < self.retries => {
                    attempt += 1;
                    debug!(track_id = %id, attempt, error = %err, "Retrying checkpoint write");
                }
                Err(err) => {
                    let err = PlaybackError::CheckpointIo(err.to_string());
                    warn!(track_id = %id, error = %err, "Checkpoint write failed");
                    return;
                }
            }
        }
    }

    async fn read(&self, id: &TrackId) -> Result<Option<Duration>, PlaybackError> {
        let mut attempt = 0;
        loop {
            match self.store.get(id).await {
                Ok(position) => return Ok(position),
                Err(err) if attempt < self.retries => {
                    attempt += 1;
                    debug!(track_id = %id, attempt, error = %err, "Retrying checkpoint read");
                }
                Err(err) => return Err(PlaybackError::CheckpointIo(err.to_string())),
            }
        }
    }
}
