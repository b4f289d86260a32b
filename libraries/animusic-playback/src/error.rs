//! Error types for playback sessions

use crate::types::PlaybackStatus;
use animusic_core::{AnimusicError, TrackId};
use thiserror::Error;

/// Playback errors
///
/// Every variant is recoverable: the session is left in a well-defined state
/// and the error is only reported to the command's caller.
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// The audio engine could not open or start the track's source
    #[error("Failed to load track {track_id}: {reason}")]
    LoadFailed {
        /// Track that failed
        track_id: TrackId,
        /// Engine's description of the failure
        reason: String,
    },

    /// Skip requested with nothing to skip to
    #[error("No track available")]
    NoTrackAvailable,

    /// Checkpoint store read/write failed
    #[error("Checkpoint I/O error: {0}")]
    CheckpointIo(String),

    /// Sleep timer could not be armed
    #[error("Sleep timer scheduling error: {0}")]
    TimerScheduling(String),

    /// Command is not accepted from the current status
    #[error("Cannot {command} while {status:?}")]
    InvalidState {
        /// Rejected command
        command: &'static str,
        /// Status at the time
        status: PlaybackStatus,
    },

    /// A later command took over while this track was loading
    #[error("Load of track {0} was superseded")]
    Superseded(TrackId),

    /// Audio engine or other collaborator error
    #[error("Engine error: {0}")]
    Engine(#[from] AnimusicError),

    /// Configuration could not be loaded or is invalid
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<config::ConfigError> for PlaybackError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

/// Result type for playback operations
pub type Result<T> = std::result::Result<T, PlaybackError>;
