/// Collaborator traits consumed by the playback engine
use crate::error::Result;
use crate::types::{AudioHandle, Track, TrackId};
use async_trait::async_trait;
use std::time::Duration;

/// Callback fired once when a loaded track reaches its natural end
///
/// May be invoked from any thread, including the platform's audio thread.
pub type CompletionCallback = Box<dyn FnOnce() + Send + 'static>;

/// Native audio engine adapter
///
/// Wraps exactly one platform player. The playback session is its only
/// writer and never issues a second `load` without releasing or abandoning
/// the first.
#[async_trait]
pub trait AudioEngine: Send + Sync {
    /// Open and prepare a local path or remote URL for playback
    ///
    /// # Errors
    /// Returns an error if the source is missing, unreachable, or undecodable
    async fn load(&self, uri: &str) -> Result<AudioHandle>;

    /// Start or continue output
    async fn play(&self, handle: AudioHandle) -> Result<()>;

    /// Suspend output, keeping the position
    async fn pause(&self, handle: AudioHandle) -> Result<()>;

    /// Stop output and release the native resource
    ///
    /// The handle must not be used afterwards.
    async fn stop(&self, handle: AudioHandle) -> Result<()>;

    /// Move the playhead
    async fn seek(&self, handle: AudioHandle, position: Duration) -> Result<()>;

    /// Current playhead position
    async fn position(&self, handle: AudioHandle) -> Result<Duration>;

    /// Total duration, once the engine knows it
    async fn duration(&self, handle: AudioHandle) -> Option<Duration> {
        let _ = handle;
        None
    }

    /// Set output gain (0.0 = silent, 1.0 = full volume)
    async fn set_volume(&self, handle: AudioHandle, volume: f32) -> Result<()>;

    /// Register the end-of-track callback for a loaded handle
    fn on_completion(&self, handle: AudioHandle, callback: CompletionCallback);
}

/// Durable key-value store for per-track resume positions
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Last stored position for a track, if any
    async fn get(&self, track_id: &TrackId) -> Result<Option<Duration>>;

    /// Store the position for a track, replacing any previous value
    async fn set(&self, track_id: &TrackId, position: Duration) -> Result<()>;
}

/// Caller-supplied track selection for skip commands
///
/// The engine has no queue of its own; whatever list the current screen shows
/// decides what "next" and "previous" mean.
pub trait TrackNavigator: Send + Sync {
    /// Track after `current`, or `None` when there is nothing to skip to
    fn next(&self, current: Option<&Track>) -> Option<Track>;

    /// Track before `current`, or `None` when there is nothing to skip to
    fn previous(&self, current: Option<&Track>) -> Option<Track>;
}
