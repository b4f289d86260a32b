//! Playback session manager
//!
//! The one owner of the audio engine handle. Every command takes the session
//! lock (a FIFO `tokio::sync::Mutex`), so commands from different screens are
//! applied in arrival order. The lock is only released while the engine is
//! loading a track; a command that arrives meanwhile supersedes the load,
//! which is detected afterwards by comparing load generations.

use crate::checkpoint::Checkpoints;
use crate::error::{PlaybackError, Result};
use crate::sleep_timer::{SleepTimerController, TimerHost};
use crate::store::{StateStore, Subscription};
use crate::types::{PlaybackConfig, PlaybackState, PlaybackStatus, SleepTimerSnapshot, Snapshot};
use crate::volume::{clamp_volume, FULL_VOLUME};
use animusic_core::{AudioEngine, AudioHandle, CheckpointStore, Track, TrackNavigator};
use async_trait::async_trait;
use std::sync::{Arc, PoisonError, RwLock, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// State guarded by the session lock
struct SessionInner {
    track: Option<Arc<Track>>,
    status: PlaybackStatus,
    position: Duration,
    duration: Duration,
    handle: Option<AudioHandle>,
    /// Bumped whenever the loaded (or loading) track is abandoned
    generation: u64,
    volume: f32,
    ticker: Option<JoinHandle<()>>,
    /// Periodic checkpoint write issued by the ticker, still in flight
    checkpoint_write: Option<JoinHandle<()>>,
    sleep_timer: SleepTimerController,
    completion_rx: Option<mpsc::UnboundedReceiver<u64>>,
    listener: Option<JoinHandle<()>>,
    shut_down: bool,
}

impl SessionInner {
    fn stop_ticker(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }

    /// Drop a pending periodic write so it cannot land after a newer one
    fn cancel_checkpoint_write(&mut self) {
        if let Some(write) = self.checkpoint_write.take() {
            write.abort();
        }
    }

    fn playback_state(&self) -> PlaybackState {
        match (&self.track, self.status) {
            (Some(track), status) if status != PlaybackStatus::Idle => PlaybackState::active(
                Arc::clone(track),
                status,
                self.position,
                self.duration,
            ),
            _ => PlaybackState::default(),
        }
    }

    fn clear_track(&mut self) {
        self.track = None;
        self.status = PlaybackStatus::Idle;
        self.position = Duration::ZERO;
        self.duration = Duration::ZERO;
    }
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        self.stop_ticker();
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
    }
}

struct Shared {
    engine: Arc<dyn AudioEngine>,
    checkpoints: Checkpoints,
    navigator: RwLock<Option<Arc<dyn TrackNavigator>>>,
    store: StateStore,
    config: PlaybackConfig,
    completion_tx: mpsc::UnboundedSender<u64>,
    inner: Mutex<SessionInner>,
}

/// Playback session manager
///
/// Create one per process and hand clones to every screen; clones share the
/// same session.
///
/// # Example
///
/// ```rust,no_run
/// use animusic_playback::{PlaybackConfig, PlaybackSession};
/// # use animusic_core::{AudioEngine, CheckpointStore, Track};
/// # use std::sync::Arc;
/// # async fn example(engine: Arc<dyn AudioEngine>, store: Arc<dyn CheckpointStore>) -> animusic_playback::Result<()> {
///
/// let session = PlaybackSession::new(engine, store, PlaybackConfig::default());
///
/// let _sub = session.subscribe(|snapshot| {
///     println!("{:?}", snapshot.playback.status);
/// });
///
/// session.play(Track::new("t1", "Opening", "Band", "/music/opening.mp3")).await?;
/// session.attach_sleep_timer(30, true).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct PlaybackSession {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for PlaybackSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackSession")
            .field("snapshot", &self.shared.store.snapshot())
            .finish_non_exhaustive()
    }
}

impl PlaybackSession {
    /// Create a session over an audio engine and a checkpoint store
    pub fn new(
        engine: Arc<dyn AudioEngine>,
        checkpoint_store: Arc<dyn CheckpointStore>,
        config: PlaybackConfig,
    ) -> Self {
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        let inner = SessionInner {
            track: None,
            status: PlaybackStatus::Idle,
            position: Duration::ZERO,
            duration: Duration::ZERO,
            handle: None,
            generation: 0,
            volume: FULL_VOLUME,
            ticker: None,
            checkpoint_write: None,
            sleep_timer: SleepTimerController::new(&config),
            completion_rx: Some(completion_rx),
            listener: None,
            shut_down: false,
        };

        Self {
            shared: Arc::new(Shared {
                engine,
                checkpoints: Checkpoints::new(checkpoint_store, config.checkpoint_retries),
                navigator: RwLock::new(None),
                store: StateStore::new(config.fade_window()),
                config,
                completion_tx,
                inner: Mutex::new(inner),
            }),
        }
    }

    /// Install the collaborator that picks tracks for skip commands
    pub fn set_navigator(&self, navigator: Option<Arc<dyn TrackNavigator>>) {
        *self
            .shared
            .navigator
            .write()
            .unwrap_or_else(PoisonError::into_inner) = navigator;
    }

    /// Session configuration
    pub fn config(&self) -> &PlaybackConfig {
        &self.shared.config
    }

    /// The state store subscribers render from
    pub fn store(&self) -> &StateStore {
        &self.shared.store
    }

    /// Current playback and sleep timer state
    pub fn snapshot(&self) -> Snapshot {
        self.shared.store.snapshot()
    }

    /// Register a callback invoked with every new snapshot
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&Snapshot) + Send + Sync + 'static,
    {
        self.shared.store.subscribe(callback)
    }

    /// Play a track
    ///
    /// Reselecting the track that is already playing (or loading) is a no-op;
    /// reselecting it while paused resumes it. Any other track replaces the
    /// current one and resumes from its checkpoint, if it has one.
    pub async fn play(&self, track: impl Into<Arc<Track>>) -> Result<()> {
        let track: Arc<Track> = track.into();

        let generation = {
            let mut inner = self.lock("play").await?;

            if inner.track.as_ref().map(|t| t.id()) == Some(track.id()) {
                match inner.status {
                    PlaybackStatus::Playing | PlaybackStatus::Loading => {
                        debug!(track_id = %track.id(), status = ?inner.status, "Track already selected");
                        return Ok(());
                    }
                    PlaybackStatus::Paused => return self.resume_locked(&mut inner).await,
                    PlaybackStatus::Idle | PlaybackStatus::Stopped => {}
                }
            }

            self.ensure_listener(&mut inner);
            self.release_current(&mut inner).await;

            inner.generation += 1;
            inner.track = Some(Arc::clone(&track));
            inner.status = PlaybackStatus::Loading;
            inner.position = Duration::ZERO;
            inner.duration = track.duration().unwrap_or_default();
            self.publish(&inner);
            inner.generation
        };

        info!(
            track_id = %track.id(),
            title = track.title(),
            source = ?track.source_kind(),
            "Loading track"
        );
        let loaded = self.shared.engine.load(track.source_uri()).await;

        let mut inner = self.shared.inner.lock().await;
        if inner.generation != generation {
            warn!(track_id = %track.id(), "Discarding superseded load");
            if let Ok(handle) = loaded {
                self.release_handle(handle).await;
            }
            return Err(PlaybackError::Superseded(track.id().clone()));
        }

        let handle = match loaded {
            Ok(handle) => handle,
            Err(err) => return Err(self.fail_load(&mut inner, &track, err.to_string())),
        };
        inner.handle = Some(handle);

        let tx = self.shared.completion_tx.clone();
        self.shared.engine.on_completion(
            handle,
            Box::new(move || {
                // Receiver gone means the session is shut down
                let _ = tx.send(generation);
            }),
        );

        let duration = match track.duration() {
            Some(duration) => duration,
            None => self
                .shared
                .engine
                .duration(handle)
                .await
                .unwrap_or_default(),
        };
        inner.duration = duration;

        let mut start = self.shared.checkpoints.restore(&track, duration).await;
        if let Some(position) = start {
            if let Err(err) = self.shared.engine.seek(handle, position).await {
                warn!(track_id = %track.id(), error = %err, "Seek to checkpoint failed, starting from 0");
                start = None;
            }
        }

        if let Err(err) = self.shared.engine.set_volume(handle, inner.volume).await {
            warn!(error = %err, "Failed to apply session volume");
        }

        if let Err(err) = self.shared.engine.play(handle).await {
            inner.handle = None;
            self.release_handle(handle).await;
            return Err(self.fail_load(&mut inner, &track, err.to_string()));
        }

        inner.status = PlaybackStatus::Playing;
        inner.position = start.unwrap_or_default();
        self.publish(&inner);
        self.start_ticker(&mut inner);

        info!(track_id = %track.id(), position = ?inner.position, "Playing");
        Ok(())
    }

    /// Pause playback, saving a checkpoint first
    pub async fn pause(&self) -> Result<()> {
        let mut inner = self.lock("pause").await?;
        self.pause_locked(&mut inner).await
    }

    /// Resume a paused track without reloading it
    pub async fn resume(&self) -> Result<()> {
        let mut inner = self.lock("resume").await?;
        self.resume_locked(&mut inner).await
    }

    /// Pause when playing, resume when paused
    pub async fn toggle_pause(&self) -> Result<()> {
        let mut inner = self.lock("toggle pause").await?;
        match inner.status {
            PlaybackStatus::Playing => self.pause_locked(&mut inner).await,
            PlaybackStatus::Paused => self.resume_locked(&mut inner).await,
            status => Err(PlaybackError::InvalidState {
                command: "toggle pause",
                status,
            }),
        }
    }

    /// Stop playback and release the audio handle
    ///
    /// Also cancels the sleep timer. Stopping an idle session only does the
    /// latter.
    pub async fn stop(&self) -> Result<()> {
        let mut inner = self.lock("stop").await?;
        if inner.status == PlaybackStatus::Idle {
            self.cancel_timer_locked(&mut inner).await;
            return Ok(());
        }
        self.stop_locked(&mut inner).await;
        Ok(())
    }

    /// Move the playhead, clamped to the track
    pub async fn seek(&self, position: Duration) -> Result<()> {
        let mut inner = self.lock("seek").await?;
        let handle = match (inner.status, inner.handle) {
            (PlaybackStatus::Playing | PlaybackStatus::Paused, Some(handle)) => handle,
            (status, _) => {
                return Err(PlaybackError::InvalidState {
                    command: "seek",
                    status,
                })
            }
        };

        let position = if inner.duration.is_zero() {
            position
        } else {
            position.min(inner.duration)
        };

        self.shared.engine.seek(handle, position).await?;
        inner.position = position;
        self.publish(&inner);
        debug!(?position, "Seeked");
        Ok(())
    }

    /// Play the navigator's next track
    pub async fn skip_next(&self) -> Result<()> {
        self.skip("skip next", |nav, current| nav.next(current)).await
    }

    /// Play the navigator's previous track
    pub async fn skip_previous(&self) -> Result<()> {
        self.skip("skip previous", |nav, current| nav.previous(current))
            .await
    }

    /// Arm the sleep timer, replacing any outstanding one
    pub async fn attach_sleep_timer(
        &self,
        minutes: u32,
        fade_out: bool,
    ) -> Result<SleepTimerSnapshot> {
        let mut inner = self.lock("attach sleep timer").await?;
        let host: Arc<dyn TimerHost> = Arc::new(SessionTimerHost {
            shared: Arc::downgrade(&self.shared),
        });

        let (replaced, snapshot) = inner.sleep_timer.arm(minutes, fade_out, host)?;
        if replaced {
            self.set_volume_locked(&mut inner, FULL_VOLUME).await;
        }
        self.shared.store.set_sleep_timer(snapshot.clone());
        Ok(snapshot)
    }

    /// Cancel the sleep timer and restore full volume
    ///
    /// Returns false if no countdown was outstanding.
    pub async fn cancel_sleep_timer(&self) -> bool {
        let mut inner = self.shared.inner.lock().await;
        self.cancel_timer_locked(&mut inner).await
    }

    /// Stop everything and make the session inert
    pub async fn shutdown(&self) {
        let mut inner = self.shared.inner.lock().await;
        if inner.shut_down {
            return;
        }
        if inner.status == PlaybackStatus::Idle {
            self.cancel_timer_locked(&mut inner).await;
        } else {
            self.stop_locked(&mut inner).await;
        }
        if let Some(listener) = inner.listener.take() {
            listener.abort();
        }
        inner.completion_rx = None;
        inner.shut_down = true;
        info!("Playback session shut down");
    }

    async fn lock(&self, command: &'static str) -> Result<MutexGuard<'_, SessionInner>> {
        let inner = self.shared.inner.lock().await;
        if inner.shut_down {
            return Err(PlaybackError::InvalidState {
                command,
                status: inner.status,
            });
        }
        debug!(command, status = ?inner.status, "Command");
        Ok(inner)
    }

    fn publish(&self, inner: &SessionInner) {
        self.shared.store.set_playback(inner.playback_state());
    }

    async fn pause_locked(&self, inner: &mut SessionInner) -> Result<()> {
        let (handle, track) = match (inner.status, inner.handle, &inner.track) {
            (PlaybackStatus::Playing, Some(handle), Some(track)) => (handle, Arc::clone(track)),
            (status, ..) => {
                return Err(PlaybackError::InvalidState {
                    command: "pause",
                    status,
                })
            }
        };

        let position = self.current_position(inner, handle).await;
        inner.cancel_checkpoint_write();
        self.shared.checkpoints.save(track.id(), position).await;
        self.shared.engine.pause(handle).await?;

        inner.stop_ticker();
        inner.status = PlaybackStatus::Paused;
        inner.position = position;
        self.publish(inner);
        debug!(track_id = %track.id(), ?position, "Paused");
        Ok(())
    }

    async fn resume_locked(&self, inner: &mut SessionInner) -> Result<()> {
        let handle = match (inner.status, inner.handle) {
            (PlaybackStatus::Paused, Some(handle)) => handle,
            (status, _) => {
                return Err(PlaybackError::InvalidState {
                    command: "resume",
                    status,
                })
            }
        };

        self.shared.engine.play(handle).await?;
        inner.status = PlaybackStatus::Playing;
        self.publish(inner);
        self.start_ticker(inner);
        debug!("Resumed");
        Ok(())
    }

    /// Save the current track's checkpoint and release its handle
    async fn release_current(&self, inner: &mut SessionInner) {
        inner.stop_ticker();
        if let (Some(handle), Some(track)) = (inner.handle, inner.track.clone()) {
            if inner.status.is_active() {
                let position = self.current_position(inner, handle).await;
                inner.cancel_checkpoint_write();
                self.shared.checkpoints.save(track.id(), position).await;
            }
        }
        if let Some(handle) = inner.handle.take() {
            self.release_handle(handle).await;
        }
    }

    async fn stop_locked(&self, inner: &mut SessionInner) {
        self.release_current(inner).await;
        self.cancel_timer_locked(inner).await;
        inner.generation += 1;

        if let Some(track) = &inner.track {
            info!(track_id = %track.id(), "Stopped");
        }
        inner.status = PlaybackStatus::Stopped;
        self.publish(inner);
        inner.clear_track();
        self.publish(inner);
    }

    fn fail_load(&self, inner: &mut SessionInner, track: &Track, reason: String) -> PlaybackError {
        warn!(track_id = %track.id(), %reason, "Track failed to load");
        inner.generation += 1;
        inner.clear_track();
        self.publish(inner);
        PlaybackError::LoadFailed {
            track_id: track.id().clone(),
            reason,
        }
    }

    async fn release_handle(&self, handle: AudioHandle) {
        if let Err(err) = self.shared.engine.stop(handle).await {
            warn!(%handle, error = %err, "Failed to release audio handle");
        }
    }

    /// Engine position, clamped to the track; falls back to the last known
    async fn current_position(&self, inner: &SessionInner, handle: AudioHandle) -> Duration {
        match self.shared.engine.position(handle).await {
            Ok(position) if inner.duration.is_zero() => position,
            Ok(position) => position.min(inner.duration),
            Err(err) => {
                warn!(error = %err, "Failed to read position");
                inner.position
            }
        }
    }

    async fn cancel_timer_locked(&self, inner: &mut SessionInner) -> bool {
        if !inner.sleep_timer.cancel() {
            return false;
        }
        self.set_volume_locked(inner, FULL_VOLUME).await;
        self.shared.store.set_sleep_timer(inner.sleep_timer.snapshot());
        true
    }

    async fn set_volume_locked(&self, inner: &mut SessionInner, volume: f32) {
        let volume = clamp_volume(volume);
        if (inner.volume - volume).abs() < f32::EPSILON {
            return;
        }
        inner.volume = volume;
        if let Some(handle) = inner.handle {
            if let Err(err) = self.shared.engine.set_volume(handle, volume).await {
                warn!(%handle, error = %err, "Failed to set volume");
            }
        }
    }

    async fn skip<F>(&self, command: &'static str, pick: F) -> Result<()>
    where
        F: FnOnce(&dyn TrackNavigator, Option<&Track>) -> Option<Track>,
    {
        let current = self.lock(command).await?.track.clone();
        let next = self
            .navigator()
            .and_then(|nav| pick(nav.as_ref(), current.as_deref()))
            .ok_or(PlaybackError::NoTrackAvailable)?;

        debug!(command, track_id = %next.id(), "Skipping");
        self.play(next).await
    }

    fn navigator(&self) -> Option<Arc<dyn TrackNavigator>> {
        self.shared
            .navigator
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn start_ticker(&self, inner: &mut SessionInner) {
        inner.stop_ticker();
        inner.ticker = Some(tokio::spawn(run_ticker(
            Arc::downgrade(&self.shared),
            inner.generation,
        )));
    }

    fn ensure_listener(&self, inner: &mut SessionInner) {
        if let Some(rx) = inner.completion_rx.take() {
            inner.listener = Some(tokio::spawn(run_completion_listener(
                Arc::downgrade(&self.shared),
                rx,
            )));
        }
    }

    /// Natural end of the track loaded under `generation`
    async fn handle_completion(&self, generation: u64) {
        let next = {
            let mut inner = self.shared.inner.lock().await;
            if inner.shut_down || inner.generation != generation || !inner.status.is_active() {
                debug!(generation, "Ignoring stale completion");
                return;
            }
            let Some(track) = inner.track.clone() else {
                return;
            };

            inner.stop_ticker();
            inner.cancel_checkpoint_write();
            self.shared.checkpoints.reset(track.id()).await;
            if let Some(handle) = inner.handle.take() {
                self.release_handle(handle).await;
            }
            inner.generation += 1;

            info!(track_id = %track.id(), "Track finished");
            inner.status = PlaybackStatus::Stopped;
            inner.position = inner.duration;
            self.publish(&inner);
            inner.clear_track();
            self.publish(&inner);

            if self.shared.config.advance_on_completion {
                self.navigator()
                    .and_then(|nav| nav.next(Some(track.as_ref())))
            } else {
                None
            }
        };

        if let Some(next) = next {
            if let Err(err) = self.play(next).await {
                warn!(error = %err, "Failed to advance after completion");
            }
        }
    }
}

async fn run_completion_listener(shared: Weak<Shared>, mut rx: mpsc::UnboundedReceiver<u64>) {
    while let Some(generation) = rx.recv().await {
        let Some(shared) = shared.upgrade() else {
            break;
        };
        PlaybackSession { shared }
            .handle_completion(generation)
            .await;
    }
}

/// Position poll while playing; also issues periodic checkpoints
///
/// The write itself runs in its own task so a slow store never holds the
/// session lock.
async fn run_ticker(shared: Weak<Shared>, generation: u64) {
    let (poll, checkpoint_every) = match shared.upgrade() {
        Some(shared) => (
            shared.config.position_poll(),
            shared.config.checkpoint_interval(),
        ),
        None => return,
    };
    let mut interval = tokio::time::interval_at(Instant::now() + poll, poll);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_checkpoint = Instant::now();

    loop {
        interval.tick().await;
        let Some(shared) = shared.upgrade() else {
            break;
        };
        let session = PlaybackSession { shared };
        let mut inner = session.shared.inner.lock().await;

        let (handle, track) = match (&inner.track, inner.handle) {
            (Some(track), Some(handle))
                if inner.generation == generation && inner.status == PlaybackStatus::Playing =>
            {
                (handle, Arc::clone(track))
            }
            _ => break,
        };

        let position = match session.shared.engine.position(handle).await {
            Ok(position) => position,
            Err(err) => {
                warn!(error = %err, "Position poll failed");
                continue;
            }
        };
        let mut position = position.max(inner.position);
        if !inner.duration.is_zero() {
            position = position.min(inner.duration);
        }
        if position != inner.position {
            inner.position = position;
            session.publish(&inner);
        }

        let write_pending = inner
            .checkpoint_write
            .as_ref()
            .is_some_and(|write| !write.is_finished());
        if last_checkpoint.elapsed() >= checkpoint_every && !write_pending {
            last_checkpoint = Instant::now();
            let checkpoints = session.shared.checkpoints.clone();
            let track_id = track.id().clone();
            inner.checkpoint_write = Some(tokio::spawn(async move {
                checkpoints.save(&track_id, position).await;
            }));
        }
    }
}

/// Routes sleep timer events into the session under its lock
struct SessionTimerHost {
    shared: Weak<Shared>,
}

impl SessionTimerHost {
    fn session(&self) -> Option<PlaybackSession> {
        self.shared.upgrade().map(|shared| PlaybackSession { shared })
    }
}

#[async_trait]
impl TimerHost for SessionTimerHost {
    async fn begin_fade(&self, generation: u64) -> bool {
        let Some(session) = self.session() else {
            return false;
        };
        let mut inner = session.shared.inner.lock().await;
        if !inner.sleep_timer.begin_fade(generation) {
            return false;
        }
        session
            .shared
            .store
            .set_sleep_timer(inner.sleep_timer.snapshot());
        true
    }

    async fn fade_step(&self, generation: u64, volume: f32) -> bool {
        let Some(session) = self.session() else {
            return false;
        };
        let mut inner = session.shared.inner.lock().await;
        if !inner.sleep_timer.is_current(generation) {
            return false;
        }
        session.set_volume_locked(&mut inner, volume).await;
        true
    }

    async fn expire(&self, generation: u64) {
        let Some(session) = self.session() else {
            return;
        };
        let mut inner = session.shared.inner.lock().await;
        if !inner.sleep_timer.begin_fire(generation) {
            return;
        }
        session
            .shared
            .store
            .set_sleep_timer(inner.sleep_timer.snapshot());

        if inner.status != PlaybackStatus::Idle {
            session.stop_locked(&mut inner).await;
        }

        inner.sleep_timer.finish(generation);
        session.set_volume_locked(&mut inner, FULL_VOLUME).await;
        session
            .shared
            .store
            .set_sleep_timer(inner.sleep_timer.snapshot());
    }
}
