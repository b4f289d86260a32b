//! Shared test helpers for playback integration tests
//!
//! `FakeAudioEngine` simulates a native player on the Tokio clock, so tests
//! running with `start_paused = true` can drive minutes of playback instantly.

#![allow(dead_code)]

use animusic_core::{
    AnimusicError, AudioEngine, AudioHandle, CheckpointStore, CompletionCallback, Result, Track,
    TrackId,
};
use animusic_playback::{PlaybackConfig, PlaybackSession};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;
use tokio::time::Instant;

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once per test binary)
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

struct Loaded {
    uri: String,
    base: Duration,
    playing_since: Option<Instant>,
    duration: Option<Duration>,
    completion: Option<CompletionCallback>,
}

impl Loaded {
    fn position(&self) -> Duration {
        let running = self
            .playing_since
            .map(|since| since.elapsed())
            .unwrap_or_default();
        let position = self.base + running;
        match self.duration {
            Some(duration) => position.min(duration),
            None => position,
        }
    }
}

#[derive(Default)]
struct EngineState {
    next_handle: u64,
    live: HashMap<AudioHandle, Loaded>,
    loads: Vec<String>,
    released: Vec<AudioHandle>,
    volume_log: Vec<(AudioHandle, Instant, f32)>,
    seeks: Vec<(AudioHandle, Duration)>,
    failing: HashSet<String>,
    delays: HashMap<String, Duration>,
    durations: HashMap<String, Duration>,
}

/// Simulated single-resource audio engine
#[derive(Default)]
pub struct FakeAudioEngine {
    state: Mutex<EngineState>,
}

impl FakeAudioEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn state(&self) -> std::sync::MutexGuard<'_, EngineState> {
        self.state.lock().unwrap()
    }

    /// Make every load of `uri` fail
    pub fn fail_uri(&self, uri: &str) {
        self.state().failing.insert(uri.to_string());
    }

    /// Make loads of `uri` take `delay` of simulated time
    pub fn delay_uri(&self, uri: &str, delay: Duration) {
        self.state().delays.insert(uri.to_string(), delay);
    }

    /// Duration the engine reports for `uri` once loaded
    pub fn set_duration(&self, uri: &str, duration: Duration) {
        self.state().durations.insert(uri.to_string(), duration);
    }

    /// URIs passed to `load`, in call order
    pub fn loads(&self) -> Vec<String> {
        self.state().loads.clone()
    }

    pub fn load_count(&self, uri: &str) -> usize {
        self.state().loads.iter().filter(|u| *u == uri).count()
    }

    /// Handles released through `stop`
    pub fn released(&self) -> Vec<AudioHandle> {
        self.state().released.clone()
    }

    /// Loaded handles and their URIs
    pub fn live(&self) -> Vec<(AudioHandle, String)> {
        self.state()
            .live
            .iter()
            .map(|(h, l)| (*h, l.uri.clone()))
            .collect()
    }

    /// Handles currently producing sound
    pub fn playing(&self) -> Vec<AudioHandle> {
        self.state()
            .live
            .iter()
            .filter(|(_, l)| l.playing_since.is_some())
            .map(|(h, _)| *h)
            .collect()
    }

    /// The single loaded handle; panics if there is not exactly one
    pub fn current(&self) -> AudioHandle {
        let live = self.live();
        assert_eq!(live.len(), 1, "expected exactly one live handle: {live:?}");
        live[0].0
    }

    pub fn position_of(&self, handle: AudioHandle) -> Option<Duration> {
        self.state().live.get(&handle).map(Loaded::position)
    }

    pub fn seeks(&self) -> Vec<(AudioHandle, Duration)> {
        self.state().seeks.clone()
    }

    /// Every `set_volume` call as `(handle, time, volume)`
    pub fn volume_log(&self) -> Vec<(AudioHandle, Instant, f32)> {
        self.state().volume_log.clone()
    }

    /// Last volume set on `handle`
    pub fn volume_of(&self, handle: AudioHandle) -> Option<f32> {
        self.state()
            .volume_log
            .iter()
            .rev()
            .find(|(h, _, _)| *h == handle)
            .map(|(_, _, v)| *v)
    }

    /// Fire the completion callback as if `handle` reached its end
    pub fn finish(&self, handle: AudioHandle) {
        let callback = {
            let mut state = self.state();
            let loaded = state.live.get_mut(&handle).expect("handle not loaded");
            if let Some(duration) = loaded.duration {
                loaded.base = duration;
            }
            loaded.playing_since = None;
            loaded.completion.take()
        };
        if let Some(callback) = callback {
            callback();
        }
    }

    fn with_live<T>(&self, handle: AudioHandle, f: impl FnOnce(&mut Loaded) -> T) -> Result<T> {
        let mut state = self.state();
        state
            .live
            .get_mut(&handle)
            .map(f)
            .ok_or_else(|| AnimusicError::audio(format!("unknown handle {handle}")))
    }
}

#[async_trait]
impl AudioEngine for FakeAudioEngine {
    async fn load(&self, uri: &str) -> Result<AudioHandle> {
        let delay = {
            let mut state = self.state();
            state.loads.push(uri.to_string());
            state.delays.get(uri).copied()
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state();
        if state.failing.contains(uri) {
            return Err(AnimusicError::audio(format!("cannot open {uri}")));
        }
        state.next_handle += 1;
        let handle = AudioHandle::new(state.next_handle);
        let duration = state.durations.get(uri).copied();
        state.live.insert(
            handle,
            Loaded {
                uri: uri.to_string(),
                base: Duration::ZERO,
                playing_since: None,
                duration,
                completion: None,
            },
        );
        Ok(handle)
    }

    async fn play(&self, handle: AudioHandle) -> Result<()> {
        self.with_live(handle, |l| {
            if l.playing_since.is_none() {
                l.playing_since = Some(Instant::now());
            }
        })
    }

    async fn pause(&self, handle: AudioHandle) -> Result<()> {
        self.with_live(handle, |l| {
            l.base = l.position();
            l.playing_since = None;
        })
    }

    async fn stop(&self, handle: AudioHandle) -> Result<()> {
        let mut state = self.state();
        state
            .live
            .remove(&handle)
            .ok_or_else(|| AnimusicError::audio(format!("unknown handle {handle}")))?;
        state.released.push(handle);
        Ok(())
    }

    async fn seek(&self, handle: AudioHandle, position: Duration) -> Result<()> {
        self.with_live(handle, |l| {
            l.base = position;
            if l.playing_since.is_some() {
                l.playing_since = Some(Instant::now());
            }
        })?;
        self.state().seeks.push((handle, position));
        Ok(())
    }

    async fn position(&self, handle: AudioHandle) -> Result<Duration> {
        self.with_live(handle, |l| l.position())
    }

    async fn duration(&self, handle: AudioHandle) -> Option<Duration> {
        self.state().live.get(&handle).and_then(|l| l.duration)
    }

    async fn set_volume(&self, handle: AudioHandle, volume: f32) -> Result<()> {
        self.with_live(handle, |_| ())?;
        self.state()
            .volume_log
            .push((handle, Instant::now(), volume));
        Ok(())
    }

    fn on_completion(&self, handle: AudioHandle, callback: CompletionCallback) {
        if let Some(loaded) = self.state().live.get_mut(&handle) {
            loaded.completion = Some(callback);
        }
    }
}

/// In-memory checkpoint store that counts writes
#[derive(Default)]
pub struct MemoryCheckpoints {
    map: Mutex<HashMap<TrackId, Duration>>,
    writes: Mutex<Vec<(TrackId, Duration)>>,
}

impl MemoryCheckpoints {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn stored(&self, id: &str) -> Option<Duration> {
        self.map.lock().unwrap().get(&TrackId::new(id)).copied()
    }

    pub fn preload(&self, id: &str, position: Duration) {
        self.map.lock().unwrap().insert(TrackId::new(id), position);
    }

    pub fn writes(&self) -> Vec<(TrackId, Duration)> {
        self.writes.lock().unwrap().clone()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpoints {
    async fn get(&self, track_id: &TrackId) -> Result<Option<Duration>> {
        Ok(self.map.lock().unwrap().get(track_id).copied())
    }

    async fn set(&self, track_id: &TrackId, position: Duration) -> Result<()> {
        self.map.lock().unwrap().insert(track_id.clone(), position);
        self.writes.lock().unwrap().push((track_id.clone(), position));
        Ok(())
    }
}

/// Track with a local source `/music/{id}.mp3`
pub fn track(id: &str, secs: u64) -> Track {
    Track::new(id, format!("Title {id}"), "Artist", uri(id)).with_duration(Duration::from_secs(secs))
}

pub fn uri(id: &str) -> String {
    format!("/music/{id}.mp3")
}

pub struct Harness {
    pub session: PlaybackSession,
    pub engine: Arc<FakeAudioEngine>,
    pub checkpoints: Arc<MemoryCheckpoints>,
}

pub fn harness() -> Harness {
    harness_with(PlaybackConfig::default())
}

pub fn harness_with(config: PlaybackConfig) -> Harness {
    init_tracing();
    let engine = FakeAudioEngine::new();
    let checkpoints = MemoryCheckpoints::new();
    let session = PlaybackSession::new(engine.clone(), checkpoints.clone(), config);
    Harness {
        session,
        engine,
        checkpoints,
    }
}

/// Let spawned tasks run without advancing the clock
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

/// Advance simulated time, then let woken tasks run
pub async fn advance(duration: Duration) {
    tokio::time::sleep(duration).await;
    settle().await;
}
