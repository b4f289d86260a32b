//! Sleep timer controller
//!
//! Owns at most one countdown. Arming spawns a single task that sleeps until
//! the fade start, walks the [`FadeRamp`], then sleeps until the deadline and
//! asks its [`TimerHost`] to stop playback. Every callback carries the arming
//! generation so work scheduled by a replaced or cancelled timer is ignored
//! even if it races the cancellation.

use crate::error::{PlaybackError, Result};
use crate::types::{PlaybackConfig, SleepTimerSnapshot, SleepTimerState};
use crate::volume::FadeRamp;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info};

/// Receiver of sleep timer events
///
/// Implemented by the playback session. Each call first checks that
/// `generation` is still the armed timer.
#[async_trait]
pub(crate) trait TimerHost: Send + Sync {
    /// Fade window reached; returns false if the timer is gone
    async fn begin_fade(&self, generation: u64) -> bool;

    /// Apply one fade step; returns false if the timer is gone
    async fn fade_step(&self, generation: u64, volume: f32) -> bool;

    /// Deadline reached
    async fn expire(&self, generation: u64);
}

/// Single-slot sleep timer state machine
#[derive(Debug)]
pub(crate) struct SleepTimerController {
    state: SleepTimerState,
    generation: u64,
    task: Option<JoinHandle<()>>,
    deadline: Option<Instant>,
    fade_enabled: bool,
    fade_window: Duration,
    fade_steps: u32,
    max_minutes: u32,
}

impl SleepTimerController {
    pub(crate) fn new(config: &PlaybackConfig) -> Self {
        Self {
            state: SleepTimerState::Inactive,
            generation: 0,
            task: None,
            deadline: None,
            fade_enabled: false,
            fade_window: config.fade_window(),
            fade_steps: config.fade_steps,
            max_minutes: config.max_sleep_minutes,
        }
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> SleepTimerState {
        self.state
    }

    /// Arm a countdown, replacing any outstanding one
    ///
    /// Invalid requests leave the current timer untouched. Returns whether an
    /// outstanding timer was replaced alongside the new snapshot.
    pub(crate) fn arm(
        &mut self,
        minutes: u32,
        fade_out: bool,
        host: Arc<dyn TimerHost>,
    ) -> Result<(bool, SleepTimerSnapshot)> {
        if minutes == 0 || minutes > self.max_minutes {
            return Err(PlaybackError::TimerScheduling(format!(
                "sleep timer must be between 1 and {} minutes, got {minutes}",
                self.max_minutes
            )));
        }
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| PlaybackError::TimerScheduling(e.to_string()))?;

        let replaced = self.cancel();

        let total = Duration::from_secs(u64::from(minutes) * 60);
        let deadline = Instant::now() + total;
        let ramp = fade_out.then(|| FadeRamp::new(self.fade_window.min(total), self.fade_steps));

        self.generation += 1;
        self.state = SleepTimerState::Armed;
        self.deadline = Some(deadline);
        self.fade_enabled = fade_out;
        self.task = Some(runtime.spawn(run(host, self.generation, deadline, ramp)));

        info!(minutes, fade_out, generation = self.generation, "Sleep timer armed");
        Ok((replaced, self.snapshot()))
    }

    /// Cancel an outstanding countdown
    ///
    /// Returns true if a timer was Armed or FadingOut. A Fired timer is left
    /// alone: its stop is already being carried out.
    pub(crate) fn cancel(&mut self) -> bool {
        if !matches!(
            self.state,
            SleepTimerState::Armed | SleepTimerState::FadingOut
        ) {
            return false;
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
        debug!(generation = self.generation, state = ?self.state, "Sleep timer cancelled");
        self.reset();
        true
    }

    pub(crate) fn is_current(&self, generation: u64) -> bool {
        generation == self.generation
            && matches!(
                self.state,
                SleepTimerState::Armed | SleepTimerState::FadingOut
            )
    }

    /// Armed -> FadingOut
    pub(crate) fn begin_fade(&mut self, generation: u64) -> bool {
        if !self.is_current(generation) {
            return false;
        }
        self.state = SleepTimerState::FadingOut;
        debug!(generation, "Sleep timer fading out");
        true
    }

    /// Armed/FadingOut -> Fired
    ///
    /// Called from the timer's own task, so the task handle is released
    /// rather than aborted.
    pub(crate) fn begin_fire(&mut self, generation: u64) -> bool {
        if !self.is_current(generation) {
            return false;
        }
        self.task = None;
        self.state = SleepTimerState::Fired;
        info!(generation, "Sleep timer fired");
        true
    }

    /// Fired -> Inactive
    pub(crate) fn finish(&mut self, generation: u64) {
        if generation == self.generation && self.state == SleepTimerState::Fired {
            self.reset();
        }
    }

    pub(crate) fn snapshot(&self) -> SleepTimerSnapshot {
        let remaining = self
            .deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
            .unwrap_or(Duration::ZERO);

        SleepTimerSnapshot {
            state: self.state,
            remaining,
            fade_enabled: self.fade_enabled,
            fade_window: self.fade_window,
            deadline: self.deadline,
        }
    }

    fn reset(&mut self) {
        self.state = SleepTimerState::Inactive;
        self.deadline = None;
        self.fade_enabled = false;
    }
}

impl Drop for SleepTimerController {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn run(host: Arc<dyn TimerHost>, generation: u64, deadline: Instant, ramp: Option<FadeRamp>) {
    if let Some(ramp) = ramp {
        let fade_start = deadline
            .checked_sub(ramp.window())
            .unwrap_or(deadline);
        sleep_until(fade_start).await;
        if !host.begin_fade(generation).await {
            return;
        }
        for (offset, volume) in ramp.schedule() {
            sleep_until(fade_start + offset).await;
            if !host.fade_step(generation, volume).await {
                return;
            }
        }
    }

    sleep_until(deadline).await;
    host.expire(generation).await;
}
