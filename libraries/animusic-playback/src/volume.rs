//! Output gain helpers
//!
//! Gain is linear 0.0-1.0 as accepted by the audio engine. The sleep timer
//! fade walks it down in equal steps.

use std::time::Duration;

/// Full output gain
pub const FULL_VOLUME: f32 = 1.0;

/// Clamp a gain to the range accepted by the audio engine
///
/// NaN maps to silence.
pub fn clamp_volume(volume: f32) -> f32 {
    if volume.is_nan() {
        0.0
    } else {
        volume.clamp(0.0, FULL_VOLUME)
    }
}

/// Linear fade from full volume to silence in equal discrete steps
///
/// Step `k` (1-based) happens at `window * k / steps` after the fade starts
/// and sets the gain to `1 - k / steps`, so the last step lands exactly at
/// the end of the window with gain 0.0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FadeRamp {
    window: Duration,
    steps: u32,
}

impl FadeRamp {
    /// Create a ramp; zero steps is treated as a single step
    pub fn new(window: Duration, steps: u32) -> Self {
        Self {
            window,
            steps: steps.max(1),
        }
    }

    /// Fade duration
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Number of volume steps
    pub fn steps(&self) -> u32 {
        self.steps
    }

    /// Gain after step `k`
    pub fn step_volume(&self, k: u32) -> f32 {
        let k = k.min(self.steps);
        clamp_volume(1.0 - k as f32 / self.steps as f32)
    }

    /// Offset of step `k` from the start of the fade
    pub fn step_offset(&self, k: u32) -> Duration {
        let k = k.min(self.steps);
        if k == self.steps {
            return self.window;
        }
        match self.window.checked_mul(k) {
            Some(scaled) => scaled / self.steps,
            None => self
                .window
                .mul_f64(f64::from(k) / f64::from(self.steps)),
        }
    }

    /// All `(offset, gain)` pairs of the ramp, in order
    pub fn schedule(&self) -> impl Iterator<Item = (Duration, f32)> + '_ {
        (1..=self.steps).map(move |k| (self.step_offset(k), self.step_volume(k)))
    }
}
