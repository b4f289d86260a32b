/// Audio engine handle type
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque reference to one loaded native audio resource
///
/// Issued by [`crate::AudioEngine::load`] and only meaningful to the engine
/// that issued it. A handle is dead once passed to `stop`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AudioHandle(u64);

impl AudioHandle {
    /// Wrap a raw engine-assigned handle value
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw engine-assigned value
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for AudioHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
