//! In-memory checkpoint store

use animusic_core::{CheckpointStore, Result, TrackId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

/// Process-local checkpoint store
///
/// Nothing survives a relaunch. Useful for previews, demos, and tests.
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    positions: RwLock<HashMap<TrackId, Duration>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored checkpoints
    pub fn len(&self) -> usize {
        self.positions
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn get(&self, track_id: &TrackId) -> Result<Option<Duration>> {
        Ok(self
            .positions
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(track_id)
            .copied())
    }

    async fn set(&self, track_id: &TrackId, position: Duration) -> Result<()> {
        self.positions
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(track_id.clone(), position);
        Ok(())
    }
}
