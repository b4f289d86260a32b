//! Playback checkpoints in `SQLite`

use crate::error::{Result, StorageError};
use animusic_core::{CheckpointStore, TrackId};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use std::time::Duration;
use tracing::warn;

/// Checkpoint store backed by the `playback_checkpoints` table
#[derive(Debug, Clone)]
pub struct SqliteCheckpointStore {
    pool: SqlitePool,
}

impl SqliteCheckpointStore {
    /// Open (creating if missing) a database and apply migrations
    pub async fn open(database_url: &str) -> Result<Self> {
        let pool = crate::create_pool(database_url).await?;
        crate::run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    /// Wrap an existing pool; migrations must already be applied
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get a reference to the underlying pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Read a checkpoint
    ///
    /// Stored values that are not a valid position (negative, NaN, infinite)
    /// read as absent.
    pub async fn position(&self, track_id: &TrackId) -> Result<Option<Duration>> {
        let row = sqlx::query("SELECT position_secs FROM playback_checkpoints WHERE track_id = ?")
            .bind(track_id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let secs: f64 = row
            .try_get("position_secs")
            .map_err(|e| StorageError::Query(e.to_string()))?;

        match Duration::try_from_secs_f64(secs) {
            Ok(position) => Ok(Some(position)),
            Err(_) => {
                warn!(track_id = %track_id, secs, "Ignoring invalid stored checkpoint");
                Ok(None)
            }
        }
    }

    /// Create or replace a checkpoint
    pub async fn save(&self, track_id: &TrackId, position: Duration) -> Result<()> {
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            "INSERT INTO playback_checkpoints (track_id, position_secs, updated_at)
             VALUES (?, ?, ?)
             ON CONFLICT(track_id)
             DO UPDATE SET
                position_secs = excluded.position_secs,
                updated_at = excluded.updated_at",
        )
        .bind(track_id.as_str())
        .bind(position.as_secs_f64())
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Delete a checkpoint; returns whether one existed
    pub async fn remove(&self, track_id: &TrackId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM playback_checkpoints WHERE track_id = ?")
            .bind(track_id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Number of stored checkpoints
    pub async fn count(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM playback_checkpoints")
            .fetch_one(&self.pool)
            .await?;
        row.try_get("count")
            .map_err(|e| StorageError::Query(e.to_string()))
    }
}

#[async_trait]
impl CheckpointStore for SqliteCheckpointStore {
    async fn get(&self, track_id: &TrackId) -> animusic_core::Result<Option<Duration>> {
        Ok(self.position(track_id).await?)
    }

    async fn set(&self, track_id: &TrackId, position: Duration) -> animusic_core::Result<()> {
        Ok(self.save(track_id, position).await?)
    }
}
