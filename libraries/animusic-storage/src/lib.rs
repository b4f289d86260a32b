//! AniMusic Storage
//!
//! Durable [`CheckpointStore`](animusic_core::CheckpointStore)
//! implementations for the playback engine.
//!
//! - [`SqliteCheckpointStore`]: `SQLite` file, survives relaunch
//! - [`MemoryCheckpointStore`]: process-local, for previews and tests
//!
//! # Example
//!
//! ```rust,no_run
//! use animusic_storage::SqliteCheckpointStore;
//! use animusic_core::{CheckpointStore, TrackId};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = SqliteCheckpointStore::open("sqlite://animusic.db").await?;
//!
//! let id = TrackId::new("sheet-42");
//! store.set(&id, Duration::from_secs(42)).await?;
//! assert_eq!(store.get(&id).await?, Some(Duration::from_secs(42)));
//! # Ok(())
//! # }
//! ```

mod error;

pub mod checkpoints;
pub mod memory;

pub use checkpoints::SqliteCheckpointStore;
pub use error::{Result, StorageError};
pub use memory::MemoryCheckpointStore;

use sqlx::sqlite::SqlitePool;
use tracing::debug;

/// Embedded migrations, applied in order
const MIGRATIONS: &[&str] = &[include_str!(
    "../migrations/20261016000001_create_playback_checkpoints.sql"
)];

/// Run database migrations
///
/// Every migration is idempotent, so this is safe to call on each launch.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    for migration in MIGRATIONS {
        sqlx::query(migration)
            .execute(pool)
            .await
            .map_err(|e| StorageError::Migration(e.to_string()))?;
    }
    Ok(())
}

/// Create a new `SQLite` pool
///
/// # Arguments
///
/// * `database_url` - `SQLite` connection string (e.g., `sqlite://animusic.db`)
pub async fn create_pool(database_url: &str) -> Result<SqlitePool> {
    use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
    use std::str::FromStr;

    debug!(database_url, "Creating pool");

    let options = SqliteConnectOptions::from_str(database_url)
        .map_err(|e| StorageError::Connection(e.to_string()))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(std::time::Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

    Ok(pool)
}
