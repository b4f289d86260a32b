//! AniMusic Core
//!
//! Platform-agnostic domain types, collaborator traits, and error handling
//! shared by the AniMusic playback engine and its storage backends.
//!
//! # Architecture
//!
//! The core crate defines:
//! - **Domain Types**: `Track`, `TrackId`, `AudioHandle`
//! - **Collaborator Traits**: `AudioEngine`, `CheckpointStore`, `TrackNavigator`
//! - **Error Handling**: Unified `AnimusicError` and `Result` types
//!
//! Platform code (the native player, the key-value store, the list screens)
//! implements the traits; the engine only ever talks to the traits.
//!
//! # Example
//!
//! ```rust
//! use animusic_core::{Track, TrackSourceKind};
//! use std::time::Duration;
//!
//! let track = Track::new("sheet-42", "Blue Bird", "Ikimono", "https://cdn.example.com/42.mp3")
//!     .with_duration(Duration::from_secs(218));
//!
//! assert_eq!(track.source_kind(), TrackSourceKind::Remote);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use error::{AnimusicError, Result};
pub use traits::{AudioEngine, CheckpointStore, CompletionCallback, TrackNavigator};
pub use types::{AudioHandle, Track, TrackId, TrackSourceKind};
