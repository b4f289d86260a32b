/// Track domain type
use crate::types::TrackId;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Where a track's audio lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackSourceKind {
    /// File on the device
    Local,
    /// Streamed from the remote catalog
    Remote,
}

/// A playable audio source with display metadata
///
/// Produced by the local file scan or the remote catalog fetch and handed to
/// the playback engine, which never mutates it. Fields are read through
/// accessors so a constructed track stays immutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    id: TrackId,
    title: String,
    artist: String,
    album: Option<String>,
    source_uri: String,
    duration: Option<Duration>,
}

impl Track {
    /// Create a track with the required metadata
    pub fn new(
        id: impl Into<TrackId>,
        title: impl Into<String>,
        artist: impl Into<String>,
        source_uri: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            artist: artist.into(),
            album: None,
            source_uri: source_uri.into(),
            duration: None,
        }
    }

    /// Set the album name
    #[must_use]
    pub fn with_album(mut self, album: impl Into<String>) -> Self {
        self.album = Some(album.into());
        self
    }

    /// Set the known duration
    ///
    /// A zero duration means "unknown" (local scans report 0 before probing)
    /// and is dropped.
    #[must_use]
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = (!duration.is_zero()).then_some(duration);
        self
    }

    /// Unique identifier
    pub fn id(&self) -> &TrackId {
        &self.id
    }

    /// Track title
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Artist name
    pub fn artist(&self) -> &str {
        &self.artist
    }

    /// Album name, if known
    pub fn album(&self) -> Option<&str> {
        self.album.as_deref()
    }

    /// Opaque source URI: a local path or a remote URL
    pub fn source_uri(&self) -> &str {
        &self.source_uri
    }

    /// Duration, if known ahead of loading
    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    /// Classify the source URI
    pub fn source_kind(&self) -> TrackSourceKind {
        let uri = self.source_uri.trim_start();
        let is_url = uri
            .get(..8)
            .is_some_and(|p| p.eq_ignore_ascii_case("https://"))
            || uri
                .get(..7)
                .is_some_and(|p| p.eq_ignore_ascii_case("http://"));

        if is_url {
            TrackSourceKind::Remote
        } else {
            TrackSourceKind::Local
        }
    }
}
