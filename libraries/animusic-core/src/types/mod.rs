mod audio;
mod ids;
mod track;

pub use audio::AudioHandle;
pub use ids::TrackId;
pub use track::{Track, TrackSourceKind};
