//! Playback configuration loading

use crate::error::{PlaybackError, Result};
use crate::types::PlaybackConfig;
use std::path::Path;

/// Environment variable prefix (`ANIMUSIC_FADE_WINDOW_SECS=20`)
pub const ENV_PREFIX: &str = "ANIMUSIC";

/// Upper bound for `fade_steps`
pub const MAX_FADE_STEPS: u32 = 1000;

impl PlaybackConfig {
    /// Load configuration from an optional TOML file and the environment
    ///
    /// Missing keys fall back to defaults. Environment variables override the
    /// file.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with(path, environment())
    }

    fn load_with(path: Option<&Path>, env: config::Environment) -> Result<Self> {
        let mut settings = config::Config::builder();

        if let Some(path) = path {
            if !path.exists() {
                return Err(PlaybackError::Config(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            settings = settings.add_source(config::File::from(path));
        }

        settings = settings.add_source(env);

        let config: Self = settings.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.position_poll_ms == 0 {
            return Err(PlaybackError::Config(
                "position_poll_ms must be greater than 0".to_string(),
            ));
        }

        if self.fade_steps == 0 || self.fade_steps > MAX_FADE_STEPS {
            return Err(PlaybackError::Config(format!(
                "fade_steps must be between 1 and {MAX_FADE_STEPS}"
            )));
        }

        if self.max_sleep_minutes == 0 {
            return Err(PlaybackError::Config(
                "max_sleep_minutes must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

fn environment() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX).try_parsing(true)
}
