//! Engine settings

use crate::error::{PlaybackError, Result};
use crate::types::LoopMode;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tonearm_player::{ReplayGainMode, ReplayGainOptions};

/// Environment variable prefix (`TONEARM_SCROBBLE__ENABLED=false`)
pub const ENV_PREFIX: &str = "TONEARM";

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct EngineSettings {
    #[serde(default)]
    pub playback: PlaybackSettings,

    #[serde(default)]
    pub scrobble: ScrobbleSettings,

    #[serde(default)]
    pub replay_gain: ReplayGainSettings,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PlaybackSettings {
    /// Loop mode the engine starts in
    #[serde(default)]
    pub loop_mode: LoopMode,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Past this position "previous" restarts the current track instead
    #[serde(default = "default_seek_back_restart_secs")]
    pub seek_back_restart_secs: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ScrobbleSettings {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Seconds played for a scrobble; negative disables the time trigger
    #[serde(default = "default_threshold_time_secs")]
    pub threshold_time_secs: i64,

    /// Percent of the track played for a scrobble (clamped to 0-99)
    #[serde(default = "default_threshold_percent")]
    pub threshold_percent: u8,
}

/// Replay gain mode as configured by the user
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplayGainSetting {
    #[default]
    None,
    Track,
    Album,
    /// Track or album depending on what is being played; track by default
    Auto,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ReplayGainSettings {
    #[serde(default)]
    pub mode: ReplayGainSetting,

    #[serde(default)]
    pub preamp_db: f64,

    #[serde(default = "default_enabled")]
    pub prevent_clipping: bool,
}

impl EngineSettings {
    /// Load settings from an optional TOML file, overridden by `TONEARM_*`
    /// environment variables
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = config::Config::builder();

        if let Some(path) = path {
            if path.exists() {
                settings = settings.add_source(config::File::from(path));
            }
        }

        settings = settings.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        Self::from_builder(settings)
    }

    /// Parse settings from a TOML string (no environment overrides)
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml));
        Self::from_builder(settings)
    }

    fn from_builder(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self> {
        let config = builder
            .build()
            .map_err(|e| PlaybackError::Config(e.to_string()))?;

        let settings: Self = config
            .try_deserialize()
            .map_err(|e| PlaybackError::Config(e.to_string()))?;

        Ok(settings.normalized())
    }

    /// Clamp values into their valid ranges
    pub fn normalized(mut self) -> Self {
        self.scrobble = self.scrobble.normalized();
        if self.playback.poll_interval_ms == 0 {
            self.playback.poll_interval_ms = default_poll_interval_ms();
        }
        self
    }
}

impl PlaybackSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            loop_mode: LoopMode::None,
            poll_interval_ms: default_poll_interval_ms(),
            seek_back_restart_secs: default_seek_back_restart_secs(),
        }
    }
}

impl ScrobbleSettings {
    /// Clamp the percent threshold to 99 so rounding can never make a
    /// fully played track miss it
    pub fn normalized(mut self) -> Self {
        self.threshold_percent = self.threshold_percent.min(99);
        self
    }
}

impl Default for ScrobbleSettings {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            threshold_time_secs: default_threshold_time_secs(),
            threshold_percent: default_threshold_percent(),
        }
    }
}

impl ReplayGainSetting {
    /// Backend mode for this setting (`Auto` resolves to `Track`)
    pub fn resolve(self) -> ReplayGainMode {
        match self {
            ReplayGainSetting::None => ReplayGainMode::None,
            ReplayGainSetting::Track | ReplayGainSetting::Auto => ReplayGainMode::Track,
            ReplayGainSetting::Album => ReplayGainMode::Album,
        }
    }
}

impl ReplayGainSettings {
    /// Backend options with an explicit mode
    pub fn options_with_mode(&self, mode: ReplayGainMode) -> ReplayGainOptions {
        ReplayGainOptions {
            mode,
            preamp_db: self.preamp_db,
            prevent_clipping: self.prevent_clipping,
        }
    }

    /// Backend options for the configured mode
    pub fn options(&self) -> ReplayGainOptions {
        self.options_with_mode(self.mode.resolve())
    }
}

impl Default for ReplayGainSettings {
    fn default() -> Self {
        Self {
            mode: ReplayGainSetting::None,
            preamp_db: 0.0,
            prevent_clipping: default_enabled(),
        }
    }
}

// Default values
fn default_poll_interval_ms() -> u64 {
    250
}

fn default_seek_back_restart_secs() -> f64 {
    3.0
}

fn default_enabled() -> bool {
    true
}

fn default_threshold_time_secs() -> i64 {
    240
}

fn default_threshold_percent() -> u8 {
    50
}
