//! Backend state and replay gain types

use serde::{Deserialize, Serialize};

/// Backend playback state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerState {
    /// Nothing loaded, or playback finished
    #[default]
    Stopped,

    /// Paused mid-track
    Paused,

    /// Currently playing
    Playing,
}

/// Snapshot of the backend's state and position
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerStatus {
    /// Playback state
    pub state: PlayerState,

    /// Position in the current item, in seconds
    pub time_pos: f64,

    /// Duration of the current item as reported by the backend, in seconds
    pub duration: f64,
}

impl PlayerStatus {
    /// Status of a backend with nothing loaded
    pub fn stopped() -> Self {
        Self::default()
    }
}

/// Replay gain normalization mode understood by backends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplayGainMode {
    /// No normalization
    #[default]
    None,

    /// Normalize each track independently
    Track,

    /// Preserve relative loudness within an album
    Album,
}

/// Options handed to a backend that supports replay gain
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplayGainOptions {
    /// Normalization mode
    pub mode: ReplayGainMode,

    /// Pre-amplification applied on top of the stored gain, in dB
    pub preamp_db: f64,

    /// Lower the gain when it would clip
    pub prevent_clipping: bool,
}

/// Format of the stream the backend is currently decoding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioInfo {
    /// Sample rate in Hz
    pub sample_rate: u32,

    /// Number of channels
    pub channels: u16,

    /// Bits per sample, when the codec has a fixed depth
    pub bit_depth: Option<u16>,

    /// Codec name (e.g. "flac", "mp3")
    pub codec: String,
}
