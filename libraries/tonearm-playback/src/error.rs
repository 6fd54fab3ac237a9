//! Error types for the playback engine

use thiserror::Error;
use tonearm_core::ProviderError;
use tonearm_player::PlayerError;

/// Playback errors
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// Queue index outside the play queue
    #[error("Track index ({index}) out of range (queue length {len})")]
    IndexOutOfRange {
        /// Requested index
        index: usize,
        /// Queue length at the time of the request
        len: usize,
    },

    /// The provider produced no stream URL for an item
    #[error("No stream URL for item {0}")]
    NoStreamUrl(String),

    /// A radio station was handed to a backend that only plays tracks
    #[error("Cannot play non-track item {0} with a track player")]
    NonTrackItem(String),

    /// Audio backend error
    #[error("Player error: {0}")]
    Player(#[from] PlayerError),

    /// Library provider error
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Invalid or unreadable settings
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error (worker thread spawn)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for playback operations
pub type Result<T> = std::result::Result<T, PlaybackError>;
