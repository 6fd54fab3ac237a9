//! Track domain type

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A streamable track from the library server
///
/// Queue entries are owned copies: the engine mutates `play_count`,
/// `favorite` and `rating` on its own copy without touching the caller's.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Server-side track identifier
    pub id: String,

    /// Track title
    pub title: String,

    /// Artist names
    pub artists: Vec<String>,

    /// Album name
    pub album: Option<String>,

    /// Server-side album identifier
    pub album_id: Option<String>,

    /// Cover art identifier
    pub cover_art_id: Option<String>,

    /// Track number on its album
    pub track_number: Option<u32>,

    /// Track duration
    pub duration: Duration,

    /// Whether the user has starred the track
    pub favorite: bool,

    /// User rating (0 = unrated, 1-5)
    pub rating: u8,

    /// Cumulative play count as known to this client
    pub play_count: u32,
}

impl Track {
    /// Create a new track with minimal metadata
    pub fn new(id: impl Into<String>, title: impl Into<String>, duration: Duration) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            artists: Vec::new(),
            album: None,
            album_id: None,
            cover_art_id: None,
            track_number: None,
            duration,
            favorite: false,
            rating: 0,
            play_count: 0,
        }
    }

    /// Builder-style setter for the artist list
    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artists.push(artist.into());
        self
    }

    /// Builder-style setter for the album name
    pub fn with_album(mut self, album: impl Into<String>) -> Self {
        self.album = Some(album.into());
        self
    }

    /// Artist names joined for display
    pub fn artist_display(&self) -> String {
        self.artists.join(", ")
    }
}
