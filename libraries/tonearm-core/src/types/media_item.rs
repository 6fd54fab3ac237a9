//! Polymorphic play queue element

use super::{RadioStation, Track};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Kind of a media item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaItemKind {
    /// A library track
    Track,

    /// An internet radio station
    RadioStation,
}

/// Read-only view shared by every media item kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaItemMetadata {
    /// Item identifier
    pub id: String,

    /// Item kind
    pub kind: MediaItemKind,

    /// Title (track) or name (station)
    pub name: String,

    /// Artist display string, empty for stations
    pub artist: String,

    /// Album name, if any
    pub album: Option<String>,

    /// Duration, zero for stations
    pub duration: Duration,
}

/// An element of the play queue
///
/// `Clone` is a deep copy; no state is shared between copies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MediaItem {
    /// A library track
    Track(Track),

    /// An internet radio station
    Radio(RadioStation),
}

impl MediaItem {
    /// Item identifier
    pub fn id(&self) -> &str {
        match self {
            MediaItem::Track(t) => &t.id,
            MediaItem::Radio(r) => &r.id,
        }
    }

    /// Item kind
    pub fn kind(&self) -> MediaItemKind {
        match self {
            MediaItem::Track(_) => MediaItemKind::Track,
            MediaItem::Radio(_) => MediaItemKind::RadioStation,
        }
    }

    /// Whether this item is a radio station
    pub fn is_radio(&self) -> bool {
        matches!(self, MediaItem::Radio(_))
    }

    /// Duration of the item (zero for stations)
    pub fn duration(&self) -> Duration {
        match self {
            MediaItem::Track(t) => t.duration,
            MediaItem::Radio(_) => Duration::ZERO,
        }
    }

    /// Build the read-only metadata view
    pub fn metadata(&self) -> MediaItemMetadata {
        match self {
            MediaItem::Track(t) => MediaItemMetadata {
                id: t.id.clone(),
                kind: MediaItemKind::Track,
                name: t.title.clone(),
                artist: t.artist_display(),
                album: t.album.clone(),
                duration: t.duration,
            },
            MediaItem::Radio(r) => MediaItemMetadata {
                id: r.id.clone(),
                kind: MediaItemKind::RadioStation,
                name: r.name.clone(),
                artist: String::new(),
                album: None,
                duration: Duration::ZERO,
            },
        }
    }

    /// Borrow the track, if this item is one
    pub fn as_track(&self) -> Option<&Track> {
        match self {
            MediaItem::Track(t) => Some(t),
            MediaItem::Radio(_) => None,
        }
    }

    /// Mutably borrow the track, if this item is one
    pub fn as_track_mut(&mut self) -> Option<&mut Track> {
        match self {
            MediaItem::Track(t) => Some(t),
            MediaItem::Radio(_) => None,
        }
    }
}

impl From<Track> for MediaItem {
    fn from(track: Track) -> Self {
        MediaItem::Track(track)
    }
}

impl From<RadioStation> for MediaItem {
    fn from(station: RadioStation) -> Self {
        MediaItem::Radio(station)
    }
}
