//! Internet radio station type

use serde::{Deserialize, Serialize};

/// An internet radio station
///
/// Stations have no meaningful duration and are never scrobbled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RadioStation {
    /// Server-side station identifier
    pub id: String,

    /// Display name
    pub name: String,

    /// Direct stream URL
    pub stream_url: String,

    /// Station home page
    pub home_page_url: Option<String>,
}

impl RadioStation {
    /// Create a new radio station
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        stream_url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            stream_url: stream_url.into(),
            home_page_url: None,
        }
    }
}
