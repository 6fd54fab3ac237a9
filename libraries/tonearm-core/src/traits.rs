//! Collaborator contracts consumed by the playback engine.

use crate::error::Result;
use async_trait::async_trait;

/// A connection to a remote music-library server
///
/// One implementation exists per server protocol. The playback engine only
/// needs the handful of calls below: it resolves stream URLs for URL-based
/// players and reports playback progress so the server can keep play counts
/// and scrobbles.
///
/// The reporting calls are fired from background tasks and never awaited by
/// the engine, so implementations are free to perform network I/O.
#[async_trait]
pub trait LibraryProvider: Send + Sync {
    /// Build the URL a player should stream the given track from
    ///
    /// This is called synchronously while a track is being handed to the
    /// player, so it must not block on the network.
    ///
    /// # Errors
    /// Returns an error if no stream URL can be produced for the track.
    fn stream_url(&self, track_id: &str) -> Result<String>;

    /// Notify the server that a track started playing ("now playing")
    async fn track_began_playback(&self, track_id: &str) -> Result<()>;

    /// Notify the server that a track stopped playing
    ///
    /// `position_secs` is the furthest position reached. `submission` is true
    /// when the client judged the play long enough to count as a scrobble.
    async fn track_ended_playback(
        &self,
        track_id: &str,
        position_secs: u32,
        submission: bool,
    ) -> Result<()>;

    /// Whether the client (rather than the server) decides when a play counts
    ///
    /// Servers that count a play as soon as it begins return `false`.
    fn client_decides_scrobble(&self) -> bool;
}
