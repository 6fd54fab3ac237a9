//! Audio backend traits
//!
//! Every backend implements [`BasePlayer`] plus exactly one of the two
//! flavors: [`UrlPlayer`] for backends that stream a resolved URL, or
//! [`TrackPlayer`] for backends that resolve and stream tracks themselves.
//! The flavor is fixed when the backend is wrapped in a
//! [`Backend`](crate::Backend).

use crate::error::Result;
use crate::events::EventSink;
use crate::types::{PlayerStatus, ReplayGainOptions};
use tonearm_core::{MediaItemMetadata, Track};

/// Controls shared by every backend flavor
///
/// State machine: `Stopped` is initial. Playing an item moves to `Playing`,
/// `pause` to `Paused`, `continue_playback` back to `Playing`, and `stop`
/// to `Stopped`. A natural advance to the armed next item keeps the backend
/// `Playing` and emits `TrackChanged`.
pub trait BasePlayer: Send {
    /// Resume paused playback
    fn continue_playback(&mut self) -> Result<()>;

    /// Pause playback
    fn pause(&mut self) -> Result<()>;

    /// Stop playback and unload the current item
    fn stop(&mut self) -> Result<()>;

    /// Seek to an absolute position in the current item
    fn seek_seconds(&mut self, secs: f64) -> Result<()>;

    /// Whether a seek is still in progress
    fn is_seeking(&self) -> bool;

    /// Set output volume (0-100)
    fn set_volume(&mut self, volume: u8) -> Result<()>;

    /// Current output volume (0-100)
    fn volume(&self) -> u8;

    /// Current state and position
    fn status(&self) -> PlayerStatus;

    /// Attach (or with `None`, detach) the channel events are emitted into
    ///
    /// After a detach the backend must not emit further events.
    fn set_event_sink(&mut self, sink: Option<EventSink>);

    /// Replay gain control, for backends that support it
    fn replay_gain(&mut self) -> Option<&mut dyn ReplayGainPlayer> {
        None
    }
}

/// A backend that plays resolved stream URLs
pub trait UrlPlayer: BasePlayer {
    /// Start playing `url` immediately at `start_secs`
    ///
    /// Clears any armed next item.
    fn play_file(&mut self, url: &str, meta: &MediaItemMetadata, start_secs: f64) -> Result<()>;

    /// Arm the item to play gaplessly when the current one ends, or clear
    /// the armed slot with `None`
    fn set_next_file(&mut self, next: Option<(&str, &MediaItemMetadata)>) -> Result<()>;
}

/// A backend that takes track references and resolves them itself
pub trait TrackPlayer: BasePlayer {
    /// Start playing `track` immediately at `start_secs`
    ///
    /// Clears any armed next track.
    fn play_track(&mut self, track: &Track, start_secs: f64) -> Result<()>;

    /// Arm the track to play gaplessly when the current one ends, or clear
    /// the armed slot with `None`
    fn set_next_track(&mut self, next: Option<&Track>) -> Result<()>;
}

/// Optional replay gain capability
pub trait ReplayGainPlayer {
    /// Apply replay gain options to subsequent playback
    fn set_replay_gain_options(&mut self, options: ReplayGainOptions) -> Result<()>;
}
