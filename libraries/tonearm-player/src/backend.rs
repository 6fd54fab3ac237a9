//! Tagged backend flavor

use crate::error::Result;
use crate::events::EventSink;
use crate::traits::{ReplayGainPlayer, TrackPlayer, UrlPlayer};
use crate::types::PlayerStatus;

/// An audio backend together with its flavor
///
/// The flavor is decided once, at construction, so the engine never has to
/// probe a backend for the interface it implements.
pub enum Backend {
    /// Backend fed with resolved stream URLs
    Url(Box<dyn UrlPlayer>),

    /// Backend fed with track references
    Track(Box<dyn TrackPlayer>),
}

macro_rules! dispatch {
    ($self:expr, $p:ident => $body:expr) => {
        match $self {
            Backend::Url($p) => $body,
            Backend::Track($p) => $body,
        }
    };
}

impl Backend {
    /// Wrap a URL backend
    pub fn url(player: impl UrlPlayer + 'static) -> Self {
        Self::Url(Box::new(player))
    }

    /// Wrap a track backend
    pub fn track(player: impl TrackPlayer + 'static) -> Self {
        Self::Track(Box::new(player))
    }

    /// Flavor name, for logging
    pub fn flavor(&self) -> &'static str {
        match self {
            Backend::Url(_) => "url",
            Backend::Track(_) => "track",
        }
    }

    pub fn continue_playback(&mut self) -> Result<()> {
        dispatch!(self, p => p.continue_playback())
    }

    pub fn pause(&mut self) -> Result<()> {
        dispatch!(self, p => p.pause())
    }

    pub fn stop(&mut self) -> Result<()> {
        dispatch!(self, p => p.stop())
    }

    pub fn seek_seconds(&mut self, secs: f64) -> Result<()> {
        dispatch!(self, p => p.seek_seconds(secs))
    }

    pub fn is_seeking(&self) -> bool {
        dispatch!(self, p => p.is_seeking())
    }

    pub fn set_volume(&mut self, volume: u8) -> Result<()> {
        dispatch!(self, p => p.set_volume(volume))
    }

    pub fn volume(&self) -> u8 {
        dispatch!(self, p => p.volume())
    }

    pub fn status(&self) -> PlayerStatus {
        dispatch!(self, p => p.status())
    }

    pub fn set_event_sink(&mut self, sink: Option<EventSink>) {
        dispatch!(self, p => p.set_event_sink(sink));
    }

    pub fn replay_gain(&mut self) -> Option<&mut dyn ReplayGainPlayer> {
        dispatch!(self, p => p.replay_gain())
    }
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backend")
            .field("flavor", &self.flavor())
            .field("status", &self.status())
            .finish()
    }
}
