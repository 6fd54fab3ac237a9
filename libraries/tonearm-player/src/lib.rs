//! Tonearm Player
//!
//! Contract between the playback engine and concrete audio backends
//! (a local decoder, a DLNA renderer, a remote jukebox, ...).
//!
//! This crate provides:
//! - **Controls**: the [`BasePlayer`] trait with pause/continue/stop/seek/volume
//! - **Flavors**: [`UrlPlayer`] and [`TrackPlayer`], wrapped in the tagged
//!   [`Backend`] enum
//! - **Events**: [`PlayerEvent`] delivered through a generation-stamped
//!   [`EventSink`]
//! - **Replay gain**: the optional [`ReplayGainPlayer`] capability
//!
//! # Architecture
//!
//! Backends run their own event loops on their own threads. They never call
//! into the engine; they only push events into the sink they were attached
//! with. The engine drains those events on its own thread, which keeps it the
//! single writer of its state.

#![forbid(unsafe_code)]

mod backend;
mod error;
mod events;
mod traits;
pub mod types;

pub use backend::Backend;
pub use error::{PlayerError, Result};
pub use events::{EventSink, PlayerEvent, TaggedEvent};
pub use traits::{BasePlayer, ReplayGainPlayer, TrackPlayer, UrlPlayer};
pub use types::{AudioInfo, PlayerState, PlayerStatus, ReplayGainMode, ReplayGainOptions};
