//! Tonearm Playback
//!
//! Play queue management for Tonearm, independent of any particular audio
//! backend or music server.
//!
//! This crate provides:
//! - **Play queue**: load, insert-next, append, reorder and remove items
//!   while keeping the now-playing index on the same item
//! - **Gapless arming**: the backend's "next" slot always holds the item the
//!   loop mode says comes next
//! - **Scrobbling**: play-time accounting and "now playing" / "ended"
//!   reports to the library server
//! - **Hot swap**: switching backends mid-play resumes at the same position
//! - **Commands**: a coalescing command queue and a worker-thread
//!   [`PlaybackManager`] for UI handlers
//!
//! # Architecture
//!
//! [`PlaybackEngine`] is a single-owner state machine. Backends report back
//! through a channel, never by calling into the engine, so every callback an
//! observer receives runs on the engine's own thread.
//!
//! # Example: Settings and commands
//!
//! ```rust
//! use tonearm_playback::{Command, CommandQueue, EngineSettings, LoopMode};
//!
//! let settings = EngineSettings::from_toml_str(
//!     "[playback]\nloop_mode = \"all\"\n[scrobble]\nthreshold_percent = 60\n",
//! )
//! .unwrap();
//! assert_eq!(settings.playback.loop_mode, LoopMode::All);
//!
//! // A slider drag produces many volume changes; only the last one survives
//! let queue = CommandQueue::new();
//! for volume in [20, 40, 60] {
//!     queue.push(Command::SetVolume(volume));
//! }
//! assert_eq!(queue.try_next(), Some(Command::SetVolume(60)));
//! assert!(queue.is_empty());
//! ```

#![forbid(unsafe_code)]

mod command_queue;
mod engine;
mod error;
mod manager;
mod observers;
mod poller;
pub mod settings;
mod stopwatch;
pub mod types;

pub use command_queue::{Command, CommandKind, CommandQueue};
pub use engine::PlaybackEngine;
pub use error::{PlaybackError, Result};
pub use manager::PlaybackManager;
pub use observers::{
    AudioInfoFn, EventKind, LoopModeFn, NextTrackArmedFn, NotifyFn, Observers, PlayTimeFn,
    QueueChangeFn, SongChangeFn, SubscriptionId, VolumeFn,
};
pub use poller::{PositionPoller, DEFAULT_POLL_INTERVAL};
pub use settings::{EngineSettings, PlaybackSettings, ReplayGainSetting, ReplayGainSettings, ScrobbleSettings};
pub use stopwatch::Stopwatch;
pub use types::{InsertMode, LoopMode, PlaybackStatus};
