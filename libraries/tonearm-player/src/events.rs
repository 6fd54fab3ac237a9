//! Backend events
//!
//! Backends never call back into the engine. They push events into an
//! [`EventSink`] handed to them when they are attached, and the engine drains
//! the channel on its own thread. Each sink carries the generation number of
//! the attachment, so events emitted by a backend after it was detached can be
//! recognized and dropped.

use crate::types::AudioInfo;
use crossbeam_channel::Sender;
use serde::{Deserialize, Serialize};

/// Events raised by an audio backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlayerEvent {
    /// A new item started: either an explicit play or a gapless advance
    /// to the armed next item
    TrackChanged,

    /// A seek completed
    Seeked,

    /// Playback paused
    Paused,

    /// Playback started or resumed
    Playing,

    /// Playback stopped (explicitly or at the end of the last item)
    Stopped,

    /// Volume changed outside of the engine (e.g. a remote jukebox)
    VolumeChanged(u8),

    /// The decoded stream format changed
    AudioInfoChanged(AudioInfo),
}

/// An event stamped with the attachment generation of its backend
#[derive(Debug, Clone, PartialEq)]
pub struct TaggedEvent {
    /// Attachment generation of the emitting backend
    pub generation: u64,

    /// The event itself
    pub event: PlayerEvent,
}

/// Sending half handed to a backend when it is attached to an engine
#[derive(Debug, Clone)]
pub struct EventSink {
    generation: u64,
    tx: Sender<TaggedEvent>,
}

impl EventSink {
    /// Create a sink for the given attachment generation
    pub fn new(generation: u64, tx: Sender<TaggedEvent>) -> Self {
        Self { generation, tx }
    }

    /// Attachment generation of this sink
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Emit an event
    ///
    /// Returns `false` when the engine side of the channel is gone.
    pub fn emit(&self, event: PlayerEvent) -> bool {
        self.tx
            .send(TaggedEvent {
                generation: self.generation,
                event,
            })
            .is_ok()
    }
}
