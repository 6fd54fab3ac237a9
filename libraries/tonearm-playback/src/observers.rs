//! Observer registration for engine notifications
//!
//! Every notification kind has its own callback list on the engine instance.
//! Callbacks run synchronously on the engine's thread, in registration order,
//! and only ever see copies of engine-owned data.

use crate::types::LoopMode;
use tonearm_core::{MediaItem, Track};
use tonearm_player::AudioInfo;

/// Called when the now-playing item changes, with the new item (`None` when
/// playback stopped) and the track that was just scrobbled, if any
pub type SongChangeFn = Box<dyn FnMut(Option<&MediaItem>, Option<&Track>) + Send>;

/// Called when the item armed for gapless playback changes
pub type NextTrackArmedFn = Box<dyn FnMut(Option<&MediaItem>) + Send>;

/// Called with `(position_secs, duration_secs, seeked)`
pub type PlayTimeFn = Box<dyn FnMut(f64, f64, bool) + Send>;

pub type LoopModeFn = Box<dyn FnMut(LoopMode) + Send>;
pub type VolumeFn = Box<dyn FnMut(u8) + Send>;

/// Called with a snapshot of the play queue
pub type QueueChangeFn = Box<dyn FnMut(&[MediaItem]) + Send>;

pub type AudioInfoFn = Box<dyn FnMut(&AudioInfo) + Send>;
pub type NotifyFn = Box<dyn FnMut() + Send>;

/// Notification kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    SongChange,
    NextTrackArmed,
    PlayTime,
    LoopMode,
    Volume,
    QueueChange,
    Seek,
    Paused,
    Stopped,
    Playing,
    AudioInfo,
}

/// Handle returned by a subscription, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId {
    kind: EventKind,
    id: u64,
}

impl SubscriptionId {
    /// Notification kind this subscription listens to
    pub fn kind(&self) -> EventKind {
        self.kind
    }
}

struct CallbackList<F: ?Sized> {
    entries: Vec<(u64, Box<F>)>,
}

impl<F: ?Sized> Default for CallbackList<F> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<F: ?Sized> CallbackList<F> {
    fn push(&mut self, id: u64, callback: Box<F>) {
        self.entries.push((id, callback));
    }

    fn remove(&mut self, id: u64) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry, _)| *entry != id);
        self.entries.len() != before
    }

    fn iter_mut(&mut self) -> impl Iterator<Item = &mut Box<F>> {
        self.entries.iter_mut().map(|(_, cb)| cb)
    }
}

/// Callback lists for every notification kind
#[derive(Default)]
pub struct Observers {
    next_id: u64,
    disabled: bool,
    song_change: CallbackList<dyn FnMut(Option<&MediaItem>, Option<&Track>) + Send>,
    next_track_armed: CallbackList<dyn FnMut(Option<&MediaItem>) + Send>,
    play_time: CallbackList<dyn FnMut(f64, f64, bool) + Send>,
    loop_mode: CallbackList<dyn FnMut(LoopMode) + Send>,
    volume: CallbackList<dyn FnMut(u8) + Send>,
    queue_change: CallbackList<dyn FnMut(&[MediaItem]) + Send>,
    audio_info: CallbackList<dyn FnMut(&AudioInfo) + Send>,
    seek: CallbackList<dyn FnMut() + Send>,
    paused: CallbackList<dyn FnMut() + Send>,
    stopped: CallbackList<dyn FnMut() + Send>,
    playing: CallbackList<dyn FnMut() + Send>,
}

impl Observers {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&mut self, kind: EventKind) -> SubscriptionId {
        self.next_id += 1;
        SubscriptionId {
            kind,
            id: self.next_id,
        }
    }

    /// Silence every notification from now on (used right before shutdown)
    pub fn disable(&mut self) {
        self.disabled = true;
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn on_song_change(&mut self, cb: SongChangeFn) -> SubscriptionId {
        let sub = self.allocate(EventKind::SongChange);
        self.song_change.push(sub.id, cb);
        sub
    }

    pub fn on_next_track_armed(&mut self, cb: NextTrackArmedFn) -> SubscriptionId {
        let sub = self.allocate(EventKind::NextTrackArmed);
        self.next_track_armed.push(sub.id, cb);
        sub
    }

    pub fn on_play_time(&mut self, cb: PlayTimeFn) -> SubscriptionId {
        let sub = self.allocate(EventKind::PlayTime);
        self.play_time.push(sub.id, cb);
        sub
    }

    pub fn on_loop_mode_change(&mut self, cb: LoopModeFn) -> SubscriptionId {
        let sub = self.allocate(EventKind::LoopMode);
        self.loop_mode.push(sub.id, cb);
        sub
    }

    pub fn on_volume_change(&mut self, cb: VolumeFn) -> SubscriptionId {
        let sub = self.allocate(EventKind::Volume);
        self.volume.push(sub.id, cb);
        sub
    }

    pub fn on_queue_change(&mut self, cb: QueueChangeFn) -> SubscriptionId {
        let sub = self.allocate(EventKind::QueueChange);
        self.queue_change.push(sub.id, cb);
        sub
    }

    pub fn on_audio_info_change(&mut self, cb: AudioInfoFn) -> SubscriptionId {
        let sub = self.allocate(EventKind::AudioInfo);
        self.audio_info.push(sub.id, cb);
        sub
    }

    pub fn on_seek(&mut self, cb: NotifyFn) -> SubscriptionId {
        let sub = self.allocate(EventKind::Seek);
        self.seek.push(sub.id, cb);
        sub
    }

    pub fn on_paused(&mut self, cb: NotifyFn) -> SubscriptionId {
        let sub = self.allocate(EventKind::Paused);
        self.paused.push(sub.id, cb);
        sub
    }

    pub fn on_stopped(&mut self, cb: NotifyFn) -> SubscriptionId {
        let sub = self.allocate(EventKind::Stopped);
        self.stopped.push(sub.id, cb);
        sub
    }

    pub fn on_playing(&mut self, cb: NotifyFn) -> SubscriptionId {
        let sub = self.allocate(EventKind::Playing);
        self.playing.push(sub.id, cb);
        sub
    }

    /// Remove a subscription. Returns `false` if it was already gone.
    pub fn unsubscribe(&mut self, sub: SubscriptionId) -> bool {
        match sub.kind {
            EventKind::SongChange => self.song_change.remove(sub.id),
            EventKind::NextTrackArmed => self.next_track_armed.remove(sub.id),
            EventKind::PlayTime => self.play_time.remove(sub.id),
            EventKind::LoopMode => self.loop_mode.remove(sub.id),
            EventKind::Volume => self.volume.remove(sub.id),
            EventKind::QueueChange => self.queue_change.remove(sub.id),
            EventKind::AudioInfo => self.audio_info.remove(sub.id),
            EventKind::Seek => self.seek.remove(sub.id),
            EventKind::Paused => self.paused.remove(sub.id),
            EventKind::Stopped => self.stopped.remove(sub.id),
            EventKind::Playing => self.playing.remove(sub.id),
        }
    }

    pub(crate) fn song_change(&mut self, now: Option<&MediaItem>, scrobbled: Option<&Track>) {
        if self.disabled {
            return;
        }
        for cb in self.song_change.iter_mut() {
            cb(now, scrobbled);
        }
    }

    pub(crate) fn next_track_armed(&mut self, next: Option<&MediaItem>) {
        if self.disabled {
            return;
        }
        for cb in self.next_track_armed.iter_mut() {
            cb(next);
        }
    }

    pub(crate) fn play_time(&mut self, pos: f64, duration: f64, seeked: bool) {
        if self.disabled {
            return;
        }
        for cb in self.play_time.iter_mut() {
            cb(pos, duration, seeked);
        }
    }

    pub(crate) fn loop_mode(&mut self, mode: LoopMode) {
        if self.disabled {
            return;
        }
        for cb in self.loop_mode.iter_mut() {
            cb(mode);
        }
    }

    pub(crate) fn volume(&mut self, volume: u8) {
        if self.disabled {
            return;
        }
        for cb in self.volume.iter_mut() {
            cb(volume);
        }
    }

    /// Whether anyone listens for queue changes (skips the snapshot copy)
    pub(crate) fn wants_queue_change(&self) -> bool {
        !self.disabled && !self.queue_change.entries.is_empty()
    }

    pub(crate) fn queue_change(&mut self, snapshot: &[MediaItem]) {
        if self.disabled {
            return;
        }
        for cb in self.queue_change.iter_mut() {
            cb(snapshot);
        }
    }

    pub(crate) fn audio_info(&mut self, info: &AudioInfo) {
        if self.disabled {
            return;
        }
        for cb in self.audio_info.iter_mut() {
            cb(info);
        }
    }

    pub(crate) fn notify(&mut self, kind: EventKind) {
        if self.disabled {
            return;
        }
        let list = match kind {
            EventKind::Seek => &mut self.seek,
            EventKind::Paused => &mut self.paused,
            EventKind::Stopped => &mut self.stopped,
            EventKind::Playing => &mut self.playing,
            _ => return,
        };
        for cb in list.iter_mut() {
            cb();
        }
    }
}

impl std::fmt::Debug for Observers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observers")
            .field("disabled", &self.disabled)
            .field("song_change", &self.song_change.entries.len())
            .field("queue_change", &self.queue_change.entries.len())
            .field("play_time", &self.play_time.entries.len())
            .finish_non_exhaustive()
    }
}
