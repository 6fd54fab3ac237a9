//! Playback engine - queue ownership and track transitions
//!
//! The engine owns the play queue and the now-playing index, hands items to
//! the active backend, keeps the backend's gapless "next" slot armed, and
//! decides when a play is reported to the library server.
//!
//! All state is mutated through `&mut self`. Backends report back through a
//! channel (see [`tonearm_player::EventSink`]); the owner of the engine feeds
//! those events in with [`PlaybackEngine::handle_player_event`] or drains
//! them with [`PlaybackEngine::process_pending`].

use crate::error::{PlaybackError, Result};
use crate::observers::{
    AudioInfoFn, EventKind, LoopModeFn, NextTrackArmedFn, NotifyFn, Observers, PlayTimeFn,
    QueueChangeFn, SongChangeFn, SubscriptionId, VolumeFn,
};
use crate::poller::PositionPoller;
use crate::settings::{EngineSettings, ReplayGainSettings, ScrobbleSettings};
use crate::stopwatch::Stopwatch;
use crate::types::{InsertMode, LoopMode, PlaybackStatus};
use crossbeam_channel::{Receiver, Sender};
use rand::seq::SliceRandom;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::runtime::Handle;
use tonearm_core::{LibraryProvider, MediaItem, RadioStation, Track};
use tonearm_player::{
    Backend, EventSink, PlayerEvent, PlayerState, PlayerStatus, ReplayGainMode, TaggedEvent,
};
use tracing::{debug, trace, warn};

/// Plays shorter than this are not reported at all
const MIN_REPORTED_PLAY_SECS: f64 = 0.1;

/// Queue-owning playback state machine
pub struct PlaybackEngine {
    provider: Arc<dyn LibraryProvider>,
    runtime: Handle,
    backend: Backend,

    /// Attachment generation of the current backend
    generation: u64,
    events_tx: Sender<TaggedEvent>,
    events_rx: Receiver<TaggedEvent>,
    ticks_rx: Receiver<()>,
    poller: PositionPoller,

    queue: Vec<MediaItem>,
    now_playing: Option<usize>,
    loop_mode: LoopMode,

    /// While set, `queue` is in shuffled order and `unshuffled_order` holds
    /// the item IDs in the order they were loaded
    shuffle: bool,
    unshuffled_order: Vec<String>,

    /// Queue index currently armed in the backend's gapless slot
    armed_next: Option<usize>,

    /// Index an explicit play is waiting to land on. While set, the next
    /// track-changed event takes this index instead of advancing.
    pending_track_change: Option<usize>,

    /// Set by a hot-swap resume: the next track-changed event continues the
    /// current play instead of starting a new one
    resuming: bool,

    /// True iff the backend was stopped before the next track-changed event
    was_stopped: bool,

    /// True iff the previously playing item was already finalized
    already_scrobbled: bool,

    is_radio: bool,
    cur_track_duration: f64,

    /// Furthest position reached in the current item, reset on finalize
    latest_track_position: f64,

    /// Handed to the next song-change notification, then cleared
    last_scrobbled: Option<Track>,
    play_time: Stopwatch,

    /// Status captured from a paused backend during a hot swap
    pending_player_change: Option<PlayerStatus>,
    pause_after_current: bool,

    scrobble: ScrobbleSettings,
    replay_gain: ReplayGainSettings,
    seek_back_restart_secs: f64,

    observers: Observers,
}

impl PlaybackEngine {
    /// Create an engine driving `backend`
    ///
    /// `runtime` runs the position poller and the fire-and-forget reports to
    /// the provider.
    pub fn new(
        provider: Arc<dyn LibraryProvider>,
        mut backend: Backend,
        settings: &EngineSettings,
        runtime: Handle,
    ) -> Self {
        let settings = settings.clone().normalized();
        let (events_tx, events_rx) = crossbeam_channel::unbounded();
        let (ticks_tx, ticks_rx) = crossbeam_channel::bounded(1);

        let generation = 1;
        backend.set_event_sink(Some(EventSink::new(generation, events_tx.clone())));

        let poller = PositionPoller::new(
            runtime.clone(),
            settings.playback.poll_interval(),
            ticks_tx,
        );

        let mut engine = Self {
            provider,
            runtime,
            backend,
            generation,
            events_tx,
            events_rx,
            ticks_rx,
            poller,
            queue: Vec::new(),
            now_playing: None,
            loop_mode: settings.playback.loop_mode,
            shuffle: false,
            unshuffled_order: Vec::new(),
            armed_next: None,
            pending_track_change: None,
            resuming: false,
            was_stopped: true,
            already_scrobbled: false,
            is_radio: false,
            cur_track_duration: 0.0,
            latest_track_position: 0.0,
            last_scrobbled: None,
            play_time: Stopwatch::new(),
            pending_player_change: None,
            pause_after_current: false,
            scrobble: settings.scrobble,
            replay_gain: settings.replay_gain,
            seek_back_restart_secs: settings.playback.seek_back_restart_secs,
            observers: Observers::new(),
        };

        if engine.replay_gain.mode.resolve() != ReplayGainMode::None {
            engine.apply_replay_gain(engine.replay_gain.mode.resolve());
        }

        debug!(flavor = engine.backend.flavor(), "Playback engine created");
        engine
    }

    // ===== Queries =====

    /// The now-playing item, unless playback is stopped
    pub fn now_playing(&self) -> Option<MediaItem> {
        if self.playback_status().state == PlayerState::Stopped {
            return None;
        }
        self.now_playing
            .and_then(|idx| self.queue.get(idx))
            .cloned()
    }

    pub fn now_playing_index(&self) -> Option<usize> {
        self.now_playing
    }

    /// Copy of the play queue
    pub fn play_queue(&self) -> Vec<MediaItem> {
        self.queue.clone()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn loop_mode(&self) -> LoopMode {
        self.loop_mode
    }

    pub fn is_shuffle(&self) -> bool {
        self.shuffle
    }

    /// Queue index armed in the backend's gapless slot
    pub fn armed_next_index(&self) -> Option<usize> {
        self.armed_next
    }

    pub fn volume(&self) -> u8 {
        self.backend.volume()
    }

    pub fn is_seeking(&self) -> bool {
        self.backend.is_seeking()
    }

    pub fn is_pause_after_current(&self) -> bool {
        self.pause_after_current
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    /// Current state and position
    ///
    /// While a hot swap left playback paused, this reports the status
    /// captured from the previous backend.
    pub fn playback_status(&self) -> PlaybackStatus {
        let status = self
            .pending_player_change
            .unwrap_or_else(|| self.backend.status());
        PlaybackStatus {
            state: status.state,
            time_pos: status.time_pos,
            duration: self.cur_track_duration,
        }
    }

    /// Receiver of backend events, for owners that multiplex channels
    pub fn event_receiver(&self) -> Receiver<TaggedEvent> {
        self.events_rx.clone()
    }

    /// Receiver of position poll ticks, for owners that multiplex channels
    pub fn tick_receiver(&self) -> Receiver<()> {
        self.ticks_rx.clone()
    }

    // ===== Observers =====

    pub fn on_song_change(&mut self, cb: SongChangeFn) -> SubscriptionId {
        self.observers.on_song_change(cb)
    }

    pub fn on_next_track_armed(&mut self, cb: NextTrackArmedFn) -> SubscriptionId {
        self.observers.on_next_track_armed(cb)
    }

    pub fn on_play_time(&mut self, cb: PlayTimeFn) -> SubscriptionId {
        self.observers.on_play_time(cb)
    }

    pub fn on_loop_mode_change(&mut self, cb: LoopModeFn) -> SubscriptionId {
        self.observers.on_loop_mode_change(cb)
    }

    pub fn on_volume_change(&mut self, cb: VolumeFn) -> SubscriptionId {
        self.observers.on_volume_change(cb)
    }

    pub fn on_queue_change(&mut self, cb: QueueChangeFn) -> SubscriptionId {
        self.observers.on_queue_change(cb)
    }

    pub fn on_audio_info_change(&mut self, cb: AudioInfoFn) -> SubscriptionId {
        self.observers.on_audio_info_change(cb)
    }

    pub fn on_seek(&mut self, cb: NotifyFn) -> SubscriptionId {
        self.observers.on_seek(cb)
    }

    pub fn on_paused(&mut self, cb: NotifyFn) -> SubscriptionId {
        self.observers.on_paused(cb)
    }

    pub fn on_stopped(&mut self, cb: NotifyFn) -> SubscriptionId {
        self.observers.on_stopped(cb)
    }

    pub fn on_playing(&mut self, cb: NotifyFn) -> SubscriptionId {
        self.observers.on_playing(cb)
    }

    pub fn unsubscribe(&mut self, sub: SubscriptionId) -> bool {
        self.observers.unsubscribe(sub)
    }

    /// Silence all notifications. Only meant to be called before quitting.
    pub fn disable_callbacks(&mut self) {
        self.observers.disable();
    }

    // ===== Transport =====

    /// Play the queue item at `idx` from the beginning
    pub fn play_track_at(&mut self, idx: usize) -> Result<()> {
        self.play_track_from(idx, 0.0)
    }

    fn play_track_from(&mut self, idx: usize, start_secs: f64) -> Result<()> {
        let len = self.queue.len();
        if idx >= len {
            return Err(PlaybackError::IndexOutOfRange { index: idx, len });
        }

        // Finalize whatever was playing before the index moves
        self.check_scrobble();
        self.already_scrobbled = true;
        self.pending_player_change = None;
        self.pending_track_change = Some(idx);

        if let Err(e) = self.play_index(idx, start_secs) {
            self.pending_track_change = None;
            return Err(e);
        }
        self.now_playing = Some(idx);
        Ok(())
    }

    /// Resume the current item at `start_secs` on a freshly installed backend
    fn resume_at(&mut self, idx: usize, start_secs: f64) -> Result<()> {
        self.already_scrobbled = true;
        self.resuming = true;
        self.pending_track_change = Some(idx);

        if let Err(e) = self.play_index(idx, start_secs) {
            self.pending_track_change = None;
            self.resuming = false;
            return Err(e);
        }
        self.now_playing = Some(idx);
        Ok(())
    }

    /// Resume playback
    ///
    /// Restarts a play interrupted by a hot swap, starts the queue from the
    /// top when stopped, and otherwise unpauses the backend.
    pub fn continue_playback(&mut self) -> Result<()> {
        if let Some(status) = self.pending_player_change.take() {
            return match self.now_playing {
                Some(idx) if idx < self.queue.len() => self.resume_at(idx, status.time_pos),
                _ => Ok(()),
            };
        }

        if self.playback_status().state == PlayerState::Stopped {
            if self.queue.is_empty() {
                return Ok(());
            }
            return self.play_track_at(0);
        }
        self.backend.continue_playback()?;
        Ok(())
    }

    pub fn pause(&mut self) -> Result<()> {
        self.backend.pause()?;
        Ok(())
    }

    pub fn stop(&mut self) -> Result<()> {
        self.stop_backend()
    }

    /// Stop the backend
    ///
    /// A backend installed by a paused hot swap has not started anything, so
    /// stopping it raises no stopped event and the stop is handled here.
    fn stop_backend(&mut self) -> Result<()> {
        let swapped = self.pending_player_change.take().is_some();
        self.backend.stop()?;
        if swapped {
            self.handle_stopped();
        }
        Ok(())
    }

    /// Pause when the current item ends (one shot)
    pub fn set_pause_after_current(&mut self, pause: bool) {
        self.pause_after_current = pause;
    }

    /// Seek within the current item. Radio stations cannot be seeked.
    pub fn seek_seconds(&mut self, secs: f64) -> Result<()> {
        if self.is_radio {
            return Ok(());
        }
        self.backend.seek_seconds(secs.max(0.0))?;
        Ok(())
    }

    /// Play the next item. No-op when stopped.
    ///
    /// At the end of the queue this surfaces `IndexOutOfRange`.
    pub fn seek_next(&mut self) -> Result<()> {
        if self.playback_status().state == PlayerState::Stopped {
            return Ok(());
        }
        match self.now_playing {
            Some(idx) => self.play_track_at(idx + 1),
            None => Ok(()),
        }
    }

    /// Restart the current item, or go to the previous one when near its start
    pub fn seek_back_or_previous(&mut self) -> Result<()> {
        let Some(idx) = self.now_playing else {
            return Ok(());
        };
        if idx == 0 || self.playback_status().time_pos > self.seek_back_restart_secs {
            return self.seek_seconds(0.0);
        }
        self.play_track_at(idx - 1)
    }

    /// Move `n` items forward (positive) or backward (negative)
    ///
    /// Moving back while past the restart threshold spends one step on
    /// restarting the current item. Moving forward from the last item wraps
    /// to the first.
    pub fn seek_fwd_back_n(&mut self, n: i64) -> Result<()> {
        let Some(idx) = self.now_playing else {
            return Ok(());
        };
        if self.queue.is_empty() {
            return Ok(());
        }

        let mut n = n;
        if n < 0 && self.playback_status().time_pos > self.seek_back_restart_secs {
            n += 1;
        }
        if n == 0 || (idx == 0 && n < 0) {
            return self.seek_seconds(0.0);
        }

        let last = self.queue.len() - 1;
        let target = if idx >= last && n > 0 {
            0
        } else {
            let target = (idx as i64 + n).clamp(0, last as i64);
            target as usize
        };
        self.play_track_at(target)
    }

    /// Set output volume, clamped to 100
    pub fn set_volume(&mut self, volume: u8) -> Result<()> {
        let volume = volume.min(100);
        self.backend.set_volume(volume)?;
        self.observers.volume(volume);
        Ok(())
    }

    pub fn set_loop_mode(&mut self, mode: LoopMode) {
        self.loop_mode = mode;
        if self.now_playing.is_some() {
            self.update_next_track(false);
        }
        self.observers.loop_mode(mode);
    }

    /// Switch to the next loop mode in the None, All, One cycle
    pub fn set_next_loop_mode(&mut self) {
        self.set_loop_mode(self.loop_mode.next());
    }

    /// Switch shuffle mode
    ///
    /// Turning it on shuffles the queue with the now-playing item moved to
    /// the front. Turning it off puts the items back in the order they were
    /// loaded in. Either way the now-playing item keeps playing.
    pub fn set_shuffle(&mut self, shuffle: bool) {
        if self.shuffle == shuffle {
            return;
        }
        self.shuffle = shuffle;

        let queue = std::mem::take(&mut self.queue);
        let (queue, moved) = if shuffle {
            self.unshuffled_order = queue.iter().map(|item| item.id().to_owned()).collect();
            shuffle_with_front(queue, self.now_playing)
        } else {
            let order = std::mem::take(&mut self.unshuffled_order);
            restore_order(&order, queue)
        };
        self.queue = queue;
        self.now_playing = self.now_playing.and_then(|idx| moved.get(idx).copied());
        self.pending_track_change = self
            .pending_track_change
            .and_then(|idx| moved.get(idx).copied());

        debug!(shuffle, now_playing = ?self.now_playing, "Shuffle mode changed");
        if self.now_playing.is_some() {
            self.rearm_next_track();
        }
        self.notify_queue_change();
    }

    /// Bring the unshuffled order in line with the queue after an edit
    fn sync_unshuffled_order(&mut self) {
        if self.shuffle {
            self.unshuffled_order = reconcile_order(&self.unshuffled_order, &self.queue);
        }
    }

    // ===== Queue mutation =====

    /// Load items into the queue
    ///
    /// The engine stores its own copies. `shuffle` shuffles the loaded batch,
    /// never the existing queue. In shuffle mode every batch is shuffled.
    pub fn load_items(&mut self, items: &[MediaItem], mode: InsertMode, shuffle: bool) -> Result<()> {
        self.insert_items(items.to_vec(), mode, shuffle)
    }

    pub fn load_tracks(&mut self, tracks: &[Track], mode: InsertMode, shuffle: bool) -> Result<()> {
        let items = tracks.iter().cloned().map(MediaItem::from).collect();
        self.insert_items(items, mode, shuffle)
    }

    pub fn load_radio_station(&mut self, station: &RadioStation, mode: InsertMode) -> Result<()> {
        self.insert_items(vec![MediaItem::from(station.clone())], mode, false)
    }

    /// Replace the queue with `station` and start playing it
    pub fn play_radio_station(&mut self, station: &RadioStation) -> Result<()> {
        self.load_radio_station(station, InsertMode::Replace)?;
        self.play_track_at(0)
    }

    fn insert_items(&mut self, mut items: Vec<MediaItem>, mode: InsertMode, shuffle: bool) -> Result<()> {
        if mode == InsertMode::Replace {
            self.finalize_current();
            self.reset_queue()?;
        }

        let old_len = self.queue.len();
        let next_changed = !items.is_empty()
            && self.now_playing.is_some()
            && (mode != InsertMode::Append || self.now_playing == old_len.checked_sub(1));

        if self.shuffle {
            let batch = items.iter().map(|item| item.id().to_owned());
            let order_at = match mode {
                InsertMode::Replace | InsertMode::Append => self.unshuffled_order.len(),
                InsertMode::InsertNext => self
                    .now_playing
                    .and_then(|idx| self.queue.get(idx))
                    .and_then(|current| self.unshuffled_order.iter().position(|id| id == current.id()))
                    .map_or(0, |pos| pos + 1),
            };
            self.unshuffled_order.splice(order_at..order_at, batch);
        }
        if shuffle || self.shuffle {
            items.shuffle(&mut rand::thread_rng());
        }

        let at = match mode {
            InsertMode::Replace | InsertMode::Append => old_len,
            InsertMode::InsertNext => self.now_playing.map_or(0, |idx| idx + 1).min(old_len),
        };
        let count = items.len();
        self.queue.splice(at..at, items);

        let shift = |idx: usize| if idx >= at { idx + count } else { idx };
        self.pending_track_change = self.pending_track_change.map(shift);
        self.armed_next = self.armed_next.map(shift);

        debug!(count, at, ?mode, "Loaded items into play queue");
        if next_changed {
            self.update_next_track(true);
        }
        self.notify_queue_change();
        Ok(())
    }

    /// Stop playback and empty the queue (logout, shutdown)
    pub fn stop_and_clear_play_queue(&mut self) {
        let changed = !self.queue.is_empty();
        self.finalize_current();
        if let Err(e) = self.reset_queue() {
            warn!(error = %e, "Failed to stop player while clearing the queue");
        }
        if changed {
            self.notify_queue_change();
        }
    }

    /// Finalize the scrobble of the current item ahead of a stop
    fn finalize_current(&mut self) {
        if self.now_playing.is_some() && !self.already_scrobbled {
            self.check_scrobble();
            self.already_scrobbled = true;
        }
    }

    fn reset_queue(&mut self) -> Result<()> {
        self.pending_track_change = None;
        self.resuming = false;
        self.now_playing = None;
        self.armed_next = None;
        self.queue.clear();
        self.unshuffled_order.clear();
        self.stop_backend()
    }

    /// Replace the queue wholesale (e.g. after a reorder)
    ///
    /// Playback continues if the now-playing item's ID is still present; the
    /// index moves to its first occurrence. Otherwise playback stops.
    pub fn update_play_queue(&mut self, items: &[MediaItem]) -> Result<()> {
        let new_queue = items.to_vec();
        let new_now = self
            .now_playing
            .and_then(|idx| self.queue.get(idx))
            .and_then(|current| new_queue.iter().position(|item| item.id() == current.id()));

        if self.now_playing.is_some() && new_now.is_none() {
            debug!("Now-playing item left the queue, stopping");
            self.finalize_current();
            self.queue = new_queue;
            self.sync_unshuffled_order();
            self.now_playing = None;
            self.armed_next = None;
            self.pending_track_change = None;
            self.notify_queue_change();
            return self.stop();
        }

        let was_playing = self.now_playing.is_some();
        self.queue = new_queue;
        self.sync_unshuffled_order();
        self.now_playing = new_now;
        if self.pending_track_change.is_some() {
            self.pending_track_change = new_now;
        }
        if was_playing {
            self.rearm_next_track();
        }
        self.notify_queue_change();
        Ok(())
    }

    /// Remove the items at `idxs`
    ///
    /// The now-playing index keeps pointing at the same item. If that item is
    /// removed, the next surviving item starts playing (wrapping to the top
    /// under [`LoopMode::All`]) or playback stops when there is none.
    pub fn remove_tracks_from_queue(&mut self, idxs: &[usize]) -> Result<()> {
        let len = self.queue.len();
        let removed: HashSet<usize> = idxs.iter().copied().filter(|&i| i < len).collect();
        if removed.is_empty() {
            return Ok(());
        }
        let shift = |idx: usize| removed.iter().filter(|&&r| r < idx).count();

        let now = self.now_playing;
        let playing_removed = now.is_some_and(|idx| removed.contains(&idx));
        if playing_removed {
            self.check_scrobble();
            self.already_scrobbled = true;
        }

        let armed = self.armed_next;
        let armed_removed = armed.is_some_and(|idx| removed.contains(&idx));
        let new_now = now.map(|idx| idx - shift(idx));
        let new_armed = armed.filter(|_| !armed_removed).map(|idx| idx - shift(idx));
        let new_pending = self
            .pending_track_change
            .filter(|idx| !removed.contains(idx))
            .map(|idx| idx - shift(idx));

        let old = std::mem::take(&mut self.queue);
        self.queue = old
            .into_iter()
            .enumerate()
            .filter(|(i, _)| !removed.contains(i))
            .map(|(_, item)| item)
            .collect();
        self.sync_unshuffled_order();
        let new_len = self.queue.len();

        let mut result = Ok(());
        if playing_removed {
            // Every slot before the old index that survived shifted down, so
            // `new_now` is where the next surviving item now sits
            let slot = new_now.unwrap_or(0);
            let target = if slot < new_len {
                Some(slot)
            } else if self.loop_mode == LoopMode::All && new_len > 0 {
                Some(0)
            } else {
                None
            };

            self.armed_next = None;
            match target {
                Some(target) => {
                    debug!(target, "Now-playing item removed, playing next survivor");
                    self.pending_player_change = None;
                    self.pending_track_change = Some(target);
                    self.now_playing = Some(target);
                    if let Err(e) = self.play_index(target, 0.0) {
                        self.pending_track_change = None;
                        result = Err(e);
                    }
                }
                None => {
                    debug!("Now-playing item removed at end of queue, stopping");
                    self.now_playing = None;
                    self.pending_track_change = None;
                    result = self.stop_backend();
                }
            }
        } else {
            self.now_playing = new_now;
            self.armed_next = new_armed;
            self.pending_track_change = new_pending;
            if self.now_playing.is_some() {
                if armed_removed {
                    // The removed item is still sitting in the backend's slot
                    self.rearm_next_track();
                } else {
                    self.update_next_track(false);
                }
            }
        }

        self.notify_queue_change();
        result
    }

    // ===== External track changes =====

    /// Mirror a favorite change made elsewhere into every queued copy
    pub fn on_track_favorite_changed(&mut self, id: &str, favorite: bool) {
        for track in self.tracks_with_id(id) {
            track.favorite = favorite;
        }
    }

    /// Mirror a rating change made elsewhere into every queued copy
    pub fn on_track_rating_changed(&mut self, id: &str, rating: u8) {
        for track in self.tracks_with_id(id) {
            track.rating = rating;
        }
    }

    fn tracks_with_id<'a>(&'a mut self, id: &'a str) -> impl Iterator<Item = &'a mut Track> + 'a {
        self.queue
            .iter_mut()
            .filter_map(MediaItem::as_track_mut)
            .filter(move |track| track.id == id)
    }

    // ===== Replay gain =====

    pub fn set_replay_gain_options(&mut self, settings: ReplayGainSettings) {
        self.replay_gain = settings;
        self.apply_replay_gain(self.replay_gain.mode.resolve());
    }

    /// Override the mode for what is about to play, keeping preamp and
    /// clipping settings
    pub fn set_replay_gain_mode(&mut self, mode: ReplayGainMode) {
        self.apply_replay_gain(mode);
    }

    fn apply_replay_gain(&mut self, mode: ReplayGainMode) {
        let options = self.replay_gain.options_with_mode(mode);
        match self.backend.replay_gain() {
            Some(player) => {
                if let Err(e) = player.set_replay_gain_options(options) {
                    warn!(error = %e, "Failed to apply replay gain options");
                }
            }
            None => warn!("Player doesn't support replay gain"),
        }
    }

    // ===== Backend hot swap =====

    /// Switch to another backend
    ///
    /// If the old backend was playing, the current item resumes on the new
    /// one at the same position. If it was paused, the position is kept and
    /// [`continue_playback`](Self::continue_playback) resumes there.
    pub fn set_player(&mut self, backend: Backend) -> Result<()> {
        let mut status = self.backend.status();
        if let Some(pending) = self.pending_player_change {
            status = pending;
        }

        let resume = status.state == PlayerState::Playing;
        if status.state != PlayerState::Stopped {
            self.pending_player_change = Some(PlayerStatus {
                state: PlayerState::Paused,
                ..status
            });
        }
        self.poller.stop();
        self.play_time.stop();

        // Detach first so nothing the old backend emits from here on counts
        self.generation += 1;
        self.backend.set_event_sink(None);
        if let Err(e) = self.backend.stop() {
            warn!(error = %e, "Failed to stop outgoing player");
        }
        let old_volume = self.backend.volume();

        let old = std::mem::replace(&mut self.backend, backend);
        debug!(from = old.flavor(), to = self.backend.flavor(), resume, "Switching player");
        drop(old);

        self.backend.set_event_sink(Some(EventSink::new(
            self.generation,
            self.events_tx.clone(),
        )));
        self.armed_next = None;
        if self.replay_gain.mode.resolve() != ReplayGainMode::None {
            self.apply_replay_gain(self.replay_gain.mode.resolve());
        }

        if resume {
            self.pending_player_change = None;
            if let Some(idx) = self.now_playing.filter(|&idx| idx < self.queue.len()) {
                self.resume_at(idx, status.time_pos)?;
            }
        }

        let volume = self.backend.volume();
        if volume != old_volume {
            self.observers.volume(volume);
        }
        Ok(())
    }

    // ===== Backend events =====

    /// Apply one backend event
    ///
    /// Events from a detached backend are dropped.
    pub fn handle_player_event(&mut self, tagged: TaggedEvent) {
        if tagged.generation != self.generation {
            trace!(
                generation = tagged.generation,
                current = self.generation,
                "Dropping event from detached player"
            );
            return;
        }

        match tagged.event {
            PlayerEvent::TrackChanged => self.handle_track_changed(),
            PlayerEvent::Stopped => self.handle_stopped(),
            PlayerEvent::Seeked => {
                self.handle_time_pos_update(true);
                self.observers.notify(EventKind::Seek);
            }
            PlayerEvent::Paused => {
                self.play_time.stop();
                self.poller.stop();
                self.observers.notify(EventKind::Paused);
            }
            PlayerEvent::Playing => {
                self.play_time.start();
                self.poller.start();
                self.observers.notify(EventKind::Playing);
            }
            PlayerEvent::VolumeChanged(volume) => self.observers.volume(volume),
            PlayerEvent::AudioInfoChanged(info) => self.observers.audio_info(&info),
        }
    }

    /// Apply one position poll tick. Stale ticks after a stop are ignored.
    pub fn handle_poll_tick(&mut self) {
        if self.poller.is_running() {
            self.handle_time_pos_update(false);
        }
    }

    /// Drain every queued backend event and poll tick
    ///
    /// Returns the number of events applied.
    pub fn process_pending(&mut self) -> usize {
        let mut applied = 0;
        loop {
            if let Ok(event) = self.events_rx.try_recv() {
                self.handle_player_event(event);
                applied += 1;
                continue;
            }
            if self.ticks_rx.try_recv().is_ok() {
                self.handle_poll_tick();
                continue;
            }
            return applied;
        }
    }

    fn handle_track_changed(&mut self) {
        if !self.already_scrobbled {
            self.check_scrobble();
        }
        if self.backend.status().state == PlayerState::Playing {
            self.play_time.start();
        }

        let len = self.queue.len();
        let next = match self.pending_track_change.take() {
            Some(idx) => Some(idx),
            None if self.was_stopped || self.loop_mode != LoopMode::One => {
                let idx = self.now_playing.map_or(0, |idx| idx + 1);
                if idx >= len && self.loop_mode == LoopMode::All {
                    Some(0)
                } else {
                    Some(idx)
                }
            }
            None => self.now_playing,
        };

        let Some(idx) = next.filter(|&idx| idx < len) else {
            warn!(?next, len, "Track change with no matching queue item");
            self.now_playing = None;
            self.resuming = false;
            return;
        };

        self.now_playing = Some(idx);
        let item = &self.queue[idx];
        self.is_radio = item.is_radio();
        self.cur_track_duration = item.duration().as_secs_f64();
        debug!(index = idx, id = item.id(), "Track changed");

        self.was_stopped = false;
        self.already_scrobbled = false;

        // A hot-swap resume continues the same play
        if self.resuming {
            self.resuming = false;
        } else {
            // Must precede the song-change notification, which carries the
            // track this may scrobble
            self.send_now_playing_scrobble();
        }

        let scrobbled = self.last_scrobbled.take();
        let now = self.queue[idx].clone();
        self.observers.song_change(Some(&now), scrobbled.as_ref());

        self.handle_time_pos_update(false);

        // Whatever was armed has been consumed or cleared by the backend
        self.armed_next = None;
        self.update_next_track(true);

        if self.pause_after_current {
            self.pause_after_current = false;
            if let Err(e) = self.backend.pause() {
                warn!(error = %e, "Failed to pause after current track");
            }
        }
    }

    fn handle_stopped(&mut self) {
        self.play_time.stop();
        self.poller.stop();

        if self.pending_track_change.is_some() {
            if self.backend.status().state != PlayerState::Stopped {
                // An explicit play is already on its way; its track-changed
                // event settles the index
                trace!("Stop event while a track change is pending");
                return;
            }
            debug!("Player stopped before the requested item started");
            self.pending_track_change = None;
            self.resuming = false;
        }

        if !self.already_scrobbled {
            self.check_scrobble();
        }
        self.handle_time_pos_update(false);

        let scrobbled = self.last_scrobbled.take();
        self.observers.song_change(None, scrobbled.as_ref());
        self.observers.notify(EventKind::Stopped);

        debug!("Playback stopped");
        self.already_scrobbled = false;
        self.was_stopped = true;
        self.now_playing = None;
        self.armed_next = None;
        self.is_radio = false;
        self.pause_after_current = false;
    }

    fn handle_time_pos_update(&mut self, seeked: bool) {
        if self.observers.is_disabled() {
            return;
        }
        let status = self.playback_status();
        if status.time_pos > self.latest_track_position {
            self.latest_track_position = status.time_pos;
        }
        let duration = if self.is_radio { 0.0 } else { status.duration };
        self.observers.play_time(status.time_pos, duration, seeked);
    }

    fn notify_queue_change(&mut self) {
        if self.observers.wants_queue_change() {
            let snapshot = self.queue.clone();
            self.observers.queue_change(&snapshot);
        }
    }

    // ===== Scrobble accounting =====

    /// Finalize the play of the now-playing item
    ///
    /// Must run before the now-playing index moves.
    fn check_scrobble(&mut self) {
        if !self.scrobble.enabled || self.queue.is_empty() {
            return;
        }
        let Some(idx) = self.now_playing else {
            return;
        };

        let played = self.play_time.elapsed().as_secs_f64();
        let duration = self.cur_track_duration;
        let client_decides = self.provider.client_decides_scrobble();
        let threshold_time = self.scrobble.threshold_time_secs;
        let threshold_percent = f64::from(self.scrobble.threshold_percent);

        // Radio stations are never scrobbled
        let Some(track) = self.queue.get_mut(idx).and_then(MediaItem::as_track_mut) else {
            return;
        };
        if played < MIN_REPORTED_PLAY_SECS || duration < MIN_REPORTED_PLAY_SECS {
            return;
        }

        let percent = played / duration * 100.0;
        let time_met = threshold_time >= 0 && played >= threshold_time as f64;
        let submission = client_decides && (time_met || percent >= threshold_percent);
        if submission {
            track.play_count += 1;
            self.last_scrobbled = Some(track.clone());
        }

        let id = track.id.clone();
        let position = self.latest_track_position as u32;
        debug!(track_id = %id, played, percent, submission, "Finalizing play");
        self.report_ended(id, position, submission);

        self.latest_track_position = 0.0;
        self.play_time.reset();
    }

    /// Announce the new now-playing item to the server
    fn send_now_playing_scrobble(&mut self) {
        if !self.scrobble.enabled || self.queue.is_empty() {
            return;
        }
        let Some(idx) = self.now_playing else {
            return;
        };
        let client_decides = self.provider.client_decides_scrobble();
        let Some(track) = self.queue.get_mut(idx).and_then(MediaItem::as_track_mut) else {
            return;
        };

        if !client_decides {
            // The server counts the play as soon as it starts
            track.play_count += 1;
            self.last_scrobbled = Some(track.clone());
        }
        let id = track.id.clone();
        self.report_began(id);
    }

    fn report_began(&self, track_id: String) {
        let provider = Arc::clone(&self.provider);
        self.runtime.spawn(async move {
            if let Err(e) = provider.track_began_playback(&track_id).await {
                warn!(track_id = %track_id, error = %e, "Failed to report now playing");
            }
        });
    }

    fn report_ended(&self, track_id: String, position_secs: u32, submission: bool) {
        let provider = Arc::clone(&self.provider);
        self.runtime.spawn(async move {
            if let Err(e) = provider
                .track_ended_playback(&track_id, position_secs, submission)
                .await
            {
                warn!(track_id = %track_id, error = %e, "Failed to report playback end");
            }
        });
    }

    // ===== Backend dispatch =====

    /// Hand the item at `idx` to the backend for immediate playback
    fn play_index(&mut self, idx: usize, start_secs: f64) -> Result<()> {
        let item = &self.queue[idx];
        match &mut self.backend {
            Backend::Url(player) => {
                let url = resolve_stream_url(self.provider.as_ref(), item)?;
                player.play_file(&url, &item.metadata(), start_secs)?;
            }
            Backend::Track(player) => {
                let track = item
                    .as_track()
                    .ok_or_else(|| PlaybackError::NonTrackItem(item.id().to_owned()))?;
                player.play_track(track, start_secs)?;
            }
        }
        // Playing clears the backend's armed slot
        self.armed_next = None;
        Ok(())
    }

    /// Arm `target` in the backend's gapless slot, or clear the slot
    fn arm_next(&mut self, target: Option<usize>) -> Result<()> {
        match (&mut self.backend, target) {
            (Backend::Url(player), Some(idx)) => {
                let item = &self.queue[idx];
                let url = resolve_stream_url(self.provider.as_ref(), item)?;
                player.set_next_file(Some((&url, &item.metadata())))?;
            }
            (Backend::Url(player), None) => player.set_next_file(None)?,
            (Backend::Track(player), Some(idx)) => {
                let item = &self.queue[idx];
                let track = item
                    .as_track()
                    .ok_or_else(|| PlaybackError::NonTrackItem(item.id().to_owned()))?;
                player.set_next_track(Some(track))?;
            }
            (Backend::Track(player), None) => player.set_next_track(None)?,
        }
        Ok(())
    }

    /// Index that should play after the current one under the loop mode
    fn next_index(&self) -> Option<usize> {
        let idx = self.now_playing?;
        let last = self.queue.len().checked_sub(1)?;
        match self.loop_mode {
            LoopMode::None if idx >= last => None,
            LoopMode::None => Some(idx + 1),
            LoopMode::One => Some(idx),
            LoopMode::All if idx >= last => Some(0),
            LoopMode::All => Some(idx + 1),
        }
    }

    /// Rewrite the gapless slot after the queue changed under it
    ///
    /// The slot may hold an item that moved or was removed, so it is written
    /// even when the armed index looks right, and cleared when nothing
    /// follows.
    fn rearm_next_track(&mut self) {
        if self.next_index().is_some() {
            self.update_next_track(true);
            return;
        }
        if let Err(e) = self.arm_next(None) {
            warn!(error = %e, "Failed to clear next track");
        }
        self.armed_next = None;
        self.observers.next_track_armed(None);
    }

    /// Re-arm the gapless slot for the current loop mode
    ///
    /// Without `force`, nothing is sent when the armed index is already
    /// right (a loop-mode switch that does not change the next item).
    fn update_next_track(&mut self, force: bool) {
        let target = self.next_index();
        if target == self.armed_next && (!force || target.is_none()) {
            return;
        }

        match self.arm_next(target) {
            Ok(()) => {
                trace!(?target, "Armed next track");
                self.armed_next = target;
            }
            Err(e) => {
                warn!(?target, error = %e, "Failed to arm next track");
                self.armed_next = None;
            }
        }

        let next = self
            .armed_next
            .and_then(|idx| self.queue.get(idx))
            .cloned();
        self.observers.next_track_armed(next.as_ref());
    }
}

impl std::fmt::Debug for PlaybackEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackEngine")
            .field("backend", &self.backend)
            .field("queue_len", &self.queue.len())
            .field("now_playing", &self.now_playing)
            .field("armed_next", &self.armed_next)
            .field("loop_mode", &self.loop_mode)
            .finish_non_exhaustive()
    }
}

impl Drop for PlaybackEngine {
    fn drop(&mut self) {
        self.poller.stop();
        self.backend.set_event_sink(None);
    }
}

/// Shuffle `items`, keeping the item at `front` first
///
/// Returns the new order and, for every old index, its new index.
fn shuffle_with_front(items: Vec<MediaItem>, front: Option<usize>) -> (Vec<MediaItem>, Vec<usize>) {
    let mut entries: Vec<(usize, MediaItem)> = items.into_iter().enumerate().collect();
    let pinned = front
        .filter(|&idx| idx < entries.len())
        .map(|idx| entries.remove(idx));
    entries.shuffle(&mut rand::thread_rng());
    if let Some(pinned) = pinned {
        entries.insert(0, pinned);
    }
    split_moves(entries)
}

/// Put `items` back in the ID order `order`
///
/// Duplicates are matched first to first. Items `order` does not mention
/// keep their relative order at the end.
fn restore_order(order: &[String], items: Vec<MediaItem>) -> (Vec<MediaItem>, Vec<usize>) {
    let mut slots: Vec<Option<(usize, MediaItem)>> = items.into_iter().enumerate().map(Some).collect();
    let mut restored = Vec::with_capacity(slots.len());
    for id in order {
        let slot = slots
            .iter_mut()
            .find(|slot| matches!(slot, Some((_, item)) if item.id() == id.as_str()));
        if let Some(entry) = slot.and_then(Option::take) {
            restored.push(entry);
        }
    }
    restored.extend(slots.into_iter().flatten());
    split_moves(restored)
}

fn split_moves(entries: Vec<(usize, MediaItem)>) -> (Vec<MediaItem>, Vec<usize>) {
    let mut moved = vec![0; entries.len()];
    let items: Vec<MediaItem> = entries
        .into_iter()
        .enumerate()
        .map(|(new, (old, item))| {
            moved[old] = new;
            item
        })
        .collect();
    (items, moved)
}

/// Keep the IDs of `order` that are still queued, counting duplicates, and
/// append the IDs of queued items `order` does not cover
fn reconcile_order(order: &[String], queue: &[MediaItem]) -> Vec<String> {
    let mut available: HashMap<&str, usize> = HashMap::new();
    for item in queue {
        *available.entry(item.id()).or_default() += 1;
    }

    let mut take = |id: &str| match available.get_mut(id) {
        Some(count) if *count > 0 => {
            *count -= 1;
            true
        }
        _ => false,
    };
    let mut reconciled: Vec<String> = order.iter().filter(|id| take(id)).cloned().collect();
    reconciled.extend(queue.iter().map(MediaItem::id).filter(|id| take(id)).map(str::to_owned));
    reconciled
}

fn resolve_stream_url(provider: &dyn LibraryProvider, item: &MediaItem) -> Result<String> {
    let url = match item {
        MediaItem::Track(track) => provider.stream_url(&track.id)?,
        MediaItem::Radio(station) => station.stream_url.clone(),
    };
    if url.is_empty() {
        return Err(PlaybackError::NoStreamUrl(item.id().to_owned()));
    }
    Ok(url)
}
