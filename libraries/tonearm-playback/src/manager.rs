//! Playback manager - thread-safe front for the engine
//!
//! UI handlers push commands into a coalescing [`CommandQueue`]; a worker
//! thread applies them to the engine one at a time, interleaved with backend
//! events and position ticks. Queries lock the engine briefly and return
//! copies.

use crate::command_queue::{Command, CommandQueue};
use crate::engine::PlaybackEngine;
use crate::error::{PlaybackError, Result};
use crate::observers::{
    AudioInfoFn, LoopModeFn, NextTrackArmedFn, NotifyFn, PlayTimeFn, QueueChangeFn,
    SongChangeFn, SubscriptionId, VolumeFn,
};
use crate::settings::ReplayGainSettings;
use crate::types::{InsertMode, LoopMode, PlaybackStatus};
use crossbeam_channel::{bounded, select, Receiver, Sender};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tonearm_core::{MediaItem, RadioStation, Track};
use tonearm_player::{Backend, PlayerState, ReplayGainMode, TaggedEvent};
use tracing::{debug, warn};

/// Owns a [`PlaybackEngine`] and serializes every mutation through a worker
/// thread
///
/// Callbacks registered here run on the worker thread while the engine is
/// locked. They must not call back into the manager.
pub struct PlaybackManager {
    engine: Arc<Mutex<PlaybackEngine>>,
    commands: Arc<CommandQueue>,
    shutdown_tx: Option<Sender<()>>,
    forwarder: Option<JoinHandle<()>>,
    worker: Option<JoinHandle<()>>,
}

impl PlaybackManager {
    /// Take ownership of `engine` and start the worker threads
    pub fn new(engine: PlaybackEngine) -> Result<Self> {
        let events_rx = engine.event_receiver();
        let ticks_rx = engine.tick_receiver();
        let engine = Arc::new(Mutex::new(engine));
        let commands = Arc::new(CommandQueue::new());

        // Rendezvous channel: a command stays in the coalescing queue until
        // the worker is ready for it
        let (command_tx, command_rx) = bounded::<Command>(0);
        let (shutdown_tx, shutdown_rx) = bounded::<()>(0);

        let forwarder = {
            let commands = Arc::clone(&commands);
            thread::Builder::new()
                .name("playback-commands".to_string())
                .spawn(move || Self::forward_commands(&commands, &command_tx))?
        };

        let worker = {
            let engine = Arc::clone(&engine);
            let spawned = thread::Builder::new()
                .name("playback-worker".to_string())
                .spawn(move || {
                    Self::worker_loop(&engine, &command_rx, &events_rx, &ticks_rx, &shutdown_rx);
                });
            match spawned {
                Ok(handle) => handle,
                Err(e) => {
                    commands.close();
                    if forwarder.join().is_err() {
                        warn!("Command forwarder panicked");
                    }
                    return Err(PlaybackError::Io(e));
                }
            }
        };

        debug!("Playback manager started");
        Ok(Self {
            engine,
            commands,
            shutdown_tx: Some(shutdown_tx),
            forwarder: Some(forwarder),
            worker: Some(worker),
        })
    }

    fn forward_commands(commands: &CommandQueue, command_tx: &Sender<Command>) {
        while let Some(command) = commands.next() {
            if command_tx.send(command).is_err() {
                break;
            }
        }
        debug!("Command forwarder exiting");
    }

    fn worker_loop(
        engine: &Mutex<PlaybackEngine>,
        command_rx: &Receiver<Command>,
        events_rx: &Receiver<TaggedEvent>,
        ticks_rx: &Receiver<()>,
        shutdown_rx: &Receiver<()>,
    ) {
        loop {
            select! {
                recv(command_rx) -> command => match command {
                    Ok(command) => Self::apply(&mut engine.lock(), command),
                    Err(_) => break,
                },
                recv(events_rx) -> event => match event {
                    Ok(event) => engine.lock().handle_player_event(event),
                    Err(_) => break,
                },
                recv(ticks_rx) -> tick => match tick {
                    Ok(()) => engine.lock().handle_poll_tick(),
                    Err(_) => break,
                },
                recv(shutdown_rx) -> _ => break,
            }
        }
        debug!("Playback worker exiting");
    }

    fn apply(engine: &mut PlaybackEngine, command: Command) {
        let action = command.kind();
        let result = match command {
            Command::Stop => engine.stop(),
            Command::Continue => engine.continue_playback(),
            Command::Pause => engine.pause(),
            Command::PlayTrackAt(idx) => engine.play_track_at(idx),
            Command::SeekSeconds(secs) => engine.seek_seconds(secs),
            Command::SeekFwdBackN(n) => engine.seek_fwd_back_n(n),
            Command::SetVolume(volume) => engine.set_volume(volume),
            Command::SetLoopMode(mode) => {
                engine.set_loop_mode(mode);
                Ok(())
            }
            Command::SetShuffle(shuffle) => {
                engine.set_shuffle(shuffle);
                Ok(())
            }
            Command::StopAndClearPlayQueue => {
                engine.stop_and_clear_play_queue();
                Ok(())
            }
            Command::UpdatePlayQueue(items) => engine.update_play_queue(&items),
            Command::RemoveTracksFromQueue(idxs) => engine.remove_tracks_from_queue(&idxs),
            Command::LoadItems {
                items,
                mode,
                shuffle,
            } => engine.load_items(&items, mode, shuffle),
            Command::LoadRadioStation { station, mode } => {
                engine.load_radio_station(&station, mode)
            }
        };

        if let Err(err) = result {
            warn!("Playback error ({action:?}): {err}");
        }
    }

    // ===== Queue =====

    pub fn play_track_at(&self, idx: usize) {
        self.commands.push(Command::PlayTrackAt(idx));
    }

    pub fn play_from_beginning(&self) {
        self.play_track_at(0);
    }

    pub fn load_items(&self, items: &[MediaItem], mode: InsertMode, shuffle: bool) {
        self.commands.push(Command::LoadItems {
            items: items.to_vec(),
            mode,
            shuffle,
        });
    }

    pub fn load_tracks(&self, tracks: &[Track], mode: InsertMode, shuffle: bool) {
        let items = tracks.iter().cloned().map(MediaItem::from).collect();
        self.commands.push(Command::LoadItems {
            items,
            mode,
            shuffle,
        });
    }

    pub fn load_radio_station(&self, station: &RadioStation, mode: InsertMode) {
        self.commands.push(Command::LoadRadioStation {
            station: station.clone(),
            mode,
        });
    }

    /// Replace the queue with `station` and play it
    pub fn play_radio_station(&self, station: &RadioStation) {
        self.load_radio_station(station, InsertMode::Replace);
        self.play_track_at(0);
    }

    pub fn update_play_queue(&self, items: &[MediaItem]) {
        self.commands.push(Command::UpdatePlayQueue(items.to_vec()));
    }

    pub fn remove_tracks_from_queue(&self, idxs: &[usize]) {
        self.commands
            .push(Command::RemoveTracksFromQueue(idxs.to_vec()));
    }

    pub fn stop_and_clear_play_queue(&self) {
        self.commands.push(Command::StopAndClearPlayQueue);
    }

    pub fn play_queue(&self) -> Vec<MediaItem> {
        self.engine.lock().play_queue()
    }

    pub fn now_playing(&self) -> Option<MediaItem> {
        self.engine.lock().now_playing()
    }

    pub fn now_playing_index(&self) -> Option<usize> {
        self.engine.lock().now_playing_index()
    }

    // ===== Loop mode, shuffle and volume =====

    pub fn set_loop_mode(&self, mode: LoopMode) {
        self.commands.push(Command::SetLoopMode(mode));
    }

    /// Cycle None -> All -> One -> None
    pub fn set_next_loop_mode(&self) {
        let next = self.engine.lock().loop_mode().next();
        self.set_loop_mode(next);
    }

    pub fn loop_mode(&self) -> LoopMode {
        self.engine.lock().loop_mode()
    }

    pub fn set_shuffle(&self, shuffle: bool) {
        self.commands.push(Command::SetShuffle(shuffle));
    }

    pub fn is_shuffle(&self) -> bool {
        self.engine.lock().is_shuffle()
    }

    pub fn set_volume(&self, volume: u8) {
        self.commands.push(Command::SetVolume(volume.min(100)));
    }

    pub fn volume(&self) -> u8 {
        self.engine.lock().volume()
    }

    // ===== Transport =====

    pub fn seek_next(&self) {
        self.commands.push(Command::SeekFwdBackN(1));
    }

    pub fn seek_back_or_previous(&self) {
        self.commands.push(Command::SeekFwdBackN(-1));
    }

    /// Seek to an absolute position in the current item
    pub fn seek_seconds(&self, secs: f64) {
        self.commands.push(Command::SeekSeconds(secs.max(0.0)));
    }

    /// Seek relative to the current position, clamped to the item bounds
    pub fn seek_by_seconds(&self, delta: f64) {
        let status = self.playback_status();
        let duration = status.duration.max(0.0);
        let target = (status.time_pos + delta).clamp(0.0, duration);
        self.seek_seconds(target);
    }

    /// Seek to a fraction (0 to 1) of the current item
    pub fn seek_fraction(&self, fraction: f64) {
        let duration = self.playback_status().duration.max(0.0);
        self.seek_seconds(fraction.clamp(0.0, 1.0) * duration);
    }

    pub fn stop(&self) {
        self.commands.push(Command::Stop);
    }

    pub fn pause(&self) {
        self.commands.push(Command::Pause);
    }

    pub fn continue_playback(&self) {
        self.commands.push(Command::Continue);
    }

    pub fn play_pause(&self) {
        if self.playback_status().state == PlayerState::Playing {
            self.pause();
        } else {
            self.continue_playback();
        }
    }

    pub fn set_pause_after_current(&self, pause: bool) {
        self.engine.lock().set_pause_after_current(pause);
    }

    pub fn is_pause_after_current(&self) -> bool {
        self.engine.lock().is_pause_after_current()
    }

    pub fn playback_status(&self) -> PlaybackStatus {
        self.engine.lock().playback_status()
    }

    pub fn is_seeking(&self) -> bool {
        self.engine.lock().is_seeking()
    }

    // ===== Track metadata =====

    pub fn on_track_favorite_changed(&self, id: &str, favorite: bool) {
        self.engine.lock().on_track_favorite_changed(id, favorite);
    }

    pub fn on_track_rating_changed(&self, id: &str, rating: u8) {
        self.engine.lock().on_track_rating_changed(id, rating);
    }

    // ===== Backend =====

    pub fn set_replay_gain_options(&self, settings: ReplayGainSettings) {
        self.engine.lock().set_replay_gain_options(settings);
    }

    pub fn set_replay_gain_mode(&self, mode: ReplayGainMode) {
        self.engine.lock().set_replay_gain_mode(mode);
    }

    /// Switch backends
    ///
    /// Pending commands were aimed at the old backend and are dropped.
    pub fn set_player(&self, backend: Backend) -> Result<()> {
        self.commands.clear();
        self.engine.lock().set_player(backend)
    }

    /// Silence all notifications before quitting
    pub fn disable_callbacks(&self) {
        self.engine.lock().disable_callbacks();
    }

    // ===== Subscriptions =====

    pub fn on_song_change(&self, cb: SongChangeFn) -> SubscriptionId {
        self.engine.lock().on_song_change(cb)
    }

    pub fn on_next_track_armed(&self, cb: NextTrackArmedFn) -> SubscriptionId {
        self.engine.lock().on_next_track_armed(cb)
    }

    pub fn on_play_time(&self, cb: PlayTimeFn) -> SubscriptionId {
        self.engine.lock().on_play_time(cb)
    }

    pub fn on_loop_mode_change(&self, cb: LoopModeFn) -> SubscriptionId {
        self.engine.lock().on_loop_mode_change(cb)
    }

    pub fn on_volume_change(&self, cb: VolumeFn) -> SubscriptionId {
        self.engine.lock().on_volume_change(cb)
    }

    pub fn on_queue_change(&self, cb: QueueChangeFn) -> SubscriptionId {
        self.engine.lock().on_queue_change(cb)
    }

    pub fn on_audio_info_change(&self, cb: AudioInfoFn) -> SubscriptionId {
        self.engine.lock().on_audio_info_change(cb)
    }

    pub fn on_seek(&self, cb: NotifyFn) -> SubscriptionId {
        self.engine.lock().on_seek(cb)
    }

    pub fn on_paused(&self, cb: NotifyFn) -> SubscriptionId {
        self.engine.lock().on_paused(cb)
    }

    pub fn on_stopped(&self, cb: NotifyFn) -> SubscriptionId {
        self.engine.lock().on_stopped(cb)
    }

    pub fn on_playing(&self, cb: NotifyFn) -> SubscriptionId {
        self.engine.lock().on_playing(cb)
    }

    pub fn unsubscribe(&self, sub: SubscriptionId) -> bool {
        self.engine.lock().unsubscribe(sub)
    }

    // ===== Lifecycle =====

    /// Stop the worker threads. Pending commands are dropped.
    pub fn shutdown(&mut self) {
        self.commands.close();
        // Dropping the sender wakes the worker's select
        self.shutdown_tx.take();

        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("Playback worker panicked");
            }
        }
        if let Some(forwarder) = self.forwarder.take() {
            if forwarder.join().is_err() {
                warn!("Command forwarder panicked");
            }
        }
    }
}

impl Drop for PlaybackManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for PlaybackManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackManager")
            .field("pending_commands", &self.commands.len())
            .field("running", &self.worker.is_some())
            .finish_non_exhaustive()
    }
}
