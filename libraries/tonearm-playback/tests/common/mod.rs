//! Shared test harness: scripted backends and a recording library provider

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::{Arc, Once};
use std::time::Duration;
use tokio::runtime::Handle;
use tonearm_core::{LibraryProvider, MediaItem, MediaItemMetadata, ProviderError, RadioStation, Track};
use tonearm_player::{
    Backend, BasePlayer, EventSink, PlayerError, PlayerEvent, PlayerState, PlayerStatus,
    ReplayGainOptions, ReplayGainPlayer, TrackPlayer, UrlPlayer,
};
use tonearm_playback::{EngineSettings, PlaybackEngine};

static INIT: Once = Once::new();

pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    });
}

/// Let spawned tasks (provider reports, poller) run
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

// ===== Media builders =====

pub fn track(id: &str, secs: u64) -> Track {
    Track::new(id, format!("Track {id}"), Duration::from_secs(secs)).with_artist("Test Artist")
}

/// 200 second tracks with the given IDs
pub fn tracks(ids: &[&str]) -> Vec<MediaItem> {
    ids.iter().map(|id| MediaItem::from(track(id, 200))).collect()
}

pub fn station(id: &str) -> RadioStation {
    RadioStation::new(id, format!("Station {id}"), format!("https://radio.test/{id}"))
}

pub fn ids(items: &[MediaItem]) -> Vec<String> {
    items.iter().map(|item| item.id().to_owned()).collect()
}

pub fn stream_url(id: &str) -> String {
    format!("https://music.test/stream/{id}")
}

// ===== Scripted backend =====

/// Observable state shared between a mock backend and the test
#[derive(Debug, Default)]
pub struct MockState {
    pub status: PlayerStatus,
    pub volume: u8,
    /// Every explicit play: URL (or track ID) and start position
    pub plays: Vec<(String, f64)>,
    /// What is loaded right now
    pub current: Option<String>,
    /// What is armed in the gapless slot
    pub armed: Option<String>,
    pub arm_calls: usize,
    pub stops: usize,
    pub seeks: Vec<f64>,
    pub replay_gain: Option<ReplayGainOptions>,
    pub sink: Option<EventSink>,
    pub fail_play: bool,
}

/// Test-side handle on a mock backend
#[derive(Debug, Clone, Default)]
pub struct MockHandle(pub Arc<Mutex<MockState>>);

impl MockHandle {
    pub fn new(volume: u8) -> Self {
        let handle = Self::default();
        handle.0.lock().volume = volume;
        handle
    }

    fn emit(&self, event: PlayerEvent) {
        let sink = self.0.lock().sink.clone();
        if let Some(sink) = sink {
            sink.emit(event);
        }
    }

    /// The current item reaches its end
    ///
    /// Advances gaplessly into the armed item, or stops when nothing is armed.
    pub fn finish_track(&self) {
        let next = {
            let mut state = self.0.lock();
            let next = state.armed.take();
            match &next {
                Some(next) => {
                    state.current = Some(next.clone());
                    state.status.time_pos = 0.0;
                }
                None => {
                    state.current = None;
                    state.status = PlayerStatus::stopped();
                }
            }
            next
        };
        if next.is_some() {
            self.emit(PlayerEvent::TrackChanged);
        } else {
            self.emit(PlayerEvent::Stopped);
        }
    }

    pub fn set_position(&self, secs: f64) {
        self.0.lock().status.time_pos = secs;
    }

    /// Volume changed on the device itself
    pub fn external_volume(&self, volume: u8) {
        self.0.lock().volume = volume;
        self.emit(PlayerEvent::VolumeChanged(volume));
    }

    pub fn emit_raw(&self, event: PlayerEvent) {
        self.emit(event);
    }

    pub fn state(&self) -> PlayerState {
        self.0.lock().status.state
    }

    pub fn plays(&self) -> Vec<(String, f64)> {
        self.0.lock().plays.clone()
    }

    pub fn last_play(&self) -> Option<(String, f64)> {
        self.0.lock().plays.last().cloned()
    }

    pub fn current(&self) -> Option<String> {
        self.0.lock().current.clone()
    }

    pub fn armed(&self) -> Option<String> {
        self.0.lock().armed.clone()
    }

    pub fn has_sink(&self) -> bool {
        self.0.lock().sink.is_some()
    }

    fn start(&self, what: String, start_secs: f64) -> tonearm_player::Result<()> {
        {
            let mut state = self.0.lock();
            if state.fail_play {
                return Err(PlayerError::backend("device unavailable"));
            }
            state.plays.push((what.clone(), start_secs));
            state.current = Some(what);
            state.armed = None;
            state.status = PlayerStatus {
                state: PlayerState::Playing,
                time_pos: start_secs,
                duration: 0.0,
            };
        }
        self.emit(PlayerEvent::TrackChanged);
        self.emit(PlayerEvent::Playing);
        Ok(())
    }
}

macro_rules! impl_base_player {
    ($player:ty, replay_gain = $gain:expr) => {
        impl BasePlayer for $player {
            fn continue_playback(&mut self) -> tonearm_player::Result<()> {
                self.handle.0.lock().status.state = PlayerState::Playing;
                self.handle.emit(PlayerEvent::Playing);
                Ok(())
            }

            fn pause(&mut self) -> tonearm_player::Result<()> {
                self.handle.0.lock().status.state = PlayerState::Paused;
                self.handle.emit(PlayerEvent::Paused);
                Ok(())
            }

            fn stop(&mut self) -> tonearm_player::Result<()> {
                let was_stopped = {
                    let mut state = self.handle.0.lock();
                    let was_stopped = state.status.state == PlayerState::Stopped;
                    state.stops += 1;
                    state.current = None;
                    state.armed = None;
                    state.status = PlayerStatus::stopped();
                    was_stopped
                };
                if !was_stopped {
                    self.handle.emit(PlayerEvent::Stopped);
                }
                Ok(())
            }

            fn seek_seconds(&mut self, secs: f64) -> tonearm_player::Result<()> {
                {
                    let mut state = self.handle.0.lock();
                    state.seeks.push(secs);
                    state.status.time_pos = secs;
                }
                self.handle.emit(PlayerEvent::Seeked);
                Ok(())
            }

            fn is_seeking(&self) -> bool {
                false
            }

            fn set_volume(&mut self, volume: u8) -> tonearm_player::Result<()> {
                self.handle.0.lock().volume = volume;
                Ok(())
            }

            fn volume(&self) -> u8 {
                self.handle.0.lock().volume
            }

            fn status(&self) -> PlayerStatus {
                self.handle.0.lock().status
            }

            fn set_event_sink(&mut self, sink: Option<EventSink>) {
                self.handle.0.lock().sink = sink;
            }

            fn replay_gain(&mut self) -> Option<&mut dyn ReplayGainPlayer> {
                if $gain {
                    Some(self as &mut dyn ReplayGainPlayer)
                } else {
                    None
                }
            }
        }

        impl ReplayGainPlayer for $player {
            fn set_replay_gain_options(
                &mut self,
                options: ReplayGainOptions,
            ) -> tonearm_player::Result<()> {
                self.handle.0.lock().replay_gain = Some(options);
                Ok(())
            }
        }
    };
}

/// Backend fed with stream URLs; supports replay gain
pub struct MockUrlPlayer {
    pub handle: MockHandle,
}

impl_base_player!(MockUrlPlayer, replay_gain = true);

impl UrlPlayer for MockUrlPlayer {
    fn play_file(
        &mut self,
        url: &str,
        _meta: &MediaItemMetadata,
        start_secs: f64,
    ) -> tonearm_player::Result<()> {
        self.handle.start(url.to_owned(), start_secs)
    }

    fn set_next_file(&mut self, next: Option<(&str, &MediaItemMetadata)>) -> tonearm_player::Result<()> {
        let mut state = self.handle.0.lock();
        state.arm_calls += 1;
        state.armed = next.map(|(url, _)| url.to_owned());
        Ok(())
    }
}

/// Backend fed with tracks; no replay gain support
pub struct MockTrackPlayer {
    pub handle: MockHandle,
}

impl_base_player!(MockTrackPlayer, replay_gain = false);

impl TrackPlayer for MockTrackPlayer {
    fn play_track(&mut self, track: &Track, start_secs: f64) -> tonearm_player::Result<()> {
        self.handle.start(track.id.clone(), start_secs)
    }

    fn set_next_track(&mut self, next: Option<&Track>) -> tonearm_player::Result<()> {
        let mut state = self.handle.0.lock();
        state.arm_calls += 1;
        state.armed = next.map(|track| track.id.clone());
        Ok(())
    }
}

pub fn url_backend(volume: u8) -> (Backend, MockHandle) {
    let handle = MockHandle::new(volume);
    let player = MockUrlPlayer {
        handle: handle.clone(),
    };
    (Backend::url(player), handle)
}

pub fn track_backend(volume: u8) -> (Backend, MockHandle) {
    let handle = MockHandle::new(volume);
    let player = MockTrackPlayer {
        handle: handle.clone(),
    };
    (Backend::track(player), handle)
}

// ===== Recording provider =====

#[derive(Debug, Clone, PartialEq)]
pub struct EndedReport {
    pub track_id: String,
    pub position_secs: u32,
    pub submission: bool,
}

#[derive(Debug, Default)]
pub struct FakeProvider {
    pub client_decides: bool,
    pub fail_reports: bool,
    pub no_url: Mutex<HashSet<String>>,
    pub began: Mutex<Vec<String>>,
    pub ended: Mutex<Vec<EndedReport>>,
}

impl FakeProvider {
    pub fn new(client_decides: bool) -> Arc<Self> {
        Arc::new(Self {
            client_decides,
            ..Self::default()
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            client_decides: true,
            fail_reports: true,
            ..Self::default()
        })
    }

    pub fn began(&self) -> Vec<String> {
        self.began.lock().clone()
    }

    pub fn ended(&self) -> Vec<EndedReport> {
        self.ended.lock().clone()
    }
}

#[async_trait]
impl LibraryProvider for FakeProvider {
    fn stream_url(&self, track_id: &str) -> tonearm_core::Result<String> {
        if self.no_url.lock().contains(track_id) {
            return Ok(String::new());
        }
        Ok(stream_url(track_id))
    }

    async fn track_began_playback(&self, track_id: &str) -> tonearm_core::Result<()> {
        self.began.lock().push(track_id.to_owned());
        if self.fail_reports {
            return Err(ProviderError::unreachable("offline"));
        }
        Ok(())
    }

    async fn track_ended_playback(
        &self,
        track_id: &str,
        position_secs: u32,
        submission: bool,
    ) -> tonearm_core::Result<()> {
        self.ended.lock().push(EndedReport {
            track_id: track_id.to_owned(),
            position_secs,
            submission,
        });
        if self.fail_reports {
            return Err(ProviderError::unreachable("offline"));
        }
        Ok(())
    }

    fn client_decides_scrobble(&self) -> bool {
        self.client_decides
    }
}

// ===== Engine fixtures =====

pub struct Fixture {
    pub engine: PlaybackEngine,
    pub player: MockHandle,
    pub provider: Arc<FakeProvider>,
}

impl Fixture {
    /// Engine on a URL backend, default settings, client-side scrobbling
    pub fn new() -> Self {
        Self::with(EngineSettings::default(), FakeProvider::new(true))
    }

    pub fn with(settings: EngineSettings, provider: Arc<FakeProvider>) -> Self {
        init_tracing();
        let (backend, player) = url_backend(50);
        let engine = PlaybackEngine::new(provider.clone(), backend, &settings, Handle::current());
        Self {
            engine,
            player,
            provider,
        }
    }

    /// Engine loaded with 200 second tracks
    pub fn loaded(ids: &[&str]) -> Self {
        let mut fixture = Self::new();
        fixture.load(ids);
        fixture
    }

    pub fn load(&mut self, ids: &[&str]) {
        self.engine
            .load_items(&tracks(ids), tonearm_playback::InsertMode::Replace, false)
            .unwrap();
        self.engine.process_pending();
    }

    /// Play `idx` and apply the resulting backend events
    pub fn play(&mut self, idx: usize) {
        self.engine.play_track_at(idx).unwrap();
        self.engine.process_pending();
    }

    pub fn now_id(&self) -> Option<String> {
        self.engine
            .now_playing_index()
            .map(|idx| self.engine.play_queue()[idx].id().to_owned())
    }

    pub fn queue_ids(&self) -> Vec<String> {
        ids(&self.engine.play_queue())
    }
}
