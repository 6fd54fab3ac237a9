//! Manager tests: commands travel through the worker thread
//!
//! These run on a real multi-threaded runtime and wait for the worker with
//! a deadline instead of driving the engine by hand.

mod common;

use common::*;
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tokio::runtime::Runtime;
use tonearm_player::PlayerState;
use tonearm_playback::{InsertMode, LoopMode, PlaybackManager};

struct Harness {
    // Declared first so it shuts down before the runtime goes away
    manager: PlaybackManager,
    player: MockHandle,
    provider: Arc<FakeProvider>,
    _rt: Runtime,
}

fn start(ids: &[&str]) -> Harness {
    let rt = Runtime::new().unwrap();
    let fx = {
        let _guard = rt.enter();
        Fixture::loaded(ids)
    };
    let manager = PlaybackManager::new(fx.engine).unwrap();
    Harness {
        manager,
        player: fx.player,
        provider: fx.provider,
        _rt: rt,
    }
}

fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

#[test]
fn play_track_at_reaches_backend() {
    let h = start(&["a", "b"]);
    h.manager.play_track_at(0);

    assert!(wait_for(|| h.manager.now_playing_index() == Some(0)));
    assert_eq!(h.player.current(), Some(stream_url("a")));
    assert!(wait_for(|| h.player.armed() == Some(stream_url("b"))));
    assert_eq!(h.manager.now_playing().map(|item| item.id().to_owned()).as_deref(), Some("a"));
}

#[test]
fn load_then_play_from_beginning() {
    let h = start(&[]);
    h.manager
        .load_tracks(&[track("x", 100), track("y", 100)], InsertMode::Replace, false);
    h.manager.play_from_beginning();

    assert!(wait_for(|| h.manager.now_playing_index() == Some(0)));
    assert_eq!(ids(&h.manager.play_queue()), ["x", "y"]);
}

#[test]
fn seek_next_and_previous() {
    let h = start(&["a", "b", "c"]);
    h.manager.play_track_at(0);
    assert!(wait_for(|| h.manager.now_playing_index() == Some(0)));

    h.manager.seek_next();
    assert!(wait_for(|| h.manager.now_playing_index() == Some(1)));

    h.manager.seek_back_or_previous();
    assert!(wait_for(|| h.manager.now_playing_index() == Some(0)));
}

#[test]
fn volume_burst_settles_on_last_value() {
    let h = start(&["a"]);
    let volumes: Arc<Mutex<Vec<u8>>> = Arc::default();
    {
        let volumes = Arc::clone(&volumes);
        h.manager
            .on_volume_change(Box::new(move |v| volumes.lock().push(v)));
    }

    for volume in (10..=90).step_by(10) {
        h.manager.set_volume(volume);
    }

    assert!(wait_for(|| h.manager.volume() == 90));
    assert_eq!(volumes.lock().last(), Some(&90));
}

#[test]
fn play_pause_toggles() {
    let h = start(&["a"]);
    h.manager.play_track_at(0);
    assert!(wait_for(|| h.manager.playback_status().state == PlayerState::Playing));

    h.manager.play_pause();
    assert!(wait_for(|| h.manager.playback_status().state == PlayerState::Paused));

    h.manager.play_pause();
    assert!(wait_for(|| h.manager.playback_status().state == PlayerState::Playing));
}

#[test]
fn relative_and_fractional_seeks_are_clamped() {
    let h = start(&["a"]);
    h.manager.play_track_at(0);
    // Duration is known once the track change went through the worker
    assert!(wait_for(|| h.manager.playback_status().duration == 200.0));

    h.manager.seek_by_seconds(500.0);
    assert!(wait_for(|| h.player.0.lock().seeks.last() == Some(&200.0)));

    h.manager.seek_fraction(0.25);
    assert!(wait_for(|| h.player.0.lock().seeks.last() == Some(&50.0)));

    h.manager.seek_by_seconds(-500.0);
    assert!(wait_for(|| h.player.0.lock().seeks.last() == Some(&0.0)));
}

#[test]
fn loop_mode_cycles_through_manager() {
    let h = start(&["a"]);
    h.manager.set_next_loop_mode();
    assert!(wait_for(|| h.manager.loop_mode() == LoopMode::All));
    h.manager.set_next_loop_mode();
    assert!(wait_for(|| h.manager.loop_mode() == LoopMode::One));
}

#[test]
fn shuffle_through_manager_keeps_current_item() {
    let h = start(&["a", "b", "c", "d"]);
    h.manager.play_track_at(2);
    assert!(wait_for(|| h.manager.now_playing_index() == Some(2)));

    h.manager.set_shuffle(true);
    assert!(wait_for(|| h.manager.is_shuffle()));
    assert_eq!(h.manager.now_playing_index(), Some(0));
    assert_eq!(h.manager.now_playing().map(|item| item.id().to_owned()).as_deref(), Some("c"));

    h.manager.set_shuffle(false);
    assert!(wait_for(|| !h.manager.is_shuffle()));
    assert_eq!(ids(&h.manager.play_queue()), ["a", "b", "c", "d"]);
    assert_eq!(h.manager.now_playing_index(), Some(2));
}

#[test]
fn song_change_callbacks_run_on_worker() {
    let h = start(&["a", "b"]);
    let seen: Arc<Mutex<Vec<String>>> = Arc::default();
    {
        let seen = Arc::clone(&seen);
        h.manager.on_song_change(Box::new(move |now, _| {
            if let Some(item) = now {
                seen.lock().push(item.id().to_owned());
            }
        }));
    }

    h.manager.play_track_at(0);
    assert!(wait_for(|| h.player.armed() == Some(stream_url("b"))));
    h.player.finish_track();

    assert!(wait_for(|| seen.lock().len() == 2));
    assert_eq!(*seen.lock(), ["a", "b"]);
}

#[test]
fn remove_and_clear_through_commands() {
    let h = start(&["a", "b", "c"]);
    h.manager.play_track_at(1);
    assert!(wait_for(|| h.manager.now_playing_index() == Some(1)));

    h.manager.remove_tracks_from_queue(&[0]);
    assert!(wait_for(|| h.manager.play_queue().len() == 2));
    assert_eq!(h.manager.now_playing_index(), Some(0));

    h.manager.stop_and_clear_play_queue();
    assert!(wait_for(|| h.manager.play_queue().is_empty()));
    assert!(wait_for(|| h.player.state() == PlayerState::Stopped));
}

#[test]
fn radio_station_plays_through_manager() {
    let h = start(&["a"]);
    h.manager.play_radio_station(&station("jazz"));

    assert!(wait_for(|| h.player.current() == Some("https://radio.test/jazz".to_owned())));
    assert_eq!(h.manager.play_queue().len(), 1);
}

#[test]
fn set_player_resumes_on_new_backend() {
    let h = start(&["a", "b"]);
    h.manager.play_track_at(0);
    assert!(wait_for(|| h.player.armed() == Some(stream_url("b"))));
    h.player.set_position(33.0);

    let (backend, new_player) = url_backend(50);
    h.manager.set_player(backend).unwrap();

    assert_eq!(new_player.last_play(), Some((stream_url("a"), 33.0)));
    assert!(!h.player.has_sink());
    assert!(wait_for(|| new_player.armed() == Some(stream_url("b"))));
}

#[test]
fn pause_after_current_flag_round_trips() {
    let h = start(&["a"]);
    h.manager.set_pause_after_current(true);
    assert!(h.manager.is_pause_after_current());
    h.manager.set_pause_after_current(false);
    assert!(!h.manager.is_pause_after_current());
}

#[test]
fn favorite_change_is_visible_in_queue() {
    let h = start(&["a", "b"]);
    h.manager.on_track_favorite_changed("b", true);
    let queue = h.manager.play_queue();
    assert!(queue[1].as_track().unwrap().favorite);
}

#[test]
fn shutdown_stops_processing_commands() {
    let mut h = start(&["a"]);
    h.manager.shutdown();

    h.manager.play_track_at(0);
    thread::sleep(Duration::from_millis(50));
    assert!(h.player.plays().is_empty());
    assert!(h.provider.began().is_empty());

    // Shutting down twice is harmless
    h.manager.shutdown();
}
