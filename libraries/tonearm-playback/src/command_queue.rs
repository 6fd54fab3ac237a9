//! Coalescing command queue
//!
//! UI handlers can issue commands much faster than a backend can carry them
//! out (think of a user dragging a volume slider or hammering "next"). The
//! queue drops still-pending commands that a newer command makes redundant,
//! so the single consumer only ever applies the latest request of each kind.
//! Commands already handed to the consumer are never cancelled.

use crate::types::{InsertMode, LoopMode};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use tonearm_core::{MediaItem, RadioStation};

/// A playback command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Stop,
    Continue,
    Pause,
    PlayTrackAt(usize),
    /// Absolute seek within the current item
    SeekSeconds(f64),
    /// Relative navigation by `n` queue items
    SeekFwdBackN(i64),
    SetVolume(u8),
    SetLoopMode(LoopMode),
    SetShuffle(bool),
    StopAndClearPlayQueue,
    UpdatePlayQueue(Vec<MediaItem>),
    RemoveTracksFromQueue(Vec<usize>),
    LoadItems {
        items: Vec<MediaItem>,
        mode: InsertMode,
        shuffle: bool,
    },
    LoadRadioStation {
        station: RadioStation,
        mode: InsertMode,
    },
}

/// Argument-less discriminant of [`Command`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Stop,
    Continue,
    Pause,
    PlayTrackAt,
    SeekSeconds,
    SeekFwdBackN,
    SetVolume,
    SetLoopMode,
    SetShuffle,
    StopAndClearPlayQueue,
    UpdatePlayQueue,
    RemoveTracksFromQueue,
    LoadItems,
    LoadRadioStation,
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::Stop => CommandKind::Stop,
            Command::Continue => CommandKind::Continue,
            Command::Pause => CommandKind::Pause,
            Command::PlayTrackAt(_) => CommandKind::PlayTrackAt,
            Command::SeekSeconds(_) => CommandKind::SeekSeconds,
            Command::SeekFwdBackN(_) => CommandKind::SeekFwdBackN,
            Command::SetVolume(_) => CommandKind::SetVolume,
            Command::SetLoopMode(_) => CommandKind::SetLoopMode,
            Command::SetShuffle(_) => CommandKind::SetShuffle,
            Command::StopAndClearPlayQueue => CommandKind::StopAndClearPlayQueue,
            Command::UpdatePlayQueue(_) => CommandKind::UpdatePlayQueue,
            Command::RemoveTracksFromQueue(_) => CommandKind::RemoveTracksFromQueue,
            Command::LoadItems { .. } => CommandKind::LoadItems,
            Command::LoadRadioStation { .. } => CommandKind::LoadRadioStation,
        }
    }
}

impl CommandKind {
    /// Pending commands of these kinds are dropped when a command of this
    /// kind is pushed
    pub fn supersedes(self) -> &'static [CommandKind] {
        use CommandKind::*;
        match self {
            Stop | Continue | Pause => &[Continue, Pause, Stop],
            PlayTrackAt => &[Continue, Pause, Stop, PlayTrackAt],
            StopAndClearPlayQueue => &[Continue, Pause, Stop, StopAndClearPlayQueue],
            SetVolume => &[SetVolume],
            SetLoopMode => &[SetLoopMode],
            SetShuffle => &[SetShuffle],
            SeekSeconds => &[SeekSeconds],
            UpdatePlayQueue => &[UpdatePlayQueue],
            // Summed instead (see `CommandQueue::push`)
            SeekFwdBackN => &[],
            RemoveTracksFromQueue | LoadItems | LoadRadioStation => &[],
        }
    }

    /// Whether the command changes queue indices, which fences relative
    /// navigation from being summed across it
    pub fn modifies_queue(self) -> bool {
        matches!(
            self,
            CommandKind::PlayTrackAt
                | CommandKind::RemoveTracksFromQueue
                | CommandKind::LoadItems
                | CommandKind::LoadRadioStation
                | CommandKind::UpdatePlayQueue
                | CommandKind::SetShuffle
                | CommandKind::StopAndClearPlayQueue
        )
    }
}

#[derive(Debug, Default)]
struct QueueState {
    pending: VecDeque<Command>,
    closed: bool,
}

/// Multi-producer, single-consumer coalescing command queue
#[derive(Debug, Default)]
pub struct CommandQueue {
    state: Mutex<QueueState>,
    available: Condvar,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a command, first dropping pending commands it supersedes
    ///
    /// `SeekFwdBackN` commands are summed with the pending ones that follow
    /// the last queue-modifying command, and the sum moves to the back.
    pub fn push(&self, command: Command) {
        let mut state = self.state.lock();
        if state.closed {
            return;
        }

        match command {
            Command::SeekFwdBackN(n) => Self::push_relative_seek(&mut state.pending, n),
            command => {
                let superseded = command.kind().supersedes();
                if !superseded.is_empty() {
                    state
                        .pending
                        .retain(|pending| !superseded.contains(&pending.kind()));
                }
                state.pending.push_back(command);
            }
        }

        drop(state);
        self.available.notify_one();
    }

    fn push_relative_seek(pending: &mut VecDeque<Command>, n: i64) {
        // Earliest relative seek not fenced off by a queue modification
        let mut first = None;
        for (i, command) in pending.iter().enumerate().rev() {
            let kind = command.kind();
            if kind.modifies_queue() {
                break;
            }
            if kind == CommandKind::SeekFwdBackN {
                first = Some(i);
            }
        }

        let Some(first) = first else {
            pending.push_back(Command::SeekFwdBackN(n));
            return;
        };

        let mut total = n;
        let tail: Vec<Command> = pending.drain(first..).collect();
        for command in tail {
            match command {
                Command::SeekFwdBackN(m) => total += m,
                other => pending.push_back(other),
            }
        }
        pending.push_back(Command::SeekFwdBackN(total));
    }

    /// Block until a command is available and take it
    ///
    /// Returns `None` once the queue is closed.
    pub fn next(&self) -> Option<Command> {
        let mut state = self.state.lock();
        loop {
            if state.closed {
                return None;
            }
            if let Some(command) = state.pending.pop_front() {
                return Some(command);
            }
            self.available.wait(&mut state);
        }
    }

    /// Take a command without blocking
    pub fn try_next(&self) -> Option<Command> {
        let mut state = self.state.lock();
        if state.closed {
            return None;
        }
        state.pending.pop_front()
    }

    /// Drop every pending command
    pub fn clear(&self) {
        self.state.lock().pending.clear();
    }

    /// Close the queue and wake the consumer
    pub fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        state.pending.clear();
        drop(state);
        self.available.notify_all();
    }

    pub fn len(&self) -> usize {
        self.state.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn drain(queue: &CommandQueue) -> Vec<Command> {
        std::iter::from_fn(|| queue.try_next()).collect()
    }

    #[test]
    fn pause_supersedes_pending_transport_commands() {
        let queue = CommandQueue::new();
        queue.push(Command::Continue);
        queue.push(Command::SetVolume(30));
        queue.push(Command::Stop);
        queue.push(Command::Pause);

        assert_eq!(drain(&queue), vec![Command::SetVolume(30), Command::Pause]);
    }

    #[test]
    fn latest_volume_wins() {
        let queue = CommandQueue::new();
        for v in [10, 20, 30, 40] {
            queue.push(Command::SetVolume(v));
        }
        queue.push(Command::SeekSeconds(12.0));
        queue.push(Command::SeekSeconds(48.0));

        assert_eq!(
            drain(&queue),
            vec![Command::SetVolume(40), Command::SeekSeconds(48.0)]
        );
    }

    #[test]
    fn play_track_at_supersedes_transport_but_not_loads() {
        let queue = CommandQueue::new();
        queue.push(Command::RemoveTracksFromQueue(vec![1]));
        queue.push(Command::Pause);
        queue.push(Command::PlayTrackAt(2));
        queue.push(Command::PlayTrackAt(5));

        assert_eq!(
            drain(&queue),
            vec![
                Command::RemoveTracksFromQueue(vec![1]),
                Command::PlayTrackAt(5)
            ]
        );
    }

    #[test]
    fn removals_are_never_coalesced() {
        let queue = CommandQueue::new();
        queue.push(Command::RemoveTracksFromQueue(vec![0]));
        queue.push(Command::RemoveTracksFromQueue(vec![0]));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn relative_seeks_are_summed_and_moved_last() {
        let queue = CommandQueue::new();
        queue.push(Command::SeekFwdBackN(1));
        queue.push(Command::SetVolume(50));
        queue.push(Command::SeekFwdBackN(1));
        queue.push(Command::SeekFwdBackN(-1));
        queue.push(Command::SeekFwdBackN(1));

        assert_eq!(
            drain(&queue),
            vec![Command::SetVolume(50), Command::SeekFwdBackN(2)]
        );
    }

    #[test]
    fn relative_seeks_do_not_cross_queue_modifications() {
        let queue = CommandQueue::new();
        queue.push(Command::SeekFwdBackN(1));
        queue.push(Command::RemoveTracksFromQueue(vec![3]));
        queue.push(Command::SeekFwdBackN(1));
        queue.push(Command::SeekFwdBackN(1));

        assert_eq!(
            drain(&queue),
            vec![
                Command::SeekFwdBackN(1),
                Command::RemoveTracksFromQueue(vec![3]),
                Command::SeekFwdBackN(2),
            ]
        );
    }

    #[test]
    fn shuffle_toggle_keeps_latest_and_fences_seeks() {
        let queue = CommandQueue::new();
        queue.push(Command::SetShuffle(true));
        queue.push(Command::SeekFwdBackN(1));
        queue.push(Command::SetShuffle(false));
        queue.push(Command::SeekFwdBackN(1));

        assert_eq!(
            drain(&queue),
            vec![
                Command::SeekFwdBackN(1),
                Command::SetShuffle(false),
                Command::SeekFwdBackN(1),
            ]
        );
    }

    #[test]
    fn next_blocks_until_push() {
        let queue = Arc::new(CommandQueue::new());
        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.next())
        };

        thread::sleep(Duration::from_millis(50));
        queue.push(Command::PlayTrackAt(3));
        assert_eq!(consumer.join().unwrap(), Some(Command::PlayTrackAt(3)));
    }

    #[test]
    fn close_wakes_consumer() {
        let queue = Arc::new(CommandQueue::new());
        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.next())
        };

        thread::sleep(Duration::from_millis(50));
        queue.close();
        assert_eq!(consumer.join().unwrap(), None);

        queue.push(Command::Stop);
        assert!(queue.is_empty());
    }

    #[test]
    fn clear_drops_pending() {
        let queue = CommandQueue::new();
        queue.push(Command::PlayTrackAt(1));
        queue.push(Command::SetVolume(3));
        queue.clear();
        assert!(queue.try_next().is_none());
    }
}
