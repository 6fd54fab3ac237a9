//! Core types for the playback engine

use serde::{Deserialize, Serialize};
use tonearm_player::PlayerState;

/// Loop mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopMode {
    /// Advance linearly and stop after the last item
    #[default]
    None,

    /// Wrap to the first item after the last one
    All,

    /// Repeat the current item
    One,
}

impl LoopMode {
    /// The mode a "cycle loop mode" button switches to
    pub fn next(self) -> Self {
        match self {
            LoopMode::None => LoopMode::All,
            LoopMode::All => LoopMode::One,
            LoopMode::One => LoopMode::None,
        }
    }
}

/// Where newly loaded items land in the play queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InsertMode {
    /// Stop playback and replace the whole queue
    Replace,

    /// Insert right after the now-playing item
    InsertNext,

    /// Append to the end of the queue
    Append,
}

/// Playback state as seen by the UI
///
/// `duration` is the engine's own notion of the current item's length, not
/// the backend's (which may report a buffered length for radio streams).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlaybackStatus {
    /// Playback state
    pub state: PlayerState,

    /// Position in seconds
    pub time_pos: f64,

    /// Duration of the current item in seconds
    pub duration: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loop_mode_cycles_through_all_modes() {
        let mut mode = LoopMode::None;
        let mut seen = Vec::new();
        for _ in 0..3 {
            mode = mode.next();
            seen.push(mode);
        }
        assert_eq!(seen, vec![LoopMode::All, LoopMode::One, LoopMode::None]);
    }
}
