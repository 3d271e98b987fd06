//! Core playback types shared between the queue state machine, the event
//! bus, and the HTTP layer.

use serde::{Deserialize, Serialize};

/// Repeat mode for the play queue
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    /// Stop when the last track ends
    #[default]
    Off,
    /// Wrap to the first track when the last one ends
    All,
    /// Replay the current track indefinitely
    One,
}

impl RepeatMode {
    /// Next mode in the fixed cycle off -> all -> one -> off
    pub fn next(self) -> RepeatMode {
        match self {
            RepeatMode::Off => RepeatMode::All,
            RepeatMode::All => RepeatMode::One,
            RepeatMode::One => RepeatMode::Off,
        }
    }
}

impl std::fmt::Display for RepeatMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RepeatMode::Off => write!(f, "off"),
            RepeatMode::All => write!(f, "all"),
            RepeatMode::One => write!(f, "one"),
        }
    }
}

/// Command issued to the audio-output collaborator (the browser's audio
/// element, driven over SSE).
///
/// The queue state machine never touches the audio element directly; it
/// returns these commands and the engine forwards them to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum AudioCommand {
    /// Load the payload for `track_id` as the current source
    Load { track_id: String },
    /// Start or resume playback of the loaded source
    Play,
    /// Pause the loaded source
    Pause,
    /// Seek to an absolute position in seconds
    Seek { position_secs: f64 },
    /// Drop the loaded source entirely
    Unload,
}

/// Outcome of the forward-navigation decision
///
/// Used both by the explicit "next" control and by natural track-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Current index moved (incremented, or wrapped to 0 under repeat-all)
    Advanced,
    /// No more tracks; caller must not change transport state
    EndOfQueue,
}
