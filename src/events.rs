//! Event system
//!
//! One-to-many event broadcasting via tokio::broadcast. Every state change
//! in the player is announced here; the SSE endpoint relays events to
//! connected browsers, and audio commands ride the same bus so the view's
//! audio element stays in lockstep with the engine.

use crate::playback::{AudioCommand, RepeatMode};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Player event types
///
/// Events are broadcast via EventBus and serialized for SSE transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PlayerEvent {
    /// Queue contents or current index changed
    QueueChanged {
        /// Number of entries now in the queue
        queue_len: usize,
        /// Current index after the change
        current_index: usize,
    },

    /// The track at the current index changed
    CurrentTrackChanged {
        /// Identifier of the new current track (None when the queue emptied)
        track_id: Option<String>,
        /// Current index after the change
        current_index: usize,
    },

    /// Play/pause flag changed
    PlaybackStateChanged {
        /// True when playing, false when paused/stopped
        playing: bool,
    },

    /// Repeat mode cycled
    RepeatModeChanged {
        /// Mode after the change
        mode: RepeatMode,
    },

    /// Library contents changed (upload or reload)
    LibraryChanged {
        /// Number of tracks now in the library
        count: usize,
    },

    /// Command for the audio-output collaborator
    Audio {
        /// Transport command to execute
        command: AudioCommand,
    },
}

impl PlayerEvent {
    /// Event type string used as the SSE `event:` field
    pub fn type_str(&self) -> &'static str {
        match self {
            PlayerEvent::QueueChanged { .. } => "QueueChanged",
            PlayerEvent::CurrentTrackChanged { .. } => "CurrentTrackChanged",
            PlayerEvent::PlaybackStateChanged { .. } => "PlaybackStateChanged",
            PlayerEvent::RepeatModeChanged { .. } => "RepeatModeChanged",
            PlayerEvent::LibraryChanged { .. } => "LibraryChanged",
            PlayerEvent::Audio { .. } => "Audio",
        }
    }
}

/// Central event distribution bus
///
/// Non-blocking publish; slow subscribers lag rather than blocking
/// producers, and subscribers are cleaned up automatically when dropped.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PlayerEvent>,
}

impl EventBus {
    /// Create a new EventBus buffering up to `capacity` events
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, ignoring whether anyone is listening
    pub fn emit_lossy(&self, event: PlayerEvent) {
        let _ = self.tx.send(event);
    }

    /// Current number of subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
