//! Player engine
//!
//! Async wrapper around [`QueueState`]. Every operation takes the write
//! lock, applies the state transition, emits change events, and forwards
//! the resulting transport commands to the audio-output collaborator via
//! the event bus.
//!
//! Load commands reference payloads that live in storage, so their
//! existence check awaits the database. The queue is free to mutate while
//! that check is outstanding; a load generation token (bumped on every
//! mutation) lets the engine detect and discard stale results instead of
//! applying them.

use crate::db;
use crate::error::{Error, Result};
use crate::events::{EventBus, PlayerEvent};
use crate::library::Track;
use crate::playback::queue::QueueState;
use crate::playback::types::{AudioCommand, RepeatMode};
use serde::Serialize;
use sqlx::SqlitePool;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Serializable view of the full player state
#[derive(Debug, Clone, Serialize)]
pub struct PlayerSnapshot {
    pub queue: Vec<Track>,
    pub current_index: usize,
    pub repeat: RepeatMode,
    pub playing: bool,
}

/// Point-in-time view used to diff state around a transition
struct StateView {
    len: usize,
    index: usize,
    track_id: Option<String>,
    playing: bool,
}

impl StateView {
    fn of(state: &QueueState) -> Self {
        Self {
            len: state.len(),
            index: state.current_index(),
            track_id: state.current_track().map(|t| t.id.clone()),
            playing: state.is_playing(),
        }
    }
}

/// Queue/playback engine
pub struct Player {
    db: SqlitePool,
    events: EventBus,
    queue: RwLock<QueueState>,
    /// Bumped on every queue mutation; loads snapshotted against an older
    /// value are stale and must be discarded.
    load_generation: AtomicU64,
}

impl Player {
    pub fn new(db: SqlitePool, events: EventBus) -> Self {
        Self {
            db,
            events,
            queue: RwLock::new(QueueState::new()),
            load_generation: AtomicU64::new(0),
        }
    }

    /// Full state snapshot for the state endpoint and tests
    pub async fn snapshot(&self) -> PlayerSnapshot {
        let queue = self.queue.read().await;
        PlayerSnapshot {
            queue: queue.tracks().to_vec(),
            current_index: queue.current_index(),
            repeat: queue.repeat(),
            playing: queue.is_playing(),
        }
    }

    // ------------------------------------------------------------------
    // Queue mutation
    // ------------------------------------------------------------------

    /// Append a track unless its id is already queued; true when added
    pub async fn enqueue(&self, track: Track) -> bool {
        let mut queue = self.queue.write().await;
        let before = StateView::of(&queue);
        let added = queue.enqueue(track);
        if added {
            self.bump();
            self.emit_diff(&before, &queue, true);
        }
        added
    }

    /// Enqueue each track in order; returns the count actually added
    pub async fn enqueue_many(&self, tracks: Vec<Track>) -> usize {
        let mut queue = self.queue.write().await;
        let before = StateView::of(&queue);
        let added = queue.enqueue_many(tracks);
        if added > 0 {
            self.bump();
            self.emit_diff(&before, &queue, true);
        }
        added
    }

    /// Remove the entry at `index`; false when out of bounds
    pub async fn dequeue(&self, index: usize) -> bool {
        let (removed, commands) = {
            let mut queue = self.queue.write().await;
            let before = StateView::of(&queue);
            match queue.dequeue(index) {
                Some(commands) => {
                    self.bump();
                    self.emit_diff(&before, &queue, true);
                    (true, commands)
                }
                None => (false, Vec::new()),
            }
        };
        self.send_commands(commands);
        removed
    }

    /// Empty the queue and stop playback
    pub async fn clear(&self) {
        let commands = {
            let mut queue = self.queue.write().await;
            let before = StateView::of(&queue);
            let commands = queue.clear();
            self.bump();
            self.emit_diff(&before, &queue, true);
            commands
        };
        self.send_commands(commands);
    }

    /// Shuffle the queue, keeping the current track first; false when the
    /// queue was too short to reorder
    pub async fn shuffle(&self) -> bool {
        let mut queue = self.queue.write().await;
        let before = StateView::of(&queue);
        let mut rng = rand::thread_rng();
        let changed = queue.shuffle(&mut rng);
        if changed {
            self.bump();
            self.emit_diff(&before, &queue, true);
        }
        changed
    }

    /// Replace the queue with a single track and play it
    pub async fn play_now(&self, track: Track) -> Result<()> {
        let (generation, commands) = {
            let mut queue = self.queue.write().await;
            let before = StateView::of(&queue);
            let commands = queue.play_now(track);
            let generation = self.bump();
            self.emit_diff(&before, &queue, true);
            (generation, commands)
        };
        self.dispatch(generation, commands).await
    }

    /// Replace the queue with `tracks` verbatim and play from the top
    pub async fn play_all(&self, tracks: Vec<Track>) -> Result<()> {
        let (generation, commands) = {
            let mut queue = self.queue.write().await;
            let before = StateView::of(&queue);
            let commands = queue.play_all(tracks);
            let generation = self.bump();
            self.emit_diff(&before, &queue, true);
            (generation, commands)
        };
        self.dispatch(generation, commands).await
    }

    /// Replace the queue with a shuffled copy of `tracks` and play
    pub async fn shuffle_all(&self, tracks: Vec<Track>) -> Result<()> {
        let (generation, commands) = {
            let mut queue = self.queue.write().await;
            let before = StateView::of(&queue);
            let mut rng = rand::thread_rng();
            let commands = queue.shuffle_all(tracks, &mut rng);
            let generation = self.bump();
            self.emit_diff(&before, &queue, true);
            (generation, commands)
        };
        self.dispatch(generation, commands).await
    }

    // ------------------------------------------------------------------
    // Navigation and transport
    // ------------------------------------------------------------------

    /// Jump to `index` and play; false when out of bounds (no-op)
    pub async fn play_at_index(&self, index: usize) -> Result<bool> {
        let (generation, commands) = {
            let mut queue = self.queue.write().await;
            let before = StateView::of(&queue);
            match queue.play_at_index(index) {
                Some(commands) => {
                    let generation = self.bump();
                    self.emit_diff(&before, &queue, false);
                    (generation, commands)
                }
                None => return Ok(false),
            }
        };
        self.dispatch(generation, commands).await?;
        Ok(true)
    }

    /// Explicit "next" control; false when already at the end of the queue
    pub async fn next(&self) -> Result<bool> {
        let (generation, commands) = {
            let mut queue = self.queue.write().await;
            let before = StateView::of(&queue);
            match queue.next() {
                Some(commands) => {
                    let generation = self.bump();
                    self.emit_diff(&before, &queue, false);
                    (generation, commands)
                }
                None => return Ok(false),
            }
        };
        self.dispatch(generation, commands).await?;
        Ok(true)
    }

    /// Explicit "previous" control; false at the first track (never wraps)
    pub async fn previous(&self) -> Result<bool> {
        let (generation, commands) = {
            let mut queue = self.queue.write().await;
            let before = StateView::of(&queue);
            match queue.previous() {
                Some(commands) => {
                    let generation = self.bump();
                    self.emit_diff(&before, &queue, false);
                    (generation, commands)
                }
                None => return Ok(false),
            }
        };
        self.dispatch(generation, commands).await?;
        Ok(true)
    }

    /// Collaborator's "playback finished" event
    pub async fn track_ended(&self) -> Result<()> {
        let (generation, commands) = {
            let mut queue = self.queue.write().await;
            let before = StateView::of(&queue);
            let commands = queue.on_track_ended();
            let generation = self.bump();
            self.emit_diff(&before, &queue, false);
            (generation, commands)
        };
        self.dispatch(generation, commands).await
    }

    /// Pause if playing, else resume; returns the new playing flag
    pub async fn toggle_play(&self) -> bool {
        let (playing, command) = {
            let mut queue = self.queue.write().await;
            let before = StateView::of(&queue);
            let command = queue.toggle_play();
            if command.is_some() {
                self.emit_diff(&before, &queue, false);
            }
            (queue.is_playing(), command)
        };
        if let Some(command) = command {
            self.events.emit_lossy(PlayerEvent::Audio { command });
        }
        playing
    }

    /// Cycle repeat mode; returns the new mode
    pub async fn toggle_repeat(&self) -> RepeatMode {
        let mode = self.queue.write().await.toggle_repeat();
        self.events.emit_lossy(PlayerEvent::RepeatModeChanged { mode });
        mode
    }

    /// Collaborator reported an actual play/pause transition
    pub async fn transport_changed(&self, playing: bool) {
        let changed = {
            let mut queue = self.queue.write().await;
            let was = queue.is_playing();
            queue.set_transport(playing);
            was != playing
        };
        if changed {
            self.events
                .emit_lossy(PlayerEvent::PlaybackStateChanged { playing });
        }
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Advance the load generation; returns the new value
    fn bump(&self) -> u64 {
        self.load_generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Emit change events by diffing the state around a transition
    fn emit_diff(&self, before: &StateView, state: &QueueState, queue_changed: bool) {
        let after = StateView::of(state);
        if queue_changed {
            self.events.emit_lossy(PlayerEvent::QueueChanged {
                queue_len: after.len,
                current_index: after.index,
            });
        }
        if before.track_id != after.track_id || before.index != after.index {
            self.events.emit_lossy(PlayerEvent::CurrentTrackChanged {
                track_id: after.track_id.clone(),
                current_index: after.index,
            });
        }
        if before.playing != after.playing {
            self.events.emit_lossy(PlayerEvent::PlaybackStateChanged {
                playing: after.playing,
            });
        }
    }

    /// Forward commands that need no storage validation
    fn send_commands(&self, commands: Vec<AudioCommand>) {
        for command in commands {
            self.events.emit_lossy(PlayerEvent::Audio { command });
        }
    }

    /// Forward commands, validating loads against storage.
    ///
    /// The existence check awaits the database; if the queue mutated in
    /// the meantime (generation moved on), the whole command batch is
    /// stale and is dropped rather than applied.
    async fn dispatch(&self, generation: u64, commands: Vec<AudioCommand>) -> Result<()> {
        for command in commands {
            if let AudioCommand::Load { track_id } = &command {
                let exists = db::tracks::exists(&self.db, track_id).await?;

                if self.load_generation.load(Ordering::SeqCst) != generation {
                    debug!("Discarding stale load of {} (queue changed)", track_id);
                    return Ok(());
                }

                if !exists {
                    warn!("Track {} missing from storage, playback not started", track_id);
                    let changed = {
                        let mut queue = self.queue.write().await;
                        let was = queue.is_playing();
                        queue.set_transport(false);
                        was
                    };
                    if changed {
                        self.events
                            .emit_lossy(PlayerEvent::PlaybackStateChanged { playing: false });
                    }
                    return Err(Error::NotFound(format!("track {}", track_id)));
                }
            }
            self.events.emit_lossy(PlayerEvent::Audio { command });
        }
        Ok(())
    }
}
