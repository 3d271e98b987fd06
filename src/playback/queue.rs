//! Queue/playback state machine
//!
//! Pure policy: every operation mutates the queue state and returns the
//! transport commands the audio-output collaborator should execute. No
//! audio binding, no I/O, so the whole policy is unit-testable.
//!
//! Invariant: `current_index < queue.len()` whenever the queue is
//! non-empty; when empty, `current_index` is 0 and playback is stopped.

use crate::library::Track;
use crate::playback::types::{Advance, AudioCommand, RepeatMode};
use rand::seq::SliceRandom;
use rand::Rng;

/// Play queue plus transport flags
#[derive(Debug, Clone, Default)]
pub struct QueueState {
    queue: Vec<Track>,
    current_index: usize,
    repeat: RepeatMode,
    playing: bool,
}

impl QueueState {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn tracks(&self) -> &[Track] {
        &self.queue
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn repeat(&self) -> RepeatMode {
        self.repeat
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Track at the current index, if any
    pub fn current_track(&self) -> Option<&Track> {
        self.queue.get(self.current_index)
    }

    // ------------------------------------------------------------------
    // Queue mutation
    // ------------------------------------------------------------------

    /// Append `track` unless an entry with the same id is already queued.
    ///
    /// Returns true when the track was added. First occurrence wins; a
    /// duplicate is a silent no-op. Never moves the current index.
    pub fn enqueue(&mut self, track: Track) -> bool {
        if self.queue.iter().any(|t| t.id == track.id) {
            return false;
        }
        self.queue.push(track);
        true
    }

    /// Enqueue each track in input order; returns the count actually added
    pub fn enqueue_many(&mut self, tracks: Vec<Track>) -> usize {
        let mut added = 0;
        for track in tracks {
            if self.enqueue(track) {
                added += 1;
            }
        }
        added
    }

    /// Remove the entry at `index`.
    ///
    /// Out-of-bounds is a no-op (returns None). After removal the current
    /// index is clamped backward: if it fell off the end and is still
    /// positive, it moves to the previous track. Transport state is left
    /// alone unless the removal emptied the queue, in which case playback
    /// stops.
    pub fn dequeue(&mut self, index: usize) -> Option<Vec<AudioCommand>> {
        if index >= self.queue.len() {
            return None;
        }
        self.queue.remove(index);

        if self.current_index >= self.queue.len() && self.current_index > 0 {
            self.current_index -= 1;
        }

        if self.queue.is_empty() {
            self.current_index = 0;
            self.playing = false;
            return Some(vec![AudioCommand::Pause, AudioCommand::Unload]);
        }
        Some(Vec::new())
    }

    /// Empty the queue and stop playback
    pub fn clear(&mut self) -> Vec<AudioCommand> {
        self.queue.clear();
        self.current_index = 0;
        self.playing = false;
        vec![AudioCommand::Pause, AudioCommand::Unload]
    }

    /// Shuffle everything after the current track.
    ///
    /// The playing track is pulled to index 0 and the remainder gets a
    /// uniform Fisher-Yates permutation. No-op for queues of length <= 1.
    /// Returns true when the queue was reordered.
    pub fn shuffle<R: Rng>(&mut self, rng: &mut R) -> bool {
        if self.queue.len() <= 1 {
            return false;
        }
        let current = self.queue.remove(self.current_index);
        self.queue.shuffle(rng);
        self.queue.insert(0, current);
        self.current_index = 0;
        true
    }

    /// Replace the queue with a single track and start playing it
    pub fn play_now(&mut self, track: Track) -> Vec<AudioCommand> {
        self.replace_queue(vec![track])
    }

    /// Replace the queue with `tracks` verbatim and start from the top.
    ///
    /// Input is copied as-is: duplicates in the source survive here, unlike
    /// `enqueue` which filters them.
    pub fn play_all(&mut self, tracks: Vec<Track>) -> Vec<AudioCommand> {
        self.replace_queue(tracks)
    }

    /// Replace the queue with a uniform permutation of `tracks` and start
    /// from the top
    pub fn shuffle_all<R: Rng>(&mut self, mut tracks: Vec<Track>, rng: &mut R) -> Vec<AudioCommand> {
        tracks.shuffle(rng);
        self.replace_queue(tracks)
    }

    fn replace_queue(&mut self, tracks: Vec<Track>) -> Vec<AudioCommand> {
        if tracks.is_empty() {
            return self.clear();
        }
        self.queue = tracks;
        self.current_index = 0;
        self.playing = true;
        vec![
            AudioCommand::Load {
                track_id: self.queue[0].id.clone(),
            },
            AudioCommand::Play,
        ]
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    /// Forward-navigation decision shared by the "next" control and by
    /// natural track-end: step forward if possible, wrap to 0 under
    /// repeat-all, otherwise report end of queue.
    pub fn advance(&mut self) -> Advance {
        if self.current_index + 1 < self.queue.len() {
            self.current_index += 1;
            Advance::Advanced
        } else if self.repeat == RepeatMode::All && !self.queue.is_empty() {
            self.current_index = 0;
            Advance::Advanced
        } else {
            Advance::EndOfQueue
        }
    }

    /// Explicit "next" control.
    ///
    /// Returns None at the end of the queue (transport untouched). On
    /// advance, loads and plays the new current track even if the player
    /// was paused.
    pub fn next(&mut self) -> Option<Vec<AudioCommand>> {
        match self.advance() {
            Advance::Advanced => Some(self.load_current()),
            Advance::EndOfQueue => None,
        }
    }

    /// Explicit "previous" control.
    ///
    /// Steps back one track when possible, loading and playing it even if
    /// the player was paused. Never wraps, even under repeat-all; the
    /// asymmetry with `advance` is intentional.
    pub fn previous(&mut self) -> Option<Vec<AudioCommand>> {
        if self.current_index == 0 {
            return None;
        }
        self.current_index -= 1;
        Some(self.load_current())
    }

    /// Jump straight to `index`. Out-of-bounds is a no-op.
    pub fn play_at_index(&mut self, index: usize) -> Option<Vec<AudioCommand>> {
        if index >= self.queue.len() {
            return None;
        }
        self.current_index = index;
        self.playing = true;
        Some(vec![
            AudioCommand::Load {
                track_id: self.queue[index].id.clone(),
            },
            AudioCommand::Play,
        ])
    }

    /// Transition driven by the collaborator's "playback finished" event.
    ///
    /// Repeat-one restarts the same track from zero without consulting
    /// `advance`. Otherwise advance; at end of queue the last track stays
    /// loaded but paused.
    pub fn on_track_ended(&mut self) -> Vec<AudioCommand> {
        if self.queue.is_empty() {
            self.playing = false;
            return Vec::new();
        }

        if self.repeat == RepeatMode::One {
            self.playing = true;
            return vec![AudioCommand::Seek { position_secs: 0.0 }, AudioCommand::Play];
        }

        match self.advance() {
            Advance::Advanced => {
                self.playing = true;
                vec![
                    AudioCommand::Load {
                        track_id: self.queue[self.current_index].id.clone(),
                    },
                    AudioCommand::Play,
                ]
            }
            Advance::EndOfQueue => {
                self.playing = false;
                Vec::new()
            }
        }
    }

    // ------------------------------------------------------------------
    // Transport
    // ------------------------------------------------------------------

    /// Cycle repeat mode off -> all -> one -> off; returns the new mode
    pub fn toggle_repeat(&mut self) -> RepeatMode {
        self.repeat = self.repeat.next();
        self.repeat
    }

    /// Pause if playing, else resume. No-op on an empty queue.
    pub fn toggle_play(&mut self) -> Option<AudioCommand> {
        if self.queue.is_empty() {
            return None;
        }
        if self.playing {
            self.playing = false;
            Some(AudioCommand::Pause)
        } else {
            self.playing = true;
            Some(AudioCommand::Play)
        }
    }

    /// Record the collaborator's actual transport state.
    ///
    /// The play flag mirrors what the audio element reports, not what we
    /// last commanded.
    pub fn set_transport(&mut self, playing: bool) {
        self.playing = playing;
    }

    fn load_current(&mut self) -> Vec<AudioCommand> {
        self.playing = true;
        vec![
            AudioCommand::Load {
                track_id: self.queue[self.current_index].id.clone(),
            },
            AudioCommand::Play,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn track(id: &str) -> Track {
        Track {
            id: format!("song:{}", id),
            name: id.to_string(),
            size: 1,
            uploaded_at: Utc::now(),
        }
    }

    fn queue_of(ids: &[&str]) -> QueueState {
        let mut state = QueueState::new();
        for id in ids {
            assert!(state.enqueue(track(id)));
        }
        state
    }

    fn ids(state: &QueueState) -> Vec<String> {
        state.tracks().iter().map(|t| t.id.clone()).collect()
    }

    #[test]
    fn test_enqueue_idempotent_per_id() {
        let mut state = QueueState::new();
        assert!(state.enqueue(track("a")));
        assert!(!state.enqueue(track("a")));
        assert_eq!(state.len(), 1);
    }

    #[test]
    fn test_enqueue_does_not_move_index() {
        let mut state = queue_of(&["a", "b"]);
        state.play_at_index(1);
        state.enqueue(track("c"));
        assert_eq!(state.current_index(), 1);
    }

    #[test]
    fn test_enqueue_many_counts_additions() {
        let mut state = queue_of(&["a"]);
        let added = state.enqueue_many(vec![track("a"), track("b"), track("c")]);
        assert_eq!(added, 2);
        assert_eq!(ids(&state), vec!["song:a", "song:b", "song:c"]);
    }

    #[test]
    fn test_dequeue_preserves_relative_order() {
        let mut state = queue_of(&["a", "b", "c", "d"]);
        state.dequeue(1).unwrap();
        assert_eq!(ids(&state), vec!["song:a", "song:c", "song:d"]);
    }

    #[test]
    fn test_dequeue_out_of_bounds_is_noop() {
        let mut state = queue_of(&["a"]);
        assert!(state.dequeue(5).is_none());
        assert_eq!(state.len(), 1);
    }

    #[test]
    fn test_dequeue_clamps_index_backward() {
        let mut state = queue_of(&["a", "b", "c"]);
        state.play_at_index(2);
        // Remove the last element while pointing at it
        state.dequeue(2).unwrap();
        assert_eq!(state.current_index(), 1);
        assert_eq!(state.len(), 2);
    }

    #[test]
    fn test_dequeue_only_element_stops_playback() {
        let mut state = queue_of(&["a"]);
        state.play_at_index(0);
        assert!(state.is_playing());

        let commands = state.dequeue(0).unwrap();
        assert!(state.is_empty());
        assert_eq!(state.current_index(), 0);
        assert!(!state.is_playing());
        assert_eq!(commands, vec![AudioCommand::Pause, AudioCommand::Unload]);
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut state = queue_of(&["a", "b"]);
        state.play_at_index(1);

        let commands = state.clear();
        assert!(state.is_empty());
        assert_eq!(state.current_index(), 0);
        assert!(!state.is_playing());
        assert_eq!(commands, vec![AudioCommand::Pause, AudioCommand::Unload]);
    }

    #[test]
    fn test_shuffle_keeps_current_first_and_preserves_multiset() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut state = queue_of(&["a", "b", "c", "d", "e"]);
        state.play_at_index(2); // song:c

        assert!(state.shuffle(&mut rng));
        assert_eq!(state.current_index(), 0);
        assert_eq!(state.tracks()[0].id, "song:c");

        let mut sorted = ids(&state);
        sorted.sort();
        assert_eq!(
            sorted,
            vec!["song:a", "song:b", "song:c", "song:d", "song:e"]
        );
    }

    #[test]
    fn test_shuffle_short_queue_is_noop() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut state = queue_of(&["a"]);
        assert!(!state.shuffle(&mut rng));

        let mut empty = QueueState::new();
        assert!(!empty.shuffle(&mut rng));
    }

    #[test]
    fn test_play_now_replaces_queue() {
        let mut state = queue_of(&["a", "b"]);
        let commands = state.play_now(track("z"));

        assert_eq!(ids(&state), vec!["song:z"]);
        assert_eq!(state.current_index(), 0);
        assert!(state.is_playing());
        assert_eq!(
            commands,
            vec![
                AudioCommand::Load {
                    track_id: "song:z".to_string()
                },
                AudioCommand::Play
            ]
        );
    }

    #[test]
    fn test_play_all_preserves_duplicates() {
        // Bulk replacement copies the input verbatim, unlike enqueue
        let mut state = QueueState::new();
        state.play_all(vec![track("a"), track("a"), track("b")]);
        assert_eq!(state.len(), 3);
    }

    #[test]
    fn test_play_all_empty_input_behaves_like_clear() {
        let mut state = queue_of(&["a"]);
        state.play_at_index(0);
        let commands = state.play_all(Vec::new());
        assert!(state.is_empty());
        assert!(!state.is_playing());
        assert_eq!(commands, vec![AudioCommand::Pause, AudioCommand::Unload]);
    }

    #[test]
    fn test_shuffle_all_preserves_multiset() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut state = QueueState::new();
        state.shuffle_all(vec![track("a"), track("b"), track("c")], &mut rng);

        let mut sorted = ids(&state);
        sorted.sort();
        assert_eq!(sorted, vec!["song:a", "song:b", "song:c"]);
        assert_eq!(state.current_index(), 0);
        assert!(state.is_playing());
    }

    #[test]
    fn test_advance_within_queue() {
        let mut state = queue_of(&["a", "b", "c"]);
        assert_eq!(state.advance(), Advance::Advanced);
        assert_eq!(state.current_index(), 1);
    }

    #[test]
    fn test_advance_wraps_only_under_repeat_all() {
        let mut state = queue_of(&["a", "b"]);
        state.play_at_index(1);

        assert_eq!(state.advance(), Advance::EndOfQueue);
        assert_eq!(state.current_index(), 1);

        state.toggle_repeat(); // all
        assert_eq!(state.advance(), Advance::Advanced);
        assert_eq!(state.current_index(), 0);
    }

    #[test]
    fn test_previous_never_wraps_even_under_repeat_all() {
        let mut state = queue_of(&["a", "b"]);
        state.toggle_repeat(); // all
        assert!(state.previous().is_none());
        assert_eq!(state.current_index(), 0);
    }

    #[test]
    fn test_next_plays_even_when_paused() {
        let mut state = queue_of(&["a", "b"]);
        let commands = state.next().unwrap();
        assert_eq!(
            commands,
            vec![
                AudioCommand::Load {
                    track_id: "song:b".to_string()
                },
                AudioCommand::Play,
            ]
        );
        assert!(state.is_playing());
    }

    #[test]
    fn test_previous_plays_even_when_paused() {
        let mut state = queue_of(&["a", "b"]);
        state.play_at_index(1);
        state.toggle_play(); // pause

        let commands = state.previous().unwrap();
        assert!(commands.contains(&AudioCommand::Play));
        assert!(state.is_playing());
        assert_eq!(state.current_index(), 0);
    }

    #[test]
    fn test_toggle_repeat_cycle_is_identity_after_three() {
        let mut state = QueueState::new();
        let start = state.repeat();
        state.toggle_repeat();
        state.toggle_repeat();
        state.toggle_repeat();
        assert_eq!(state.repeat(), start);
    }

    #[test]
    fn test_toggle_play_noop_on_empty_queue() {
        let mut state = QueueState::new();
        assert!(state.toggle_play().is_none());
        assert!(!state.is_playing());
    }

    #[test]
    fn test_toggle_play_alternates() {
        let mut state = queue_of(&["a"]);
        assert_eq!(state.toggle_play(), Some(AudioCommand::Play));
        assert!(state.is_playing());
        assert_eq!(state.toggle_play(), Some(AudioCommand::Pause));
        assert!(!state.is_playing());
    }

    #[test]
    fn test_ended_repeat_off_at_last_track_stops() {
        let mut state = queue_of(&["a", "b", "c"]);
        state.play_at_index(2);

        let commands = state.on_track_ended();
        assert!(commands.is_empty());
        assert!(!state.is_playing());
        assert_eq!(state.current_index(), 2);
    }

    #[test]
    fn test_ended_repeat_all_wraps_and_continues() {
        let mut state = queue_of(&["a", "b", "c"]);
        state.play_at_index(2);
        state.toggle_repeat(); // all

        let commands = state.on_track_ended();
        assert_eq!(state.current_index(), 0);
        assert!(state.is_playing());
        assert_eq!(
            commands,
            vec![
                AudioCommand::Load {
                    track_id: "song:a".to_string()
                },
                AudioCommand::Play
            ]
        );
    }

    #[test]
    fn test_ended_repeat_one_replays_same_index() {
        let mut state = queue_of(&["a", "b", "c"]);
        state.play_at_index(1);
        state.toggle_repeat(); // all
        state.toggle_repeat(); // one

        let commands = state.on_track_ended();
        assert_eq!(state.current_index(), 1);
        assert!(state.is_playing());
        assert_eq!(
            commands,
            vec![
                AudioCommand::Seek { position_secs: 0.0 },
                AudioCommand::Play
            ]
        );
    }

    #[test]
    fn test_ended_mid_queue_advances() {
        let mut state = queue_of(&["a", "b", "c"]);
        state.play_at_index(0);

        let commands = state.on_track_ended();
        assert_eq!(state.current_index(), 1);
        assert!(state.is_playing());
        assert_eq!(
            commands,
            vec![
                AudioCommand::Load {
                    track_id: "song:b".to_string()
                },
                AudioCommand::Play
            ]
        );
    }

    #[test]
    fn test_play_at_index_out_of_bounds_is_noop() {
        let mut state = queue_of(&["a"]);
        assert!(state.play_at_index(3).is_none());
        assert_eq!(state.current_index(), 0);
        assert!(!state.is_playing());
    }

    #[test]
    fn test_set_transport_mirrors_collaborator() {
        let mut state = queue_of(&["a"]);
        state.set_transport(true);
        assert!(state.is_playing());
        state.set_transport(false);
        assert!(!state.is_playing());
    }
}
