//! Active playlist with mode-aware navigation.

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::model::Track;

/// Traversal mode for the playlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayMode {
    /// Play in order, wrapping at both ends
    #[default]
    Sequential,
    /// Replay the current track on "next"
    RepeatOne,
    /// Non-repeating random traversal
    Shuffle,
}

impl PlayMode {
    /// The next mode in the cycle.
    pub fn next(self) -> Self {
        match self {
            PlayMode::Sequential => PlayMode::RepeatOne,
            PlayMode::RepeatOne => PlayMode::Shuffle,
            PlayMode::Shuffle => PlayMode::Sequential,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PlayMode::Sequential => "sequential",
            PlayMode::RepeatOne => "repeat one",
            PlayMode::Shuffle => "shuffle",
        }
    }
}

/// Result of removing a track.
#[derive(Debug, Clone, PartialEq)]
pub struct Removed {
    pub track: Track,
    /// The removed track was the current one
    pub was_current: bool,
}

/// The active playlist.
///
/// `current_index` is always in `[0, len)` when the list is non-empty and 0
/// when it is empty. In shuffle mode `shuffle_order` is a permutation of all
/// indices and `shuffle_order[shuffle_cursor] == current_index`.
#[derive(Debug, Clone, Default)]
pub struct Playlist {
    tracks: Vec<Track>,
    current_index: usize,
    mode: PlayMode,
    /// Shuffled indices (maps shuffle slot -> track index)
    shuffle_order: Vec<usize>,
    /// Current slot in shuffle_order
    shuffle_cursor: usize,
}

impl Playlist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a playlist in the given mode.
    pub fn with_tracks(tracks: Vec<Track>, index: usize, mode: PlayMode) -> Self {
        let mut playlist = Self {
            mode,
            ..Self::default()
        };
        playlist.replace(tracks, index);
        playlist
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn get(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    /// Track at the current index.
    pub fn current(&self) -> Option<&Track> {
        self.tracks.get(self.current_index)
    }

    pub fn mode(&self) -> PlayMode {
        self.mode
    }

    pub fn shuffle_order(&self) -> &[usize] {
        &self.shuffle_order
    }

    pub fn shuffle_cursor(&self) -> usize {
        self.shuffle_cursor
    }

    /// Index of the track with `id`.
    pub fn position_of(&self, id: u64) -> Option<usize> {
        self.tracks.iter().position(|t| t.id == id)
    }

    /// Replace the whole list. An out-of-range index falls back to 0.
    pub fn replace(&mut self, tracks: Vec<Track>, index: usize) {
        self.current_index = if index < tracks.len() { index } else { 0 };
        self.tracks = tracks;
        self.regenerate_if_shuffle();
    }

    /// Point at `index` without touching the permutation beyond the cursor.
    pub fn select(&mut self, index: usize) -> Option<&Track> {
        if index >= self.tracks.len() {
            return None;
        }
        self.current_index = index;
        if self.mode == PlayMode::Shuffle {
            match self.shuffle_order.iter().position(|&i| i == index) {
                Some(slot) => self.shuffle_cursor = slot,
                None => self.regenerate_pinned(),
            }
        }
        self.current()
    }

    /// Change mode. Entering shuffle builds a fresh permutation with the
    /// current track first; leaving it drops the permutation.
    pub fn set_mode(&mut self, mode: PlayMode) {
        let entering_shuffle = mode == PlayMode::Shuffle && self.mode != PlayMode::Shuffle;
        self.mode = mode;
        if entering_shuffle {
            self.regenerate_pinned();
        } else if mode != PlayMode::Shuffle {
            self.shuffle_order.clear();
            self.shuffle_cursor = 0;
        }
    }

    /// Append a track unless one with the same ID is present.
    pub fn add(&mut self, track: Track) -> bool {
        if self.position_of(track.id).is_some() {
            return false;
        }
        self.tracks.push(track);
        self.regenerate_if_shuffle();
        true
    }

    /// Remove the track at `index`.
    ///
    /// Removing the current track makes the one that shifted into its slot
    /// current (wrapping to the start when the last track was removed).
    pub fn remove(&mut self, index: usize) -> Option<Removed> {
        if index >= self.tracks.len() {
            return None;
        }

        let track = self.tracks.remove(index);
        let was_current = index == self.current_index;

        if index < self.current_index {
            self.current_index -= 1;
        } else if was_current && self.current_index >= self.tracks.len() {
            self.current_index = 0;
        }

        self.regenerate_if_shuffle();
        Some(Removed { track, was_current })
    }

    /// Empty the list.
    pub fn clear(&mut self) {
        self.tracks.clear();
        self.current_index = 0;
        self.shuffle_order.clear();
        self.shuffle_cursor = 0;
    }

    /// Move forward and return the new current index.
    ///
    /// Sequential and repeat-one both wrap at the end; the caller decides
    /// whether repeat-one advances at all. In shuffle mode an exhausted
    /// permutation is reshuffled and traversal restarts at its first slot.
    pub fn step_forward(&mut self) -> Option<usize> {
        if self.tracks.is_empty() {
            return None;
        }

        if self.mode == PlayMode::Shuffle {
            self.ensure_shuffle_order();
            if self.shuffle_cursor + 1 < self.shuffle_order.len() {
                self.shuffle_cursor += 1;
            } else {
                self.reshuffle();
                self.shuffle_cursor = 0;
            }
            self.current_index = self.shuffle_order[self.shuffle_cursor];
        } else {
            self.current_index = (self.current_index + 1) % self.tracks.len();
        }

        Some(self.current_index)
    }

    /// Move back and return the new current index.
    ///
    /// At the first shuffle slot the current track is kept.
    pub fn step_back(&mut self) -> Option<usize> {
        if self.tracks.is_empty() {
            return None;
        }

        if self.mode == PlayMode::Shuffle {
            self.ensure_shuffle_order();
            if self.shuffle_cursor > 0 {
                self.shuffle_cursor -= 1;
                self.current_index = self.shuffle_order[self.shuffle_cursor];
            }
        } else if self.current_index == 0 {
            self.current_index = self.tracks.len() - 1;
        } else {
            self.current_index -= 1;
        }

        Some(self.current_index)
    }

    /// Whether there is a track before the current one without wrapping.
    pub fn has_previous(&self) -> bool {
        if self.mode == PlayMode::Shuffle {
            self.shuffle_cursor > 0
        } else {
            self.current_index > 0
        }
    }

    /// Whether there is a track after the current one without wrapping.
    pub fn has_next(&self) -> bool {
        if self.mode == PlayMode::Shuffle {
            self.shuffle_cursor + 1 < self.shuffle_order.len()
        } else {
            self.current_index + 1 < self.tracks.len()
        }
    }

    fn ensure_shuffle_order(&mut self) {
        if self.shuffle_order.len() != self.tracks.len() {
            self.regenerate_pinned();
        }
    }

    fn regenerate_if_shuffle(&mut self) {
        if self.mode == PlayMode::Shuffle {
            self.regenerate_pinned();
        } else {
            self.shuffle_order.clear();
            self.shuffle_cursor = 0;
        }
    }

    /// Fresh permutation with the current track in slot 0.
    fn regenerate_pinned(&mut self) {
        self.reshuffle();
        if let Some(slot) = self
            .shuffle_order
            .iter()
            .position(|&i| i == self.current_index)
        {
            self.shuffle_order.swap(0, slot);
        }
        self.shuffle_cursor = 0;
    }

    /// Fisher-Yates over all indices, no pinning.
    fn reshuffle(&mut self) {
        let mut indices: Vec<usize> = (0..self.tracks.len()).collect();
        indices.shuffle(&mut rand::rng());
        self.shuffle_order = indices;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::mock_tracks as tracks;
    use std::collections::HashSet;

    #[test]
    fn test_mode_cycle() {
        assert_eq!(PlayMode::Sequential.next(), PlayMode::RepeatOne);
        assert_eq!(PlayMode::RepeatOne.next(), PlayMode::Shuffle);
        assert_eq!(PlayMode::Shuffle.next(), PlayMode::Sequential);
    }

    #[test]
    fn test_mode_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&PlayMode::RepeatOne).unwrap(),
            "\"repeat_one\""
        );
    }

    #[test]
    fn test_sequential_wraps_both_ways() {
        let mut playlist = Playlist::with_tracks(tracks(3), 2, PlayMode::Sequential);
        assert_eq!(playlist.step_forward(), Some(0));
        assert_eq!(playlist.step_back(), Some(2));
        assert_eq!(playlist.step_back(), Some(1));
    }

    #[test]
    fn test_replace_out_of_range_index() {
        let mut playlist = Playlist::new();
        playlist.replace(tracks(2), 5);
        assert_eq!(playlist.current_index(), 0);
    }

    #[test]
    fn test_empty_playlist_navigation_is_noop() {
        let mut playlist = Playlist::new();
        assert_eq!(playlist.step_forward(), None);
        assert_eq!(playlist.step_back(), None);
        assert!(playlist.current().is_none());
        assert!(!playlist.has_next());
        assert!(!playlist.has_previous());
    }

    #[test]
    fn test_add_rejects_duplicate_id() {
        let mut playlist = Playlist::with_tracks(tracks(2), 0, PlayMode::Sequential);
        assert!(!playlist.add(Track::new(2, "Again")));
        assert!(playlist.add(Track::new(3, "New")));
        assert_eq!(playlist.len(), 3);
    }

    #[test]
    fn test_remove_before_current_shifts_index() {
        let mut playlist = Playlist::with_tracks(tracks(4), 2, PlayMode::Sequential);
        let removed = playlist.remove(0).unwrap();
        assert!(!removed.was_current);
        assert_eq!(playlist.current_index(), 1);
        assert_eq!(playlist.current().unwrap().id, 3);
    }

    #[test]
    fn test_remove_current_takes_next_slot() {
        let mut playlist = Playlist::with_tracks(tracks(3), 1, PlayMode::Sequential);
        let removed = playlist.remove(1).unwrap();
        assert!(removed.was_current);
        assert_eq!(playlist.current().unwrap().id, 3);
    }

    #[test]
    fn test_remove_last_current_wraps() {
        let mut playlist = Playlist::with_tracks(tracks(3), 2, PlayMode::Sequential);
        playlist.remove(2).unwrap();
        assert_eq!(playlist.current_index(), 0);
    }

    #[test]
    fn test_remove_out_of_range() {
        let mut playlist = Playlist::with_tracks(tracks(2), 0, PlayMode::Sequential);
        assert!(playlist.remove(2).is_none());
        assert_eq!(playlist.len(), 2);
    }

    #[test]
    fn test_entering_shuffle_pins_current() {
        let mut playlist = Playlist::with_tracks(tracks(10), 4, PlayMode::Sequential);
        playlist.set_mode(PlayMode::Shuffle);
        assert_eq!(playlist.shuffle_order()[0], 4);
        assert_eq!(playlist.shuffle_cursor(), 0);
        assert_eq!(playlist.current_index(), 4);

        playlist.set_mode(PlayMode::Sequential);
        assert!(playlist.shuffle_order().is_empty());
    }

    #[test]
    fn test_shuffle_previous_at_first_slot_keeps_current() {
        let mut playlist = Playlist::with_tracks(tracks(5), 3, PlayMode::Shuffle);
        assert_eq!(playlist.step_back(), Some(3));
        assert!(!playlist.has_previous());
    }

    #[test]
    fn test_shuffle_back_and_forth() {
        let mut playlist = Playlist::with_tracks(tracks(5), 0, PlayMode::Shuffle);
        let second = playlist.step_forward().unwrap();
        let third = playlist.step_forward().unwrap();
        assert_eq!(playlist.step_back(), Some(second));
        assert_eq!(playlist.step_forward(), Some(third));
    }

    #[test]
    fn test_shuffle_exhaustion_reshuffles() {
        let mut playlist = Playlist::with_tracks(tracks(4), 0, PlayMode::Shuffle);
        for _ in 0..3 {
            playlist.step_forward();
        }
        assert!(!playlist.has_next());

        let index = playlist.step_forward().unwrap();
        assert_eq!(playlist.shuffle_cursor(), 0);
        assert_eq!(playlist.shuffle_order()[0], index);
        let unique: HashSet<_> = playlist.shuffle_order().iter().collect();
        assert_eq!(unique.len(), 4);
    }

    #[test]
    fn test_select_moves_shuffle_cursor() {
        let mut playlist = Playlist::with_tracks(tracks(6), 0, PlayMode::Shuffle);
        playlist.select(5).unwrap();
        let cursor = playlist.shuffle_cursor();
        assert_eq!(playlist.shuffle_order()[cursor], 5);
    }

    #[test]
    fn test_has_next_and_previous_sequential() {
        let playlist = Playlist::with_tracks(tracks(3), 0, PlayMode::Sequential);
        assert!(!playlist.has_previous());
        assert!(playlist.has_next());

        let playlist = Playlist::with_tracks(tracks(3), 2, PlayMode::Sequential);
        assert!(playlist.has_previous());
        assert!(!playlist.has_next());
    }
}

/// Property-based tests using proptest
#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn tracks(n: usize) -> Vec<Track> {
        (0..n as u64).map(|i| Track::new(i + 100, "t")).collect()
    }

    fn is_permutation(order: &[usize], len: usize) -> bool {
        let mut sorted = order.to_vec();
        sorted.sort_unstable();
        sorted == (0..len).collect::<Vec<_>>()
    }

    fn invariant_holds(playlist: &Playlist) -> bool {
        if playlist.is_empty() {
            return playlist.current_index() == 0;
        }
        if playlist.current_index() >= playlist.len() {
            return false;
        }
        if playlist.mode() != PlayMode::Shuffle {
            return true;
        }
        is_permutation(playlist.shuffle_order(), playlist.len())
            && playlist.shuffle_order()[playlist.shuffle_cursor()] == playlist.current_index()
    }

    /// A mutation applied to a playlist under test.
    #[derive(Debug, Clone)]
    enum Op {
        Next,
        Previous,
        Add(u64),
        Remove(usize),
        Mode(u8),
        Select(usize),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            Just(Op::Next),
            Just(Op::Previous),
            (0u64..40).prop_map(Op::Add),
            (0usize..40).prop_map(Op::Remove),
            (0u8..3).prop_map(Op::Mode),
            (0usize..40).prop_map(Op::Select),
        ]
    }

    fn mode(n: u8) -> PlayMode {
        match n {
            0 => PlayMode::Sequential,
            1 => PlayMode::RepeatOne,
            _ => PlayMode::Shuffle,
        }
    }

    proptest! {
        /// From any start, the current track plus len-1 forward steps visit
        /// every track exactly once
        #[test]
        fn shuffle_visits_each_track_once(len in 1usize..40, start in 0usize..40) {
            let start = start % len;
            let mut playlist = Playlist::with_tracks(tracks(len), start, PlayMode::Shuffle);

            let mut visited = vec![playlist.current_index()];
            for _ in 1..len {
                visited.push(playlist.step_forward().unwrap());
            }
            prop_assert!(is_permutation(&visited, len), "visited: {:?}", visited);
        }

        /// Index and permutation invariants hold after any operation sequence
        #[test]
        fn invariants_hold_after_operations(
            len in 0usize..20,
            initial_mode in 0u8..3,
            ops in prop::collection::vec(op(), 0..50),
        ) {
            let mut playlist = Playlist::with_tracks(tracks(len), 0, mode(initial_mode));
            prop_assert!(invariant_holds(&playlist));

            for op in ops {
                match op.clone() {
                    Op::Next => { playlist.step_forward(); }
                    Op::Previous => { playlist.step_back(); }
                    Op::Add(id) => { playlist.add(Track::new(id, "x")); }
                    Op::Remove(index) => { playlist.remove(index); }
                    Op::Mode(m) => playlist.set_mode(mode(m)),
                    Op::Select(index) => { playlist.select(index); }
                }
                prop_assert!(invariant_holds(&playlist), "after {:?}: {:?}", op, playlist);
            }
        }

        /// Sequential forward steps wrap around to the start
        #[test]
        fn sequential_full_cycle_returns_to_start(len in 1usize..30, start in 0usize..30) {
            let start = start % len;
            let mut playlist = Playlist::with_tracks(tracks(len), start, PlayMode::Sequential);
            for _ in 0..len {
                playlist.step_forward();
            }
            prop_assert_eq!(playlist.current_index(), start);
        }
    }
}
