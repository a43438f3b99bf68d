//! Recently played tracks.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::model::Track;

/// Maximum number of entries kept.
pub const MAX_HISTORY: usize = 100;

/// Default number of entries returned by [`History::recent`].
pub const DEFAULT_RECENT: usize = 20;

/// A played track with its timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub track: Track,
    /// Milliseconds since the Unix epoch
    #[serde(default)]
    pub played_at: i64,
}

/// Most-recent-first play history, one entry per track.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct History {
    entries: Vec<HistoryEntry>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from persisted entries, dropping duplicates and overflow.
    pub fn from_entries(entries: Vec<HistoryEntry>) -> Self {
        let mut history = Self::new();
        for entry in entries.into_iter().rev() {
            history.push_front(entry);
        }
        history
    }

    /// Record a play now.
    pub fn record(&mut self, track: &Track) {
        self.push_front(HistoryEntry {
            track: track.clone(),
            played_at: Utc::now().timestamp_millis(),
        });
    }

    fn push_front(&mut self, entry: HistoryEntry) {
        self.entries.retain(|e| e.track.id != entry.track.id);
        self.entries.insert(0, entry);
        self.entries.truncate(MAX_HISTORY);
    }

    /// The `limit` most recent entries.
    pub fn recent(&self, limit: usize) -> &[HistoryEntry] {
        &self.entries[..limit.min(self.entries.len())]
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
