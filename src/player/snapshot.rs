//! Persisted player state.

use serde::{Deserialize, Serialize};

use super::history::{HistoryEntry, MAX_HISTORY};
use super::playlist::PlayMode;
use super::state::{DEFAULT_VOLUME, clamp_volume};
use crate::model::Track;
use crate::storage::{KeyValueStore, PLAYER_STATE_KEY, StorageError};

fn default_volume() -> f32 {
    DEFAULT_VOLUME
}

/// Everything restored across restarts. Every field is optional on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerSnapshot {
    pub current_track: Option<Track>,
    pub playlist: Vec<Track>,
    pub current_index: usize,
    pub mode: PlayMode,
    #[serde(default = "default_volume")]
    pub volume: f32,
    pub muted: bool,
    pub history: Vec<HistoryEntry>,
}

impl Default for PlayerSnapshot {
    fn default() -> Self {
        Self {
            current_track: None,
            playlist: Vec::new(),
            current_index: 0,
            mode: PlayMode::Sequential,
            volume: DEFAULT_VOLUME,
            muted: false,
            history: Vec::new(),
        }
    }
}

impl PlayerSnapshot {
    /// Read the snapshot. Missing or malformed data yields defaults.
    pub fn load(store: &dyn KeyValueStore) -> Self {
        let Some(raw) = store.get(PLAYER_STATE_KEY) else {
            return Self::default();
        };

        match serde_json::from_str::<PlayerSnapshot>(&raw) {
            Ok(snapshot) => snapshot.sanitized(),
            Err(e) => {
                tracing::warn!("Discarding malformed player state: {}", e);
                Self::default()
            }
        }
    }

    pub fn save(&self, store: &dyn KeyValueStore) -> Result<(), StorageError> {
        let json = serde_json::to_string(self)?;
        store.set(PLAYER_STATE_KEY, &json)
    }

    /// Clamp index and volume, bound the history.
    fn sanitized(mut self) -> Self {
        if self.current_index >= self.playlist.len() {
            self.current_index = 0;
        }
        self.volume = clamp_volume(self.volume);
        self.history.truncate(MAX_HISTORY);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn test_missing_snapshot_is_default() {
        let store = MemoryStore::new();
        let snapshot = PlayerSnapshot::load(&store);
        assert_eq!(snapshot, PlayerSnapshot::default());
        assert_eq!(snapshot.volume, 0.8);
    }

    #[test]
    fn test_partial_snapshot_fills_defaults() {
        let store = MemoryStore::new();
        store.set(PLAYER_STATE_KEY, r#"{"mode":"shuffle"}"#).unwrap();

        let snapshot = PlayerSnapshot::load(&store);
        assert_eq!(snapshot.mode, PlayMode::Shuffle);
        assert_eq!(snapshot.volume, 0.8);
        assert!(snapshot.playlist.is_empty());
    }

    #[test]
    fn test_malformed_snapshot_is_default() {
        let store = MemoryStore::new();
        store.set(PLAYER_STATE_KEY, "{not json").unwrap();
        assert_eq!(PlayerSnapshot::load(&store), PlayerSnapshot::default());

        store.set(PLAYER_STATE_KEY, r#"{"volume":"loud"}"#).unwrap();
        assert_eq!(PlayerSnapshot::load(&store), PlayerSnapshot::default());
    }

    #[test]
    fn test_out_of_range_values_are_clamped() {
        let store = MemoryStore::new();
        store
            .set(
                PLAYER_STATE_KEY,
                r#"{"playlist":[{"id":1},{"id":2}],"current_index":9,"volume":3.0}"#,
            )
            .unwrap();

        let snapshot = PlayerSnapshot::load(&store);
        assert_eq!(snapshot.current_index, 0);
        assert_eq!(snapshot.volume, 1.0);
    }

    #[test]
    fn test_history_truncated_on_load() {
        let store = MemoryStore::new();
        let snapshot = PlayerSnapshot {
            history: (0..150)
                .map(|id| HistoryEntry {
                    track: Track::new(id, "t"),
                    played_at: 0,
                })
                .collect(),
            ..Default::default()
        };
        snapshot.save(&store).unwrap();

        assert_eq!(PlayerSnapshot::load(&store).history.len(), MAX_HISTORY);
    }
}
