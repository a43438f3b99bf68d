//! Test utilities and fixtures for neumusic tests.
//!
//! Common track factories and store helpers to reduce boilerplate.
//!
//! # Example
//!
//! ```ignore
//! use crate::test_utils::{mock_tracks, temp_store};
//!
//! #[test]
//! fn test_something() {
//!     let (store, _dir) = temp_store();
//!     let tracks = mock_tracks(3);
//!     // ... test logic
//! }
//! ```

use std::sync::Arc;

use serde_json::{Value, json};
use tempfile::TempDir;

use crate::model::Track;
use crate::storage::FileStore;

/// Creates a file-backed store in a temporary directory.
///
/// Keep the `TempDir` alive for the duration of your test.
pub fn temp_store() -> (Arc<FileStore>, TempDir) {
    let dir = tempfile::tempdir().expect("Failed to create temp directory");
    let store = Arc::new(FileStore::open(dir.path().join("store.json")));
    (store, dir)
}

/// Song JSON as the search and detail endpoints return it.
pub fn mock_song_json(id: u64, name: &str, artist: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "ar": [{ "id": id * 10, "name": artist }],
        "al": { "id": id * 100, "name": "Test Album", "picUrl": "http://img/cover.jpg" },
        "dt": 180_000
    })
}

/// A track with catalog metadata.
pub fn mock_track(id: u64) -> Track {
    let name = format!("Track {}", id);
    Track::with_metadata(id, name.clone(), mock_song_json(id, &name, "Test Artist"))
}

/// Tracks with IDs `1..=n`.
pub fn mock_tracks(n: u64) -> Vec<Track> {
    (1..=n).map(mock_track).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::KeyValueStore;

    #[test]
    fn test_temp_store_persists() {
        let (store, dir) = temp_store();
        store.set("k", "v").unwrap();

        let reopened = FileStore::open(dir.path().join("store.json"));
        assert_eq!(reopened.get("k").as_deref(), Some("v"));
    }

    #[test]
    fn test_mock_tracks() {
        let tracks = mock_tracks(3);
        assert_eq!(tracks.len(), 3);
        assert_eq!(tracks[0].id, 1);
        assert_eq!(tracks[2].display_title(), "Track 3");
        assert_eq!(tracks[0].display_artist(), "Test Artist");
    }
}
