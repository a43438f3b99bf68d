//! Core data models shared by the player and the API layer.
//!
//! Defines the primary entities: [`Track`] and [`Lyric`].
//! Catalog metadata (artists, album, cover) is kept as an opaque JSON blob
//! so whatever the service returns is passed through untouched.

use serde::{Deserialize, Serialize};

/// A playable track.
///
/// Immutable once fetched, except for the stream URL and lyric which are
/// filled in when resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Service track ID (identity)
    pub id: u64,
    /// Track title
    #[serde(default)]
    pub name: String,
    /// Opaque catalog metadata (artists, album, ...)
    #[serde(default)]
    pub metadata: serde_json::Value,
    /// Resolved stream URL
    #[serde(default)]
    pub url: Option<String>,
    /// Resolved lyric payload
    #[serde(default)]
    pub lyric: Option<Lyric>,
}

impl Track {
    /// Create a track with no metadata.
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            metadata: serde_json::Value::Null,
            url: None,
            lyric: None,
        }
    }

    /// Create a track carrying catalog metadata.
    pub fn with_metadata(id: u64, name: impl Into<String>, metadata: serde_json::Value) -> Self {
        Self {
            metadata,
            ..Self::new(id, name)
        }
    }

    /// Whether two tracks refer to the same catalog entry.
    pub fn same_as(&self, other: &Track) -> bool {
        self.id == other.id
    }

    /// Display title.
    pub fn display_title(&self) -> &str {
        if self.name.is_empty() {
            "Unknown"
        } else {
            &self.name
        }
    }

    /// Display artist, joined from the metadata's `ar`/`artists` list.
    pub fn display_artist(&self) -> String {
        let artists = self
            .metadata
            .get("ar")
            .or_else(|| self.metadata.get("artists"))
            .and_then(|v| v.as_array());

        let names: Vec<&str> = artists
            .map(|list| {
                list.iter()
                    .filter_map(|a| a.get("name").and_then(|n| n.as_str()))
                    .collect()
            })
            .unwrap_or_default();

        if names.is_empty() {
            "Unknown Artist".to_string()
        } else {
            names.join(" / ")
        }
    }
}

/// Lyric payload for a track.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Lyric {
    /// Original lyric in LRC format
    #[serde(default)]
    pub lrc: Option<String>,
    /// Translated lyric in LRC format
    #[serde(default)]
    pub translated: Option<String>,
}

impl Lyric {
    /// True when neither original nor translation is present.
    pub fn is_empty(&self) -> bool {
        self.lrc.as_deref().is_none_or(str::is_empty)
            && self.translated.as_deref().is_none_or(str::is_empty)
    }
}
