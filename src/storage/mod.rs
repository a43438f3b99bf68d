//! Durable key-value storage for persisted snapshots.
//!
//! The player and the session each persist one JSON snapshot under their own
//! logical key. Storage only deals in strings; (de)serialization lives with
//! the owning component so a malformed entry can be discarded there.
//!
//! Two backends are provided:
//! - [`MemoryStore`] - process-local, used by tests and throwaway sessions
//! - [`FileStore`] - a single JSON object file in the user data directory

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

/// Key for the serialized [`crate::player::PlayerSnapshot`].
pub const PLAYER_STATE_KEY: &str = "player_state";

/// Key for the serialized [`crate::session::SessionSnapshot`].
pub const SESSION_KEY: &str = "session";

/// String-valued durable storage.
pub trait KeyValueStore: Send + Sync {
    /// Read an entry. Missing entries and unreadable backends both yield `None`.
    fn get(&self, key: &str) -> Option<String>;

    /// Write an entry, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove an entry. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries
            .write()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries.write().remove(key);
        Ok(())
    }
}

/// File-backed store.
///
/// All entries live in one JSON object. The whole object is cached in memory
/// and rewritten on every mutation (write to temp, then rename).
pub struct FileStore {
    path: PathBuf,
    entries: RwLock<HashMap<String, String>>,
}

impl FileStore {
    /// Open (or lazily create) a store at `path`.
    ///
    /// An unreadable or corrupt file starts the store empty; the file is
    /// replaced on the next write.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(map) => map,
                Err(e) => {
                    tracing::warn!("Discarding corrupt store file {:?}: {}", path, e);
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                tracing::warn!("Could not read store file {:?}: {}", path, e);
                HashMap::new()
            }
        };

        Self {
            path,
            entries: RwLock::new(entries),
        }
    }

    /// Open the store in the default location (user data directory).
    pub fn default_location() -> Result<Self, StorageError> {
        let dir = data_dir().ok_or(StorageError::NoDataDir)?;
        Ok(Self::open(dir.join("store.json")))
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, entries: &HashMap<String, String>) -> Result<(), StorageError> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| StorageError::Io(dir.to_path_buf(), e))?;
        }

        let contents = serde_json::to_string_pretty(entries)?;
        let temp_path = self.path.with_extension("json.tmp");
        std::fs::write(&temp_path, contents).map_err(|e| StorageError::Io(temp_path.clone(), e))?;
        std::fs::rename(&temp_path, &self.path)
            .map_err(|e| StorageError::Io(self.path.clone(), e))?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.write();
        entries.insert(key.to_string(), value.to_string());
        self.flush(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.write();
        if entries.remove(key).is_some() {
            self.flush(&entries)?;
        }
        Ok(())
    }
}

/// Get the application data directory.
pub fn data_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|d| d.join("neumusic"))
}

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Could not determine data directory")]
    NoDataDir,

    #[error("Storage I/O error at {0}: {1}")]
    Io(PathBuf, std::io::Error),

    #[error("Failed to serialize store: {0}")]
    Serialize(#[from] serde_json::Error),
}
