//! Persisted session.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::storage::{KeyValueStore, SESSION_KEY, StorageError};

/// What survives a restart: the cookie plus the cached account payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSnapshot {
    pub cookie: Option<String>,
    pub account: Option<Value>,
    pub profile: Option<Value>,
    /// Milliseconds since the Unix epoch
    pub last_verified_at: Option<i64>,
}

impl SessionSnapshot {
    /// Read the stored session. Missing or malformed data yields `None`.
    pub fn load(store: &dyn KeyValueStore) -> Option<Self> {
        let raw = store.get(SESSION_KEY)?;
        match serde_json::from_str(&raw) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                tracing::warn!("Discarding malformed session: {}", e);
                None
            }
        }
    }

    pub fn save(&self, store: &dyn KeyValueStore) -> Result<(), StorageError> {
        let json = serde_json::to_string(self)?;
        store.set(SESSION_KEY, &json)
    }

    /// Remove the stored session. Failures are logged.
    pub fn clear(store: &dyn KeyValueStore) {
        if let Err(e) = store.remove(SESSION_KEY) {
            tracing::warn!("Failed to clear stored session: {}", e);
        }
    }

    /// Whether there is anything to restore.
    pub fn has_session(&self) -> bool {
        self.cookie.as_deref().is_some_and(|c| !c.is_empty()) || self.account.is_some()
    }
}
