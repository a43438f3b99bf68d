//! In-memory session state.

use std::collections::HashSet;

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use super::snapshot::SessionSnapshot;
use crate::api::UserPlaylist;

/// The logged-in user's library, refreshed in the background.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserLibrary {
    pub detail: Option<Value>,
    /// Playlists the user created
    pub created_playlists: Vec<UserPlaylist>,
    /// Playlists the user subscribed to
    pub subscribed_playlists: Vec<UserPlaylist>,
    pub liked_ids: HashSet<u64>,
}

/// Authoritative local view of the session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub is_logged_in: bool,
    pub cookie: Option<String>,
    pub account: Option<Value>,
    pub profile: Option<Value>,
    pub last_verified_at: Option<DateTime<Utc>>,
    pub library: UserLibrary,
    /// Bumped whenever a session is adopted or cleared
    pub epoch: u64,
}

impl SessionState {
    /// User ID from the profile, falling back to the account.
    pub fn user_id(&self) -> Option<u64> {
        self.profile
            .as_ref()
            .and_then(|p| p.get("userId"))
            .and_then(Value::as_u64)
            .or_else(|| {
                self.account
                    .as_ref()
                    .and_then(|a| a.get("id"))
                    .and_then(Value::as_u64)
            })
    }

    pub fn nickname(&self) -> Option<&str> {
        self.profile
            .as_ref()
            .and_then(|p| p.get("nickname"))
            .and_then(Value::as_str)
    }

    pub fn avatar_url(&self) -> Option<&str> {
        self.profile
            .as_ref()
            .and_then(|p| p.get("avatarUrl"))
            .and_then(Value::as_str)
    }

    pub fn to_snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            cookie: self.cookie.clone(),
            account: self.account.clone(),
            profile: self.profile.clone(),
            last_verified_at: self.last_verified_at.map(|t| t.timestamp_millis()),
        }
    }

    /// Populate from a stored session. The epoch is left to the caller.
    pub fn load_snapshot(&mut self, snapshot: SessionSnapshot) {
        self.is_logged_in = true;
        self.cookie = snapshot.cookie;
        self.account = snapshot.account;
        self.profile = snapshot.profile;
        self.last_verified_at = snapshot
            .last_verified_at
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single());
        self.library = UserLibrary::default();
    }

    /// Forget everything except the epoch, which is bumped.
    pub fn reset(&mut self) {
        let epoch = self.epoch + 1;
        *self = Self {
            epoch,
            ..Self::default()
        };
    }
}
