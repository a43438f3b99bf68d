//! Trait definition for the music service API.
//!
//! The player and the session reconciler depend on [`MusicApi`] rather than
//! the HTTP client, so tests can substitute the scripted mock below.

use async_trait::async_trait;
use serde_json::Value;

use super::client::NeteaseClient;
use super::domain::{
    AccountStatus, ApiError, AudioQuality, Credentials, LoginResponse, QrCheck, QrImage,
    UserPlaylist,
};
use super::expiry::SessionExpiry;
use crate::model::{Lyric, Track};

/// Operations consumed from the music service.
///
/// Implement this trait to create mock implementations for testing.
#[async_trait]
pub trait MusicApi: Send + Sync {
    async fn login(&self, credentials: &Credentials) -> Result<LoginResponse, ApiError>;

    async fn qr_key(&self) -> Result<String, ApiError>;

    async fn qr_create(&self, key: &str) -> Result<QrImage, ApiError>;

    async fn qr_check(&self, key: &str) -> Result<QrCheck, ApiError>;

    async fn login_status(&self) -> Result<AccountStatus, ApiError>;

    async fn user_account(&self) -> Result<AccountStatus, ApiError>;

    /// Account status as reported by the official service itself.
    async fn official_account(&self) -> Result<AccountStatus, ApiError>;

    /// Extend the session server-side. Returns the body code.
    async fn refresh_login(&self) -> Result<i64, ApiError>;

    async fn logout(&self) -> Result<(), ApiError>;

    async fn user_detail(&self, uid: u64) -> Result<Value, ApiError>;

    async fn user_playlists(&self, uid: u64) -> Result<Vec<UserPlaylist>, ApiError>;

    async fn liked_ids(&self, uid: u64) -> Result<Vec<u64>, ApiError>;

    /// Stream URL. `Ok(None)` means the track cannot be played.
    async fn song_url(&self, id: u64, quality: AudioQuality) -> Result<Option<String>, ApiError>;

    async fn lyric(&self, id: u64) -> Result<Lyric, ApiError>;

    async fn search(&self, keywords: &str, limit: u32, offset: u32)
    -> Result<Vec<Track>, ApiError>;

    /// Raised whenever any call finds the session rejected.
    fn session_expiry(&self) -> &SessionExpiry;
}

#[async_trait]
impl MusicApi for NeteaseClient {
    async fn login(&self, credentials: &Credentials) -> Result<LoginResponse, ApiError> {
        self.login(credentials).await
    }

    async fn qr_key(&self) -> Result<String, ApiError> {
        self.qr_key().await
    }

    async fn qr_create(&self, key: &str) -> Result<QrImage, ApiError> {
        self.qr_create(key).await
    }

    async fn qr_check(&self, key: &str) -> Result<QrCheck, ApiError> {
        self.qr_check(key).await
    }

    async fn login_status(&self) -> Result<AccountStatus, ApiError> {
        self.login_status().await
    }

    async fn user_account(&self) -> Result<AccountStatus, ApiError> {
        self.user_account().await
    }

    async fn official_account(&self) -> Result<AccountStatus, ApiError> {
        self.official_account().await
    }

    async fn refresh_login(&self) -> Result<i64, ApiError> {
        self.refresh_login().await
    }

    async fn logout(&self) -> Result<(), ApiError> {
        self.logout().await
    }

    async fn user_detail(&self, uid: u64) -> Result<Value, ApiError> {
        self.user_detail(uid).await
    }

    async fn user_playlists(&self, uid: u64) -> Result<Vec<UserPlaylist>, ApiError> {
        self.user_playlists(uid).await
    }

    async fn liked_ids(&self, uid: u64) -> Result<Vec<u64>, ApiError> {
        self.liked_ids(uid).await
    }

    async fn song_url(&self, id: u64, quality: AudioQuality) -> Result<Option<String>, ApiError> {
        self.song_url(id, quality).await
    }

    async fn lyric(&self, id: u64) -> Result<Lyric, ApiError> {
        self.lyric(id).await
    }

    async fn search(
        &self,
        keywords: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Track>, ApiError> {
        self.search(keywords, limit, offset).await
    }

    fn session_expiry(&self) -> &SessionExpiry {
        self.session_expiry()
    }
}
