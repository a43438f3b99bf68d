//! Wire-format Data Transfer Objects.
//!
//! These types match what the NetEase-compatible API server returns.
//! DO NOT use these types outside the api module - convert to domain types.
//!
//! The server is loose about which fields are present, so everything not
//! strictly required is `#[serde(default)]`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `/login/cellphone`, `/login`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoginBody {
    pub code: i64,
    #[serde(default)]
    pub cookie: Option<String>,
    #[serde(default)]
    pub account: Option<Value>,
    #[serde(default)]
    pub profile: Option<Value>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub msg: Option<String>,
}

/// `/login/qr/key`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QrKeyBody {
    pub code: i64,
    #[serde(default)]
    pub data: Option<QrKeyData>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QrKeyData {
    pub unikey: String,
}

/// `/login/qr/create`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QrCreateBody {
    pub code: i64,
    #[serde(default)]
    pub data: Option<QrCreateData>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct QrCreateData {
    #[serde(default)]
    pub qrimg: Option<String>,
    #[serde(default)]
    pub qrurl: Option<String>,
}

/// `/login/qr/check`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QrCheckBody {
    pub code: i64,
    #[serde(default)]
    pub cookie: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// `/user/account` and the official `nuser/account/get` endpoint
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccountBody {
    pub code: i64,
    #[serde(default)]
    pub account: Option<Value>,
    #[serde(default)]
    pub profile: Option<Value>,
}

/// `/login/status` wraps the account answer in `data`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoginStatusBody {
    #[serde(default)]
    pub data: Option<AccountBody>,
}

/// `/user/playlist`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UserPlaylistBody {
    pub code: i64,
    #[serde(default)]
    pub playlist: Vec<PlaylistEntry>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistEntry {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub user_id: u64,
    #[serde(default)]
    pub track_count: u32,
}

/// `/likelist`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LikeListBody {
    pub code: i64,
    #[serde(default)]
    pub ids: Vec<u64>,
}

/// `/song/url`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SongUrlBody {
    pub code: i64,
    #[serde(default)]
    pub data: Vec<SongUrlEntry>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SongUrlEntry {
    pub id: u64,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub br: Option<u64>,
}

/// `/lyric`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LyricBody {
    pub code: i64,
    #[serde(default)]
    pub lrc: Option<LyricText>,
    #[serde(default)]
    pub tlyric: Option<LyricText>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LyricText {
    #[serde(default)]
    pub lyric: Option<String>,
}

/// `/search`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchBody {
    pub code: i64,
    #[serde(default)]
    pub result: Option<SearchResult>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    #[serde(default)]
    pub songs: Vec<Value>,
    #[serde(default)]
    pub song_count: u64,
}
