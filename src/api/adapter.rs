//! Adapter layer: Convert response DTOs to domain models
//!
//! This is the ONLY place where DTO types are converted to domain types.
//! If the server changes its response format, only this file and dto.rs
//! need to change.

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::domain::{AccountStatus, ApiError, LoginResponse, QrCheck, QrImage, UserPlaylist};
use super::dto;
use crate::model::{Lyric, Track};

/// Top-level `code` field of a response body, if any.
pub fn body_code(body: &Value) -> Option<i64> {
    body.get("code").and_then(Value::as_i64)
}

/// Human-readable message of a response body (`message` or `msg`).
pub fn body_message(body: &Value) -> Option<String> {
    body.get("message")
        .or_else(|| body.get("msg"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn decode<T: DeserializeOwned>(body: Value) -> Result<T, ApiError> {
    serde_json::from_value(body).map_err(|e| ApiError::Parse(e.to_string()))
}

/// Reject any non-200 body for endpoints that only carry data on success.
fn ensure_ok(body: &Value) -> Result<(), ApiError> {
    match body_code(body) {
        Some(200) => Ok(()),
        Some(code) => Err(ApiError::Api {
            code,
            message: body_message(body).unwrap_or_else(|| "request failed".to_string()),
        }),
        None => Err(ApiError::Parse("response has no code".to_string())),
    }
}

/// Login answers are passed through whatever their code.
pub fn to_login_response(body: Value) -> Result<LoginResponse, ApiError> {
    let dto: dto::LoginBody = decode(body)?;
    Ok(LoginResponse {
        code: dto.code,
        cookie: dto.cookie.filter(|c| !c.is_empty()),
        account: dto.account.filter(|a| !a.is_null()),
        profile: dto.profile.filter(|p| !p.is_null()),
        message: dto.message.or(dto.msg),
    })
}

pub fn to_qr_key(body: Value) -> Result<String, ApiError> {
    ensure_ok(&body)?;
    let dto: dto::QrKeyBody = decode(body)?;
    dto.data
        .map(|d| d.unikey)
        .filter(|k| !k.is_empty())
        .ok_or_else(|| ApiError::Parse("missing unikey".to_string()))
}

pub fn to_qr_image(body: Value) -> Result<QrImage, ApiError> {
    ensure_ok(&body)?;
    let dto: dto::QrCreateBody = decode(body)?;
    let data = dto.data.unwrap_or_default();
    Ok(QrImage {
        qr_image: data.qrimg.filter(|s| !s.is_empty()),
        qr_url: data.qrurl.filter(|s| !s.is_empty()),
    })
}

pub fn to_qr_check(body: Value) -> Result<QrCheck, ApiError> {
    let dto: dto::QrCheckBody = decode(body)?;
    Ok(QrCheck {
        code: dto.code,
        cookie: dto.cookie.filter(|c| !c.is_empty()),
        message: dto.message,
    })
}

fn from_account_body(dto: dto::AccountBody) -> AccountStatus {
    AccountStatus {
        code: dto.code,
        account: dto.account.filter(|a| !a.is_null()),
        profile: dto.profile.filter(|p| !p.is_null()),
    }
}

/// `/user/account` and the official endpoint.
pub fn to_account_status(body: Value) -> Result<AccountStatus, ApiError> {
    decode(body).map(from_account_body)
}

/// `/login/status`, whose answer is nested under `data`.
pub fn to_login_status(body: Value) -> Result<AccountStatus, ApiError> {
    let dto: dto::LoginStatusBody = decode(body)?;
    dto.data
        .map(from_account_body)
        .ok_or_else(|| ApiError::Parse("login status has no data".to_string()))
}

pub fn to_user_playlists(body: Value) -> Result<Vec<UserPlaylist>, ApiError> {
    ensure_ok(&body)?;
    let dto: dto::UserPlaylistBody = decode(body)?;
    Ok(dto
        .playlist
        .into_iter()
        .map(|p| UserPlaylist {
            id: p.id,
            name: p.name,
            owner_id: p.user_id,
            track_count: p.track_count,
        })
        .collect())
}

/// `/user/detail` is kept opaque.
pub fn to_user_detail(body: Value) -> Result<Value, ApiError> {
    ensure_ok(&body)?;
    Ok(body)
}

pub fn to_liked_ids(body: Value) -> Result<Vec<u64>, ApiError> {
    ensure_ok(&body)?;
    let dto: dto::LikeListBody = decode(body)?;
    Ok(dto.ids)
}

/// Stream URL for `id`. `None` when the track is not playable.
pub fn to_song_url(body: Value, id: u64) -> Result<Option<String>, ApiError> {
    ensure_ok(&body)?;
    let dto: dto::SongUrlBody = decode(body)?;
    let entry = dto
        .data
        .iter()
        .find(|e| e.id == id)
        .or_else(|| dto.data.first());
    Ok(entry
        .and_then(|e| e.url.clone())
        .filter(|url| !url.is_empty()))
}

pub fn to_lyric(body: Value) -> Result<Lyric, ApiError> {
    ensure_ok(&body)?;
    let dto: dto::LyricBody = decode(body)?;
    Ok(Lyric {
        lrc: dto.lrc.and_then(|l| l.lyric).filter(|s| !s.is_empty()),
        translated: dto.tlyric.and_then(|l| l.lyric).filter(|s| !s.is_empty()),
    })
}

/// Search results as tracks. The full song object becomes the track metadata.
pub fn to_tracks(body: Value) -> Result<Vec<Track>, ApiError> {
    ensure_ok(&body)?;
    let dto: dto::SearchBody = decode(body)?;
    Ok(dto
        .result
        .unwrap_or_default()
        .songs
        .into_iter()
        .filter_map(song_to_track)
        .collect())
}

fn song_to_track(song: Value) -> Option<Track> {
    let id = song.get("id").and_then(Value::as_u64)?;
    let name = song
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    Some(Track::with_metadata(id, name, song))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_login_response_passes_error_codes() {
        let response =
            to_login_response(json!({ "code": 502, "msg": "wrong password" })).unwrap();
        assert_eq!(response.code, 502);
        assert_eq!(response.message.as_deref(), Some("wrong password"));
        assert!(response.cookie.is_none());
    }

    #[test]
    fn test_login_response_success() {
        let response = to_login_response(json!({
            "code": 200,
            "cookie": "MUSIC_U=abc;",
            "account": { "id": 1 },
            "profile": { "userId": 1, "nickname": "me" }
        }))
        .unwrap();
        assert_eq!(response.cookie.as_deref(), Some("MUSIC_U=abc;"));
        assert!(response.account.is_some());
    }

    #[test]
    fn test_ensure_ok_rejects_other_codes() {
        let err = to_liked_ids(json!({ "code": 400, "message": "bad" })).unwrap_err();
        assert_eq!(
            err,
            ApiError::Api {
                code: 400,
                message: "bad".to_string()
            }
        );
    }

    #[test]
    fn test_login_status_unwraps_data() {
        let status = to_login_status(json!({
            "data": { "code": 200, "account": null, "profile": null }
        }))
        .unwrap();
        assert_eq!(status.code, 200);
        assert!(status.account.is_none());
        assert!(!status.is_logged_in());
    }

    #[test]
    fn test_song_url_missing_is_none() {
        let url = to_song_url(json!({ "code": 200, "data": [{ "id": 3, "url": null }] }), 3)
            .unwrap();
        assert!(url.is_none());

        let url = to_song_url(
            json!({ "code": 200, "data": [{ "id": 3, "url": "http://x/3.mp3" }] }),
            3,
        )
        .unwrap();
        assert_eq!(url.as_deref(), Some("http://x/3.mp3"));
    }

    #[test]
    fn test_lyric_drops_empty_translation() {
        let lyric = to_lyric(json!({
            "code": 200,
            "lrc": { "lyric": "[00:00.00]la" },
            "tlyric": { "lyric": "" }
        }))
        .unwrap();
        assert_eq!(lyric.lrc.as_deref(), Some("[00:00.00]la"));
        assert!(lyric.translated.is_none());
    }

    #[test]
    fn test_search_songs_become_tracks() {
        let tracks = to_tracks(json!({
            "code": 200,
            "result": {
                "songs": [
                    { "id": 1, "name": "One", "ar": [{ "name": "Artist" }] },
                    { "name": "no id" }
                ],
                "songCount": 2
            }
        }))
        .unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].display_artist(), "Artist");
    }

    #[test]
    fn test_playlists_carry_owner() {
        let playlists = to_user_playlists(json!({
            "code": 200,
            "playlist": [{ "id": 10, "name": "Mine", "userId": 5, "trackCount": 3 }]
        }))
        .unwrap();
        assert_eq!(playlists[0].owner_id, 5);
    }
}
