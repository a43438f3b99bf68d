//! HTTP client for a NetEase-compatible API server.
//!
//! ## Server quirks
//!
//! - The HTTP status often mirrors the body `code` (a wrong password comes
//!   back as HTTP 502 with a JSON body). Bodies are therefore parsed
//!   regardless of status; only a non-JSON body turns into [`ApiError::Http`].
//! - Authentication travels as a `cookie` query parameter, read from the
//!   persisted session snapshot on every request.
//! - Responses are cached server-side unless a `timestamp` parameter is sent.
//! - A body `code` of 301 anywhere means the session is gone: the stored
//!   session is cleared, [`SessionExpiry`] subscribers are notified and the
//!   call fails with [`ApiError::SessionExpired`].

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use reqwest::{Method, header};
use serde_json::Value;

use super::adapter;
use super::domain::{
    AccountStatus, ApiError, AudioQuality, Credentials, LoginResponse, QrCheck, QrImage,
    UserPlaylist,
};
use super::expiry::SessionExpiry;
use crate::config::ApiConfig;
use crate::model::{Lyric, Track};
use crate::session::SessionSnapshot;
use crate::storage::KeyValueStore;

/// Public fallback renderer for QR codes when the server sends no image.
const QR_RENDER_URL: &str = "https://api.qrserver.com/v1/create-qr-code/?size=200x200&data=";

/// Playlists fetched per user library refresh.
const PLAYLIST_PAGE_SIZE: u32 = 30;

/// Default API server.
pub const DEFAULT_BASE_URL: &str = "http://139.9.223.233:3000/";

/// Account endpoint of the official service, queried directly.
pub const OFFICIAL_STATUS_URL: &str = "https://music.163.com/api/nuser/account/get";

/// NetEase API client
pub struct NeteaseClient {
    http_client: reqwest::Client,
    base_url: String,
    official_status_url: String,
    store: Arc<dyn KeyValueStore>,
    expiry: SessionExpiry,
}

impl NeteaseClient {
    /// Create a client from configuration.
    ///
    /// The client is configured to:
    /// - Accept gzip-compressed responses
    /// - Time out after `timeout_secs`
    /// - Send a User-Agent header identifying the application
    pub fn new(config: &ApiConfig, store: Arc<dyn KeyValueStore>) -> Result<Self, ApiError> {
        let http_client = reqwest::Client::builder()
            .gzip(true)
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .build()
            .map_err(|e| ApiError::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: config.base_url.clone(),
            official_status_url: config.official_status_url.clone(),
            store,
            expiry: SessionExpiry::new(),
        })
    }

    /// Create a client for testing with a custom base URL
    #[cfg(test)]
    pub fn with_base_url(base_url: impl Into<String>, store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            base_url: base_url.into(),
            official_status_url: OFFICIAL_STATUS_URL.to_string(),
            store,
            expiry: SessionExpiry::new(),
        }
    }

    /// Signal raised whenever a response reports an expired session.
    pub fn session_expiry(&self) -> &SessionExpiry {
        &self.expiry
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn cookie(&self) -> Option<String> {
        SessionSnapshot::load(self.store.as_ref())
            .and_then(|s| s.cookie)
            .filter(|c| !c.is_empty())
    }

    /// Build the query for a request: caller params plus timestamp and cookie.
    fn query(&self, params: &[(&str, String)]) -> Vec<(String, String)> {
        let mut query: Vec<(String, String)> = params
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        query.push((
            "timestamp".to_string(),
            Utc::now().timestamp_millis().to_string(),
        ));
        if let Some(cookie) = self.cookie() {
            query.push(("cookie".to_string(), cookie));
        }
        query
    }

    /// Send a request and return the parsed JSON body.
    async fn request(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<Value, ApiError> {
        let url = self.endpoint(path);
        let query = self.query(params);

        let builder = if method == Method::POST {
            self.http_client.post(&url).form(&query)
        } else {
            self.http_client.request(method, &url).query(&query)
        };

        let response = builder
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let body = self.read_body(response).await?;
        self.check_session(&body)?;
        Ok(body)
    }

    async fn read_body(&self, response: reqwest::Response) -> Result<Value, ApiError> {
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        match serde_json::from_str::<Value>(&text) {
            Ok(body) => Ok(body),
            Err(_) if !status.is_success() => Err(ApiError::Http {
                status: status.as_u16(),
            }),
            Err(e) => Err(ApiError::Parse(e.to_string())),
        }
    }

    /// Code 301 invalidates the session, stored and in memory.
    fn check_session(&self, body: &Value) -> Result<(), ApiError> {
        if adapter::body_code(body) == Some(301) {
            tracing::warn!("Server reported an expired session, clearing stored session");
            SessionSnapshot::clear(self.store.as_ref());
            self.expiry.notify();
            return Err(ApiError::SessionExpired);
        }
        Ok(())
    }

    async fn get(&self, path: &str, params: &[(&str, String)]) -> Result<Value, ApiError> {
        self.request(Method::GET, path, params).await
    }

    pub async fn login(&self, credentials: &Credentials) -> Result<LoginResponse, ApiError> {
        let (path, params) = match credentials {
            Credentials::Phone {
                phone,
                password,
                country_code,
                captcha,
            } => {
                let mut params = vec![
                    ("phone", phone.clone()),
                    ("password", password.clone()),
                    ("countrycode", country_code.clone()),
                ];
                if let Some(captcha) = captcha {
                    params.push(("captcha", captcha.clone()));
                }
                ("/login/cellphone", params)
            }
            Credentials::Email {
                email,
                password,
                captcha,
            } => {
                let mut params = vec![("email", email.clone()), ("password", password.clone())];
                if let Some(captcha) = captcha {
                    params.push(("captcha", captcha.clone()));
                }
                ("/login", params)
            }
        };

        let body = self.request(Method::POST, path, &params).await?;
        adapter::to_login_response(body)
    }

    pub async fn qr_key(&self) -> Result<String, ApiError> {
        let body = self.get("/login/qr/key", &[]).await?;
        adapter::to_qr_key(body)
    }

    /// QR code for `key`. Falls back to an external renderer when the
    /// server only returns the login URL.
    pub async fn qr_create(&self, key: &str) -> Result<QrImage, ApiError> {
        let body = self
            .get(
                "/login/qr/create",
                &[("key", key.to_string()), ("qrimg", "true".to_string())],
            )
            .await?;
        let mut image = adapter::to_qr_image(body)?;
        if image.qr_image.is_none() {
            image.qr_image = image
                .qr_url
                .as_deref()
                .map(|url| format!("{}{}", QR_RENDER_URL, urlencoding::encode(url)));
        }
        Ok(image)
    }

    pub async fn qr_check(&self, key: &str) -> Result<QrCheck, ApiError> {
        let body = self
            .get("/login/qr/check", &[("key", key.to_string())])
            .await?;
        adapter::to_qr_check(body)
    }

    pub async fn login_status(&self) -> Result<AccountStatus, ApiError> {
        let body = self.request(Method::POST, "/login/status", &[]).await?;
        adapter::to_login_status(body)
    }

    pub async fn user_account(&self) -> Result<AccountStatus, ApiError> {
        let body = self.get("/user/account", &[]).await?;
        adapter::to_account_status(body)
    }

    /// Ask the official service directly, with the stored cookie as a header.
    pub async fn official_account(&self) -> Result<AccountStatus, ApiError> {
        let mut request = self
            .http_client
            .get(&self.official_status_url)
            .header(header::REFERER, "https://music.163.com/");
        if let Some(cookie) = self.cookie() {
            request = request.header(header::COOKIE, cookie);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Http {
                status: status.as_u16(),
            });
        }

        let body = self.read_body(response).await?;
        adapter::to_account_status(body)
    }

    /// Returns the body code of the refresh call.
    pub async fn refresh_login(&self) -> Result<i64, ApiError> {
        let body = self.request(Method::POST, "/login/refresh", &[]).await?;
        adapter::body_code(&body).ok_or_else(|| ApiError::Parse("response has no code".into()))
    }

    pub async fn logout(&self) -> Result<(), ApiError> {
        self.request(Method::POST, "/logout", &[]).await.map(|_| ())
    }

    pub async fn user_detail(&self, uid: u64) -> Result<Value, ApiError> {
        let body = self.get("/user/detail", &[("uid", uid.to_string())]).await?;
        adapter::to_user_detail(body)
    }

    pub async fn user_playlists(&self, uid: u64) -> Result<Vec<UserPlaylist>, ApiError> {
        let body = self
            .get(
                "/user/playlist",
                &[
                    ("uid", uid.to_string()),
                    ("limit", PLAYLIST_PAGE_SIZE.to_string()),
                    ("offset", "0".to_string()),
                ],
            )
            .await?;
        adapter::to_user_playlists(body)
    }

    pub async fn liked_ids(&self, uid: u64) -> Result<Vec<u64>, ApiError> {
        let body = self.get("/likelist", &[("uid", uid.to_string())]).await?;
        adapter::to_liked_ids(body)
    }

    pub async fn song_url(&self, id: u64, quality: AudioQuality) -> Result<Option<String>, ApiError> {
        let body = self
            .get(
                "/song/url",
                &[("id", id.to_string()), ("br", quality.bitrate().to_string())],
            )
            .await?;
        adapter::to_song_url(body, id)
    }

    pub async fn lyric(&self, id: u64) -> Result<Lyric, ApiError> {
        let body = self.get("/lyric", &[("id", id.to_string())]).await?;
        adapter::to_lyric(body)
    }

    pub async fn search(
        &self,
        keywords: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Track>, ApiError> {
        let body = self
            .get(
                "/search",
                &[
                    ("keywords", keywords.to_string()),
                    ("limit", limit.to_string()),
                    ("offset", offset.to_string()),
                ],
            )
            .await?;
        adapter::to_tracks(body)
    }
}
