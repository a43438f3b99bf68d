//! Internal domain models for the music service API.
//!
//! These are OUR types - they don't change when the wire format changes.
//! Raw responses are converted into these types by [`super::adapter`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Login credentials accepted by the service.
#[derive(Debug, Clone)]
pub enum Credentials {
    /// Cellphone + password login
    Phone {
        phone: String,
        password: String,
        /// Country calling code (default "86")
        country_code: String,
        /// Optional SMS captcha
        captcha: Option<String>,
    },
    /// E-mail + password login
    Email {
        email: String,
        password: String,
        captcha: Option<String>,
    },
}

impl Credentials {
    /// Phone login with the default country code.
    pub fn phone(phone: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Phone {
            phone: phone.into(),
            password: password.into(),
            country_code: "86".to_string(),
            captcha: None,
        }
    }

    /// E-mail login.
    pub fn email(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Email {
            email: email.into(),
            password: password.into(),
            captcha: None,
        }
    }
}

/// Response of a credential login call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoginResponse {
    /// Service result code (200 = success)
    pub code: i64,
    /// Session cookie string
    pub cookie: Option<String>,
    pub account: Option<Value>,
    pub profile: Option<Value>,
    pub message: Option<String>,
}

/// Account/login status answer, shared by every status endpoint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccountStatus {
    pub code: i64,
    pub account: Option<Value>,
    pub profile: Option<Value>,
}

impl AccountStatus {
    /// True when the answer reports a logged-in account.
    pub fn is_logged_in(&self) -> bool {
        self.code == 200 && self.account.as_ref().is_some_and(|a| !a.is_null())
    }
}

/// QR code data for out-of-band login.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QrImage {
    /// Base64 data URL of the rendered code
    pub qr_image: Option<String>,
    /// The login URL encoded in the code
    pub qr_url: Option<String>,
}

/// Raw QR check answer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QrCheck {
    pub code: i64,
    /// Cookie delivered once the login is confirmed
    pub cookie: Option<String>,
    pub message: Option<String>,
}

/// A playlist owned or subscribed by the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserPlaylist {
    pub id: u64,
    pub name: String,
    /// ID of the playlist's creator
    pub owner_id: u64,
    pub track_count: u32,
}

/// Stream quality requested from the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioQuality {
    #[default]
    Standard,
    High,
    Lossless,
}

impl AudioQuality {
    /// Bitrate sent as the `br` parameter.
    pub fn bitrate(self) -> u32 {
        match self {
            AudioQuality::Standard => 128_000,
            AudioQuality::High => 320_000,
            AudioQuality::Lossless => 999_000,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AudioQuality::Standard => "standard",
            AudioQuality::High => "high",
            AudioQuality::Lossless => "lossless",
        }
    }
}

/// Errors returned by the API boundary.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {status}")]
    Http { status: u16 },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// The service answered code 301: the session is no longer valid.
    #[error("Session expired, login required")]
    SessionExpired,

    #[error("API error {code}: {message}")]
    Api { code: i64, message: String },
}

impl ApiError {
    /// Numeric code carried by the error, -1 when there is none.
    pub fn code(&self) -> i64 {
        match self {
            ApiError::Http { status } => i64::from(*status),
            ApiError::SessionExpired => 301,
            ApiError::Api { code, .. } => *code,
            ApiError::Network(_) | ApiError::Parse(_) => -1,
        }
    }

    /// The service refused the session (codes 301, 400, 401).
    pub fn is_unauthenticated(&self) -> bool {
        is_unauthenticated_code(self.code())
    }

    /// Anything that does not prove the session invalid: transport errors,
    /// timeouts, 5xx and unexpected answers.
    pub fn is_transient(&self) -> bool {
        !self.is_unauthenticated()
    }
}

/// Codes that mean the session is no longer accepted.
pub const UNAUTHENTICATED_CODES: [i64; 3] = [301, 400, 401];

pub fn is_unauthenticated_code(code: i64) -> bool {
    UNAUTHENTICATED_CODES.contains(&code)
}
