//! Application-wide error types.
//!
//! Library modules use specific error types via `thiserror`, while
//! CLI/main uses `anyhow` for convenient error propagation.
//!
//! # Design
//!
//! - [`Error`]: Top-level application error enum
//! - Module-specific errors ([`ApiError`], [`PlayerError`], [`SessionError`],
//!   [`StorageError`], [`ConfigError`]) for detailed handling
//!
//! # Example
//!
//! ```ignore
//! use neumusic::error::{Result, ResultExt};
//!
//! fn open_client(config: &ApiConfig, store: Arc<dyn KeyValueStore>) -> Result<NeteaseClient> {
//!     NeteaseClient::new(config, store).with_context("creating API client")
//! }
//! ```

use crate::api::ApiError;
use crate::config::ConfigError;
use crate::player::PlayerError;
use crate::session::SessionError;
use crate::storage::StorageError;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level application error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Music service error
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Persistence error
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Playback error
    #[error("Playback error: {0}")]
    Player(#[from] PlayerError),

    /// Login/session error
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Add context to an error.
    pub fn context(self, ctx: impl Into<String>) -> Self {
        Self::WithContext {
            context: ctx.into(),
            source: Box::new(self),
        }
    }

    /// Whether the underlying cause is a rejected session.
    pub fn is_session_expired(&self) -> bool {
        match self {
            Error::Api(e) => e.is_unauthenticated(),
            Error::Session(SessionError::VerificationFailed { .. }) => true,
            Error::WithContext { source, .. } => source.is_session_expired(),
            _ => false,
        }
    }
}

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn with_context(self, ctx: impl Into<String>) -> Result<T>;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<Error>,
{
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().context(ctx))
    }
}
