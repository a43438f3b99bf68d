//! Music service API boundary.
//!
//! ## Architecture
//!
//! - `domain.rs` - Our types, stable regardless of the wire format
//! - `dto.rs` - Wire format, mirrors the server's JSON
//! - `adapter.rs` - The only place DTOs are converted to domain types
//! - `client.rs` - HTTP transport (cookie, timestamp, expired-session handling)
//! - `expiry.rs` - [`SessionExpiry`] signal raised when the service rejects the session
//! - `traits.rs` - [`MusicApi`] seam consumed by the player and session

pub mod adapter;
pub mod client;
pub mod domain;
pub mod expiry;
pub mod dto;
pub mod traits;

pub use client::{DEFAULT_BASE_URL, NeteaseClient, OFFICIAL_STATUS_URL};
pub use domain::{
    AccountStatus, ApiError, AudioQuality, Credentials, LoginResponse, QrCheck, QrImage,
    UNAUTHENTICATED_CODES, UserPlaylist, is_unauthenticated_code,
};
pub use expiry::SessionExpiry;
pub use traits::MusicApi;
