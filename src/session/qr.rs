//! QR login types and polling options.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::SessionError;
use crate::api::QrCheck;
use crate::scheduler::CancelFlag;

/// QR code issued for a login attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct QrTicket {
    pub key: String,
    /// Image (data URL or renderer URL) to show the user
    pub qr_image: Option<String>,
    /// Login URL encoded in the image
    pub qr_url: Option<String>,
}

/// State of a QR code as reported by the service.
#[derive(Debug, Clone, PartialEq)]
pub enum QrStatus {
    /// 800: the code expired
    Expired,
    /// 801: waiting for a scan
    Waiting,
    /// 802: scanned, waiting for confirmation
    Scanned,
    /// 803: confirmed; carries the session cookie
    Confirmed { cookie: Option<String> },
    /// Any other answer, including transport failures. Not terminal.
    Error { code: i64, message: String },
}

impl QrStatus {
    pub fn from_check(check: QrCheck) -> Self {
        match check.code {
            800 => QrStatus::Expired,
            801 => QrStatus::Waiting,
            802 => QrStatus::Scanned,
            803 => QrStatus::Confirmed {
                cookie: check.cookie,
            },
            code => QrStatus::Error {
                code,
                message: check
                    .message
                    .unwrap_or_else(|| "unexpected QR status".to_string()),
            },
        }
    }

    pub fn description(&self) -> &str {
        match self {
            QrStatus::Expired => "expired",
            QrStatus::Waiting => "waiting for scan",
            QrStatus::Scanned => "scanned, confirm on your phone",
            QrStatus::Confirmed { .. } => "confirmed",
            QrStatus::Error { message, .. } => message,
        }
    }
}

/// Bounds of a polling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOptions {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl PollOptions {
    /// QR polling: 60 checks, 2 s apart.
    pub fn qr() -> Self {
        Self {
            max_attempts: 60,
            interval: Duration::from_secs(2),
        }
    }

    /// Official-session polling: 30 checks, 2 s apart.
    pub fn official() -> Self {
        Self {
            max_attempts: 30,
            interval: Duration::from_secs(2),
        }
    }
}

impl Default for PollOptions {
    fn default() -> Self {
        Self::qr()
    }
}

/// Progress report for a poll attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct PollProgress {
    pub attempt: u32,
    pub max_attempts: u32,
    pub status: QrStatus,
}

/// Handle to a QR poll running in the background.
pub struct QrPollHandle {
    pub(super) flag: CancelFlag,
    pub(super) progress: watch::Receiver<Option<PollProgress>>,
    pub(super) handle: JoinHandle<Result<(), SessionError>>,
}

impl QrPollHandle {
    /// Stop polling. No further check is issued. Idempotent.
    pub fn cancel(&self) {
        self.flag.cancel();
    }

    /// Latest progress report.
    pub fn progress(&self) -> watch::Receiver<Option<PollProgress>> {
        self.progress.clone()
    }

    /// Wait for the terminal outcome.
    pub async fn outcome(self) -> Result<(), SessionError> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(SessionError::Cancelled),
            Err(e) => Err(SessionError::Task(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(code: i64) -> QrCheck {
        QrCheck {
            code,
            cookie: Some("MUSIC_U=q".into()),
            message: None,
        }
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(QrStatus::from_check(check(800)), QrStatus::Expired);
        assert_eq!(QrStatus::from_check(check(801)), QrStatus::Waiting);
        assert_eq!(QrStatus::from_check(check(802)), QrStatus::Scanned);
        assert_eq!(
            QrStatus::from_check(check(803)),
            QrStatus::Confirmed {
                cookie: Some("MUSIC_U=q".into())
            }
        );
        assert!(matches!(
            QrStatus::from_check(check(502)),
            QrStatus::Error { code: 502, .. }
        ));
    }

    #[test]
    fn test_default_options() {
        assert_eq!(PollOptions::default().max_attempts, 60);
        assert_eq!(PollOptions::official().max_attempts, 30);
        assert_eq!(PollOptions::qr().interval, Duration::from_secs(2));
    }
}
