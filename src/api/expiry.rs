//! Expired-session notifications.
//!
//! The transport is the only place that sees a body code of 301, but the
//! in-memory session lives elsewhere. [`SessionExpiry`] bridges the two:
//! the client notifies, the session reconciler subscribes and logs out.

use tokio::sync::watch;

use super::domain::ApiError;

/// Counter bumped every time the service rejects the session.
#[derive(Debug)]
pub struct SessionExpiry {
    tx: watch::Sender<u64>,
}

impl Default for SessionExpiry {
    fn default() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self { tx }
    }
}

impl SessionExpiry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tell every subscriber the session is gone.
    pub fn notify(&self) {
        self.tx.send_modify(|count| *count += 1);
    }

    /// Receiver that wakes on notifications sent after this call.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.tx.subscribe()
    }

    /// Pass `result` through, notifying on [`ApiError::SessionExpired`].
    pub fn observe<T>(&self, result: Result<T, ApiError>) -> Result<T, ApiError> {
        if matches!(result, Err(ApiError::SessionExpired)) {
            self.notify();
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscriber_sees_later_notifications_only() {
        let expiry = SessionExpiry::new();
        expiry.notify();

        let mut rx = expiry.subscribe();
        assert!(!rx.has_changed().unwrap());

        expiry.notify();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), 2);
    }

    #[test]
    fn test_observe_only_fires_on_expired_session() {
        let expiry = SessionExpiry::new();
        let rx = expiry.subscribe();

        let _ = expiry.observe::<()>(Err(ApiError::Network("down".into())));
        assert!(!rx.has_changed().unwrap());
        assert_eq!(expiry.observe(Ok(5)).unwrap(), 5);
        assert!(!rx.has_changed().unwrap());

        let _ = expiry.observe::<()>(Err(ApiError::SessionExpired));
        assert!(rx.has_changed().unwrap());
    }
}
