//! Session reconciler.
//!
//! Owns the login state and keeps it in line with the remote service:
//!
//! - credential and QR login, official-session sync
//! - restore from storage, trusting recent verifications
//! - periodic re-verification through a [`VerificationChain`]
//! - background refresh of the user's library
//!
//! An unauthenticated answer clears the local session; a transient failure
//! (network, timeout, 5xx) never does. A 301 seen by any API call, including
//! ones the reconciler did not make, logs out through [`crate::api::SessionExpiry`].
//! Results computed under an older session epoch are discarded.

mod qr;
mod snapshot;
mod state;
mod verify;

pub use qr::{PollOptions, PollProgress, QrPollHandle, QrStatus, QrTicket};
pub use snapshot::SessionSnapshot;
pub use state::{SessionState, UserLibrary};
pub use verify::{
    FailureKind, OfficialStatus, ServiceStatus, Verification, VerificationChain, VerifyStrategy,
};

use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::api::{ApiError, Credentials, MusicApi};
use crate::config::SessionConfig;
use crate::scheduler::{CancelFlag, ScheduledTask};
use crate::storage::{KeyValueStore, StorageError};

/// Timing knobs of the reconciler.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOptions {
    /// A verification younger than this is trusted on restore
    pub freshness_window: Duration,
    pub recheck_interval: Duration,
    pub qr: PollOptions,
    pub official: PollOptions,
    pub probe_timeout: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            freshness_window: Duration::from_secs(15 * 60),
            recheck_interval: Duration::from_secs(5 * 60),
            qr: PollOptions::qr(),
            official: PollOptions::official(),
            probe_timeout: Duration::from_secs(5),
        }
    }
}

impl From<&SessionConfig> for SessionOptions {
    fn from(config: &SessionConfig) -> Self {
        Self {
            freshness_window: Duration::from_secs(config.freshness_window_secs),
            recheck_interval: Duration::from_secs(config.recheck_interval_secs.max(1)),
            qr: PollOptions {
                max_attempts: config.qr_max_attempts,
                interval: Duration::from_millis(config.poll_interval_ms),
            },
            official: PollOptions {
                max_attempts: config.official_max_attempts,
                interval: Duration::from_millis(config.poll_interval_ms),
            },
            probe_timeout: Duration::from_secs(config.probe_timeout_secs),
        }
    }
}

/// Result of [`SessionReconciler::restore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// Nothing stored
    NoSession,
    /// Verified recently enough to trust without a network call
    Trusted,
    /// Stale, re-verified successfully
    Verified,
    /// Stale and rejected by the service; logged out
    Expired,
    /// Stale and could not be checked; kept logged in
    Unverified,
}

impl RestoreOutcome {
    pub fn is_logged_in(self) -> bool {
        matches!(
            self,
            RestoreOutcome::Trusted | RestoreOutcome::Verified | RestoreOutcome::Unverified
        )
    }
}

/// Session payload to adopt.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionPayload {
    pub cookie: Option<String>,
    pub account: Option<Value>,
    pub profile: Option<Value>,
}

struct Inner {
    api: Arc<dyn MusicApi>,
    store: Arc<dyn KeyValueStore>,
    chain: VerificationChain,
    options: SessionOptions,
    state: RwLock<SessionState>,
    recheck: Mutex<Option<ScheduledTask>>,
    expiry_watch: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(task) = self.expiry_watch.get_mut().take() {
            task.abort();
        }
    }
}

/// Cheaply cloneable handle to the session.
#[derive(Clone)]
pub struct SessionReconciler {
    inner: Arc<Inner>,
}

impl SessionReconciler {
    pub fn new(api: Arc<dyn MusicApi>, store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_options(api, store, SessionOptions::default())
    }

    pub fn with_options(
        api: Arc<dyn MusicApi>,
        store: Arc<dyn KeyValueStore>,
        options: SessionOptions,
    ) -> Self {
        Self::with_chain(api, store, options, VerificationChain::default())
    }

    pub fn with_chain(
        api: Arc<dyn MusicApi>,
        store: Arc<dyn KeyValueStore>,
        options: SessionOptions,
        chain: VerificationChain,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                api,
                store,
                chain,
                options,
                state: RwLock::new(SessionState::default()),
                recheck: Mutex::new(None),
                expiry_watch: Mutex::new(None),
            }),
        }
    }

    pub fn options(&self) -> &SessionOptions {
        &self.inner.options
    }

    // ---- login ----

    /// Log in with credentials and verify the new session.
    pub async fn login(&self, credentials: &Credentials) -> Result<(), SessionError> {
        let response = self
            .inner
            .api
            .login(credentials)
            .await
            .map_err(SessionError::Network)?;

        match response.code {
            200 => {
                self.accept(SessionPayload {
                    cookie: response.cookie,
                    account: response.account,
                    profile: response.profile,
                })
                .await
            }
            502 => Err(SessionError::InvalidCredentials),
            509 => Err(SessionError::InvalidCaptcha),
            code => Err(SessionError::Rejected {
                code,
                message: response
                    .message
                    .unwrap_or_else(|| "login rejected".to_string()),
            }),
        }
    }

    /// Adopt a freshly obtained session, then confirm it with the service.
    ///
    /// Only a verified session counts as a successful login. A rejection
    /// clears the session again. A transient failure keeps it and its
    /// re-check timer, but the caller still gets [`SessionError::Unverified`].
    async fn accept(&self, payload: SessionPayload) -> Result<(), SessionError> {
        self.adopt(payload);

        let verification = self.verify().await;
        if verification.is_valid {
            tracing::info!("Logged in as {}", self.nickname().unwrap_or_default());
            return Ok(());
        }

        let unauthenticated = verification.is_unauthenticated();
        let message = verification.message.unwrap_or_default();
        if unauthenticated {
            Err(SessionError::VerificationFailed {
                code: verification.code,
                message,
            })
        } else {
            Err(SessionError::Unverified { message })
        }
    }

    /// Install `payload` as the current session.
    pub fn adopt(&self, payload: SessionPayload) {
        {
            let mut state = self.inner.state.write();
            let epoch = state.epoch + 1;
            *state = SessionState {
                is_logged_in: true,
                cookie: payload.cookie,
                account: payload.account,
                profile: payload.profile,
                last_verified_at: Some(Utc::now()),
                library: UserLibrary::default(),
                epoch,
            };
        }
        self.save();
        self.watch_expiry();
        self.spawn_user_data_refresh();
        self.schedule_recheck();
    }

    // ---- verification ----

    /// Run the verification chain and apply its answer.
    pub async fn verify(&self) -> Verification {
        let epoch = self.inner.state.read().epoch;
        let result = self.inner.chain.run(self.inner.api.as_ref()).await;

        let applied = {
            let mut state = self.inner.state.write();
            if state.epoch != epoch {
                tracing::debug!("Discarding verification from an older session");
                return result;
            }
            if !state.is_logged_in {
                return result;
            }
            if result.is_valid {
                if result.account.is_some() {
                    state.account = result.account.clone();
                }
                if result.profile.is_some() {
                    state.profile = result.profile.clone();
                }
                state.last_verified_at = Some(Utc::now());
            }
            result.is_valid
        };

        if applied {
            self.save();
            self.spawn_user_data_refresh();
        } else if result.is_unauthenticated() {
            tracing::warn!(
                "Session rejected (code {}), logging out",
                result.code
            );
            self.clear_local();
        } else {
            tracing::warn!(
                "Could not verify session, keeping it: {}",
                result.message.as_deref().unwrap_or("unknown")
            );
        }

        result
    }

    /// Load the stored session and decide whether to trust it.
    pub async fn restore(&self) -> RestoreOutcome {
        let Some(snapshot) = SessionSnapshot::load(self.inner.store.as_ref()) else {
            return RestoreOutcome::NoSession;
        };
        if !snapshot.has_session() {
            return RestoreOutcome::NoSession;
        }

        let window = chrono::Duration::from_std(self.inner.options.freshness_window)
            .unwrap_or_else(|_| chrono::Duration::days(365));
        let fresh = {
            let mut state = self.inner.state.write();
            state.epoch += 1;
            state.load_snapshot(snapshot);
            state
                .last_verified_at
                .is_some_and(|at| Utc::now() - at <= window)
        };
        self.watch_expiry();

        if fresh {
            tracing::info!("Restored recently verified session");
            self.spawn_user_data_refresh();
            self.schedule_recheck();
            return RestoreOutcome::Trusted;
        }

        let verification = self.verify().await;
        let outcome = if verification.is_valid {
            RestoreOutcome::Verified
        } else if verification.is_unauthenticated() {
            RestoreOutcome::Expired
        } else {
            RestoreOutcome::Unverified
        };

        if outcome.is_logged_in() && self.is_logged_in() {
            self.schedule_recheck();
        }
        tracing::info!("Session restore: {:?}", outcome);
        outcome
    }

    /// (Re)start the periodic verification timer.
    pub fn schedule_recheck(&self) {
        self.cancel_recheck();

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let task = ScheduledTask::spawn_periodic(self.inner.options.recheck_interval, move || {
            let weak = weak.clone();
            async move {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                let session = SessionReconciler { inner };
                if session.is_logged_in() {
                    tracing::debug!("Periodic session check");
                    session.verify().await;
                }
            }
        });

        *self.inner.recheck.lock() = Some(task);
    }

    /// Stop the periodic timer. Idempotent.
    pub fn cancel_recheck(&self) {
        // Dropping the task outside the lock
        let task = self.inner.recheck.lock().take();
        drop(task);
    }

    /// Log out whenever the API reports an expired session.
    ///
    /// One listener per reconciler; it lives until the reconciler is dropped.
    fn watch_expiry(&self) {
        let mut slot = self.inner.expiry_watch.lock();
        if slot.as_ref().is_some_and(|task| !task.is_finished()) {
            return;
        }

        let mut expired = self.inner.api.session_expiry().subscribe();
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        *slot = Some(tokio::spawn(async move {
            while expired.changed().await.is_ok() {
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                let session = SessionReconciler { inner };
                if session.is_logged_in() {
                    tracing::warn!("Service reported an expired session, logging out");
                    session.clear_local();
                }
            }
        }));
    }

    pub fn is_recheck_active(&self) -> bool {
        self.inner
            .recheck
            .lock()
            .as_ref()
            .is_some_and(ScheduledTask::is_active)
    }

    /// Extend the session server-side.
    pub async fn refresh_login(&self) -> bool {
        match self.inner.api.refresh_login().await {
            Ok(200) => true,
            Ok(code) => {
                tracing::warn!("Login refresh answered code {}", code);
                false
            }
            Err(e) => {
                self.note_api_error("refresh login", &e);
                false
            }
        }
    }

    // ---- logout ----

    /// Best-effort remote logout, then clear local state. Idempotent.
    pub async fn logout(&self) {
        if self.is_logged_in() {
            if let Err(e) = self.inner.api.logout().await {
                tracing::warn!("Remote logout failed: {}", e);
            }
        }
        self.clear_local();
        tracing::info!("Logged out");
    }

    /// Forget the session locally without any network call.
    pub fn clear_local(&self) {
        self.inner.state.write().reset();
        self.cancel_recheck();
        SessionSnapshot::clear(self.inner.store.as_ref());
    }

    fn note_api_error(&self, what: &str, error: &ApiError) {
        if matches!(error, ApiError::SessionExpired) {
            tracing::warn!("Session expired during {}", what);
            self.clear_local();
        } else {
            tracing::warn!("Failed to {}: {}", what, error);
        }
    }

    // ---- QR login ----

    /// Request a new QR code.
    pub async fn request_qr(&self) -> Result<QrTicket, SessionError> {
        let api = &self.inner.api;
        let key = api.qr_key().await.map_err(SessionError::Network)?;
        let image = api.qr_create(&key).await.map_err(SessionError::Network)?;
        Ok(QrTicket {
            key,
            qr_image: image.qr_image,
            qr_url: image.qr_url,
        })
    }

    /// Poll a QR code until it is confirmed, expires, runs out of attempts
    /// or is cancelled.
    pub async fn poll_qr<F>(
        &self,
        key: &str,
        options: PollOptions,
        cancel: &CancelFlag,
        mut on_progress: F,
    ) -> Result<(), SessionError>
    where
        F: FnMut(&PollProgress) + Send,
    {
        for attempt in 1..=options.max_attempts {
            if cancel.is_cancelled() {
                return Err(SessionError::Cancelled);
            }

            let status = match self.inner.api.qr_check(key).await {
                Ok(check) => QrStatus::from_check(check),
                Err(e) => QrStatus::Error {
                    code: e.code(),
                    message: e.to_string(),
                },
            };
            if cancel.is_cancelled() {
                return Err(SessionError::Cancelled);
            }

            tracing::debug!("QR check {}/{}: {:?}", attempt, options.max_attempts, status);
            on_progress(&PollProgress {
                attempt,
                max_attempts: options.max_attempts,
                status: status.clone(),
            });

            match status {
                QrStatus::Confirmed { cookie } => {
                    return self
                        .accept(SessionPayload {
                            cookie,
                            ..Default::default()
                        })
                        .await;
                }
                QrStatus::Expired => return Err(SessionError::QrExpired),
                _ => {}
            }

            if attempt < options.max_attempts {
                tokio::time::sleep(options.interval).await;
            }
        }

        Err(SessionError::QrTimedOut {
            attempts: options.max_attempts,
        })
    }

    /// Run [`Self::poll_qr`] in the background.
    pub fn spawn_qr_poll(&self, key: impl Into<String>, options: PollOptions) -> QrPollHandle {
        let key = key.into();
        let flag = CancelFlag::new();
        let (tx, progress) = watch::channel(None);

        let session = self.clone();
        let task_flag = flag.clone();
        let handle = tokio::spawn(async move {
            session
                .poll_qr(&key, options, &task_flag, |p| {
                    let _ = tx.send(Some(p.clone()));
                })
                .await
        });

        QrPollHandle {
            flag,
            progress,
            handle,
        }
    }

    // ---- official session ----

    /// Adopt a session the official service already knows about.
    ///
    /// Returns whether a session was adopted.
    pub async fn sync_from_official(&self) -> bool {
        let result = OfficialStatus.verify(self.inner.api.as_ref()).await;
        if !result.is_valid {
            tracing::debug!("No official session: code {}", result.code);
            return false;
        }

        let cookie = self.inner.state.read().cookie.clone();
        self.adopt(SessionPayload {
            cookie,
            account: result.account,
            profile: result.profile,
        });
        tracing::info!("Synced session from the official service");
        true
    }

    /// Poll the official service until it reports a session.
    pub async fn poll_official<F>(
        &self,
        options: PollOptions,
        cancel: &CancelFlag,
        mut on_progress: F,
    ) -> Result<(), SessionError>
    where
        F: FnMut(u32, u32) + Send,
    {
        for attempt in 1..=options.max_attempts {
            if cancel.is_cancelled() {
                return Err(SessionError::Cancelled);
            }
            on_progress(attempt, options.max_attempts);

            if self.sync_from_official().await {
                return Ok(());
            }
            if cancel.is_cancelled() {
                return Err(SessionError::Cancelled);
            }
            if attempt < options.max_attempts {
                tokio::time::sleep(options.interval).await;
            }
        }

        Err(SessionError::OfficialTimedOut {
            attempts: options.max_attempts,
        })
    }

    /// A single bounded attempt at [`Self::sync_from_official`].
    pub async fn probe_official(&self, timeout: Duration) -> bool {
        match tokio::time::timeout(timeout, self.sync_from_official()).await {
            Ok(adopted) => adopted,
            Err(_) => {
                tracing::warn!("Official session probe timed out after {:?}", timeout);
                false
            }
        }
    }

    // ---- user data ----

    fn spawn_user_data_refresh(&self) {
        let session = self.clone();
        tokio::spawn(async move {
            session.refresh_user_data().await;
        });
    }

    /// Fetch detail, playlists and liked tracks. Failures are logged only.
    pub async fn refresh_user_data(&self) {
        let (epoch, uid) = {
            let state = self.inner.state.read();
            if !state.is_logged_in {
                return;
            }
            match state.user_id() {
                Some(uid) => (state.epoch, uid),
                None => return,
            }
        };

        let api = &self.inner.api;
        let (detail, playlists, liked) = futures::join!(
            api.user_detail(uid),
            api.user_playlists(uid),
            api.liked_ids(uid)
        );

        for error in [detail.as_ref().err(), playlists.as_ref().err(), liked.as_ref().err()]
            .into_iter()
            .flatten()
        {
            if matches!(error, ApiError::SessionExpired) {
                self.note_api_error("refresh user data", error);
                return;
            }
            tracing::warn!("Failed to refresh user data: {}", error);
        }

        let mut state = self.inner.state.write();
        if state.epoch != epoch || !state.is_logged_in {
            tracing::debug!("Discarding user data from an older session");
            return;
        }

        if let Ok(detail) = detail {
            state.library.detail = Some(detail);
        }
        if let Ok(playlists) = playlists {
            let (created, subscribed): (Vec<_>, Vec<_>) =
                playlists.into_iter().partition(|p| p.owner_id == uid);
            state.library.created_playlists = created;
            state.library.subscribed_playlists = subscribed;
        }
        if let Ok(ids) = liked {
            state.library.liked_ids = ids.into_iter().collect();
        }
    }

    // ---- accessors ----

    /// Copy of the current state.
    pub fn state(&self) -> SessionState {
        self.inner.state.read().clone()
    }

    pub fn is_logged_in(&self) -> bool {
        self.inner.state.read().is_logged_in
    }

    pub fn user_id(&self) -> Option<u64> {
        self.inner.state.read().user_id()
    }

    pub fn nickname(&self) -> Option<String> {
        self.inner.state.read().nickname().map(str::to_string)
    }

    pub fn avatar_url(&self) -> Option<String> {
        self.inner.state.read().avatar_url().map(str::to_string)
    }

    pub fn is_liked(&self, track_id: u64) -> bool {
        self.inner.state.read().library.liked_ids.contains(&track_id)
    }

    pub fn mark_liked(&self, track_id: u64) {
        self.inner.state.write().library.liked_ids.insert(track_id);
    }

    pub fn unmark_liked(&self, track_id: u64) {
        self.inner.state.write().library.liked_ids.remove(&track_id);
    }

    // ---- persistence ----

    pub fn persist(&self) -> Result<(), SessionError> {
        let snapshot = self.inner.state.read().to_snapshot();
        snapshot.save(self.inner.store.as_ref())?;
        Ok(())
    }

    fn save(&self) {
        if let Err(e) = self.persist() {
            tracing::warn!("Failed to save session: {}", e);
        }
    }
}

/// Session errors
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Wrong account or password")]
    InvalidCredentials,

    #[error("Wrong captcha")]
    InvalidCaptcha,

    #[error("Login rejected (code {code}): {message}")]
    Rejected { code: i64, message: String },

    #[error("Session could not be verified (code {code}): {message}")]
    VerificationFailed { code: i64, message: String },

    #[error("Logged in, but the service could not confirm the session: {message}")]
    Unverified { message: String },

    #[error("Network error: {0}")]
    Network(#[source] ApiError),

    #[error("QR code expired")]
    QrExpired,

    #[error("QR login not confirmed after {attempts} checks")]
    QrTimedOut { attempts: u32 },

    #[error("No official session found after {attempts} checks")]
    OfficialTimedOut { attempts: u32 },

    #[error("Cancelled")]
    Cancelled,

    #[error("Background task failed: {0}")]
    Task(String),

    #[error("Failed to persist session: {0}")]
    Storage(#[from] StorageError),
}
