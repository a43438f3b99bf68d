//! Login-state verification strategies.
//!
//! Each strategy asks one authority whether the current session is valid
//! and normalizes the answer into a [`Verification`]. A
//! [`VerificationChain`] runs them in order: the first valid answer wins,
//! otherwise the last strategy's answer stands.

use async_trait::async_trait;
use serde_json::Value;

use crate::api::{AccountStatus, ApiError, MusicApi, is_unauthenticated_code};

/// Why a verification did not succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The service rejected the session; it must be dropped
    Unauthenticated,
    /// Nothing was proven either way; keep the session
    Transient,
}

/// Normalized verification answer.
#[derive(Debug, Clone, PartialEq)]
pub struct Verification {
    pub is_valid: bool,
    /// Body or HTTP code, -1 for transport failures
    pub code: i64,
    pub account: Option<Value>,
    pub profile: Option<Value>,
    pub message: Option<String>,
    /// Set when `is_valid` is false
    pub failure: Option<FailureKind>,
    /// Name of the strategy that produced this answer
    pub source: &'static str,
}

impl Verification {
    /// Classify an account answer.
    ///
    /// Code 200 with an account is valid; code 200 without one, or an
    /// unauthenticated code, rejects the session; anything else is transient.
    pub fn from_status(source: &'static str, status: AccountStatus) -> Self {
        if status.is_logged_in() {
            return Self {
                is_valid: true,
                code: status.code,
                account: status.account,
                profile: status.profile,
                message: None,
                failure: None,
                source,
            };
        }

        let failure = if status.code == 200 || is_unauthenticated_code(status.code) {
            FailureKind::Unauthenticated
        } else {
            FailureKind::Transient
        };
        Self::failed(source, status.code, failure, "session not accepted")
    }

    pub fn from_error(source: &'static str, error: &ApiError) -> Self {
        let failure = if error.is_unauthenticated() {
            FailureKind::Unauthenticated
        } else {
            FailureKind::Transient
        };
        Self::failed(source, error.code(), failure, error.to_string())
    }

    pub fn failed(
        source: &'static str,
        code: i64,
        failure: FailureKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            is_valid: false,
            code,
            account: None,
            profile: None,
            message: Some(message.into()),
            failure: Some(failure),
            source,
        }
    }

    pub fn is_unauthenticated(&self) -> bool {
        self.failure == Some(FailureKind::Unauthenticated)
    }

    pub fn is_transient(&self) -> bool {
        self.failure == Some(FailureKind::Transient)
    }
}

/// One way of asking whether the session is valid.
#[async_trait]
pub trait VerifyStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn verify(&self, api: &dyn MusicApi) -> Verification;
}

/// Ask the official service directly.
pub struct OfficialStatus;

#[async_trait]
impl VerifyStrategy for OfficialStatus {
    fn name(&self) -> &'static str {
        "official"
    }

    async fn verify(&self, api: &dyn MusicApi) -> Verification {
        match api.official_account().await {
            Ok(status) => Verification::from_status(self.name(), status),
            Err(e) => Verification::from_error(self.name(), &e),
        }
    }
}

/// Ask the API server: login status first, then the account details.
pub struct ServiceStatus;

#[async_trait]
impl VerifyStrategy for ServiceStatus {
    fn name(&self) -> &'static str {
        "service"
    }

    async fn verify(&self, api: &dyn MusicApi) -> Verification {
        match api.login_status().await {
            Ok(status) if status.code == 200 => {}
            Ok(status) => return Verification::from_status(self.name(), status),
            Err(e) => return Verification::from_error(self.name(), &e),
        }

        match api.user_account().await {
            Ok(status) => Verification::from_status(self.name(), status),
            Err(e) => Verification::from_error(self.name(), &e),
        }
    }
}

/// Ordered strategies.
pub struct VerificationChain {
    strategies: Vec<Box<dyn VerifyStrategy>>,
}

impl Default for VerificationChain {
    /// Official service first, API server as fallback.
    fn default() -> Self {
        Self::new(vec![Box::new(OfficialStatus), Box::new(ServiceStatus)])
    }
}

impl VerificationChain {
    pub fn new(strategies: Vec<Box<dyn VerifyStrategy>>) -> Self {
        Self { strategies }
    }

    /// Run strategies until one reports a valid session.
    pub async fn run(&self, api: &dyn MusicApi) -> Verification {
        let mut last = None;
        for strategy in &self.strategies {
            let result = strategy.verify(api).await;
            if result.is_valid {
                tracing::debug!("Session verified by {}", strategy.name());
                return result;
            }
            tracing::debug!(
                "Verification by {} failed: code {} ({:?})",
                strategy.name(),
                result.code,
                result.failure
            );
            last = Some(result);
        }
        last.unwrap_or_else(|| {
            Verification::failed("none", -1, FailureKind::Transient, "no verification strategy")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::traits::mocks::{MockApi, logged_in, no_account};

    #[test]
    fn test_classification() {
        assert!(Verification::from_status("t", logged_in(1)).is_valid);
        assert!(Verification::from_status("t", no_account(200)).is_unauthenticated());
        assert!(Verification::from_status("t", no_account(301)).is_unauthenticated());
        assert!(Verification::from_status("t", no_account(400)).is_unauthenticated());
        assert!(Verification::from_status("t", no_account(401)).is_unauthenticated());
        assert!(Verification::from_status("t", no_account(502)).is_transient());

        let timeout = ApiError::Network("timed out".into());
        assert!(Verification::from_error("t", &timeout).is_transient());
        assert!(Verification::from_error("t", &ApiError::Http { status: 503 }).is_transient());
        assert!(Verification::from_error("t", &ApiError::SessionExpired).is_unauthenticated());
    }

    #[tokio::test]
    async fn test_official_success_short_circuits() {
        let api = MockApi::new();
        api.push_official(Ok(logged_in(5)));

        let result = VerificationChain::default().run(&api).await;
        assert!(result.is_valid);
        assert_eq!(result.source, "official");
        assert_eq!(api.calls("login_status"), 0);
    }

    #[tokio::test]
    async fn test_falls_back_to_service() {
        let api = MockApi::new();
        // Official unreachable by default
        let result = VerificationChain::default().run(&api).await;
        assert!(result.is_valid);
        assert_eq!(result.source, "service");
        assert_eq!(api.calls("official_account"), 1);
        assert_eq!(api.calls("user_account"), 1);
    }

    #[tokio::test]
    async fn test_service_status_stops_on_bad_login_status() {
        let api = MockApi::new();
        api.push_login_status(Ok(no_account(301)));

        let result = ServiceStatus.verify(&api).await;
        assert!(result.is_unauthenticated());
        assert_eq!(api.calls("user_account"), 0);
    }

    #[tokio::test]
    async fn test_last_result_wins_when_all_fail() {
        let api = MockApi::new();
        api.push_official(Ok(no_account(200)));
        api.push_login_status(Err(ApiError::Network("reset".into())));

        let result = VerificationChain::default().run(&api).await;
        assert!(!result.is_valid);
        assert_eq!(result.source, "service");
        assert!(result.is_transient());
    }

    #[tokio::test]
    async fn test_empty_chain_is_transient() {
        let api = MockApi::new();
        let result = VerificationChain::new(vec![]).run(&api).await;
        assert!(result.is_transient());
    }
}
