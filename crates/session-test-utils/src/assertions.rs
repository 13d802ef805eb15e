//! Custom test assertions for expressive tests
//!
//! Provides trait-based assertions for verification outcomes.

use serde_json::Value;
use session_service::errors::RefreshReason;
use session_service::models::{AccessTokenClaims, TokenVerification};

/// Custom assertions for verification outcomes
///
/// # Example
/// ```rust,ignore
/// outcome
///     .assert_valid()
///     .assert_session_handle("session-1")
///     .assert_user_data(&json!({"key": "value"}));
///
/// expired.assert_must_refresh(RefreshReason::Expired);
/// ```
pub trait VerificationAssertions {
    /// Assert that verification accepted the token
    fn assert_valid(&self) -> &Self;

    /// Assert that the client must refresh, for exactly `reason`
    fn assert_must_refresh(&self, reason: RefreshReason) -> &Self;

    /// Assert that the client must refresh, for any reason
    fn assert_rejected(&self) -> &Self;

    fn assert_session_handle(&self, session_handle: &str) -> &Self;

    fn assert_user_id(&self, user_id: &str) -> &Self;

    fn assert_user_data(&self, user_data: &Value) -> &Self;

    fn assert_anti_csrf_token(&self, anti_csrf_token: Option<&str>) -> &Self;
}

fn claims_of(outcome: &TokenVerification) -> &AccessTokenClaims {
    match outcome {
        TokenVerification::Valid(claims) => claims,
        TokenVerification::MustRefresh(reason) => {
            panic!("Expected a valid token, got MustRefresh({:?})", reason)
        }
    }
}

impl VerificationAssertions for TokenVerification {
    fn assert_valid(&self) -> &Self {
        claims_of(self);
        self
    }

    fn assert_must_refresh(&self, reason: RefreshReason) -> &Self {
        match self {
            TokenVerification::MustRefresh(actual) => assert_eq!(
                *actual, reason,
                "Expected MustRefresh({:?}), got MustRefresh({:?})",
                reason, actual
            ),
            TokenVerification::Valid(_) => {
                panic!("Expected MustRefresh({:?}), but the token verified", reason)
            }
        }
        self
    }

    fn assert_rejected(&self) -> &Self {
        assert!(
            matches!(self, TokenVerification::MustRefresh(_)),
            "Expected the token to be rejected, but it verified"
        );
        self
    }

    fn assert_session_handle(&self, session_handle: &str) -> &Self {
        assert_eq!(claims_of(self).session_handle, session_handle);
        self
    }

    fn assert_user_id(&self, user_id: &str) -> &Self {
        assert_eq!(claims_of(self).user_id, user_id);
        self
    }

    fn assert_user_data(&self, user_data: &Value) -> &Self {
        assert_eq!(&claims_of(self).user_data, user_data);
        self
    }

    fn assert_anti_csrf_token(&self, anti_csrf_token: Option<&str>) -> &Self {
        assert_eq!(claims_of(self).anti_csrf_token.as_deref(), anti_csrf_token);
        self
    }
}
