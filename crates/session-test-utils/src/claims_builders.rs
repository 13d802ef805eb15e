//! Test data builders
//!
//! Fluent construction of issuance inputs with sensible defaults.

use crate::test_ids::{TEST_REFRESH_TOKEN_HASH, TEST_SESSION_HANDLE_1, TEST_USER_ALICE};
use serde_json::{json, Value};
use session_service::errors::SessionError;
use session_service::models::IssuedToken;
use session_service::services::AccessTokenService;

/// Builder for access token issuance requests
///
/// # Example
/// ```rust,ignore
/// let issued = TestClaimsBuilder::new()
///     .for_session("session-1")
///     .with_parent_refresh_token_hash("parent")
///     .with_user_data(json!({"role": "admin"}))
///     .issue(&service)
///     .await?;
/// ```
#[derive(Debug, Clone)]
pub struct TestClaimsBuilder {
    session_handle: String,
    user_id: String,
    refresh_token_hash_1: String,
    parent_refresh_token_hash_1: Option<String>,
    user_data: Value,
    anti_csrf_token: Option<String>,
}

impl Default for TestClaimsBuilder {
    fn default() -> Self {
        Self {
            session_handle: TEST_SESSION_HANDLE_1.to_string(),
            user_id: TEST_USER_ALICE.to_string(),
            refresh_token_hash_1: TEST_REFRESH_TOKEN_HASH.to_string(),
            parent_refresh_token_hash_1: None,
            user_data: json!({}),
            anti_csrf_token: None,
        }
    }
}

impl TestClaimsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_session(mut self, session_handle: &str) -> Self {
        self.session_handle = session_handle.to_string();
        self
    }

    pub fn for_user(mut self, user_id: &str) -> Self {
        self.user_id = user_id.to_string();
        self
    }

    pub fn with_refresh_token_hash(mut self, hash: &str) -> Self {
        self.refresh_token_hash_1 = hash.to_string();
        self
    }

    pub fn with_parent_refresh_token_hash(mut self, hash: &str) -> Self {
        self.parent_refresh_token_hash_1 = Some(hash.to_string());
        self
    }

    pub fn with_user_data(mut self, user_data: Value) -> Self {
        self.user_data = user_data;
        self
    }

    pub fn with_anti_csrf_token(mut self, token: &str) -> Self {
        self.anti_csrf_token = Some(token.to_string());
        self
    }

    pub fn session_handle(&self) -> &str {
        &self.session_handle
    }

    pub fn user_data(&self) -> &Value {
        &self.user_data
    }

    /// Issue a token with these inputs.
    pub async fn issue(&self, service: &AccessTokenService) -> Result<IssuedToken, SessionError> {
        service
            .create_new_access_token(
                &self.session_handle,
                &self.user_id,
                &self.refresh_token_hash_1,
                self.parent_refresh_token_hash_1.as_deref(),
                self.user_data.clone(),
                self.anti_csrf_token.as_deref(),
            )
            .await
    }
}
