//! Issuance and verification of access tokens.
//!
//! Verification is fail-fast through
//! `Parsed -> KeyResolved -> SignatureValid -> NotExpired -> Accepted`.
//! Any failed step yields [`TokenVerification::MustRefresh`]. Only
//! operational faults (store unreachable, corrupted key) are returned as
//! `Err`.

use crate::config::Config;
use crate::crypto;
use crate::errors::{RefreshReason, SessionError};
use crate::models::{AccessTokenClaims, IssuedToken, TokenVerification};
use crate::observability::{hash_for_correlation, metrics, ErrorCategory};
use crate::services::signing_key_manager::SigningKeyManager;
use crate::services::token_codec::{self, CodecError};
use chrono::Duration;
use common::clock::Clock;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, instrument};

pub struct AccessTokenService {
    key_manager: Arc<SigningKeyManager>,
    clock: Arc<dyn Clock>,
    validity: Duration,
    enable_anti_csrf: bool,
}

impl AccessTokenService {
    pub fn new(
        key_manager: Arc<SigningKeyManager>,
        clock: Arc<dyn Clock>,
        validity: std::time::Duration,
        enable_anti_csrf: bool,
    ) -> Result<Self, SessionError> {
        let validity = Duration::from_std(validity).map_err(|_| {
            SessionError::Configuration("access token validity is out of range".to_string())
        })?;
        if validity < Duration::milliseconds(1) {
            return Err(SessionError::Configuration(
                "access token validity must be at least one millisecond".to_string(),
            ));
        }

        Ok(Self {
            key_manager,
            clock,
            validity,
            enable_anti_csrf,
        })
    }

    pub fn from_config(
        key_manager: Arc<SigningKeyManager>,
        clock: Arc<dyn Clock>,
        config: &Config,
    ) -> Result<Self, SessionError> {
        Self::new(
            key_manager,
            clock,
            config.access_token_validity,
            config.enable_anti_csrf,
        )
    }

    /// Issue a signed access token for a session.
    ///
    /// `time_created` and `expiry_time` are computed here from the clock and
    /// the configured validity; callers cannot supply them.
    #[instrument(skip_all)]
    pub async fn create_new_access_token(
        &self,
        session_handle: &str,
        user_id: &str,
        refresh_token_hash_1: &str,
        parent_refresh_token_hash_1: Option<&str>,
        user_data: serde_json::Value,
        anti_csrf_token: Option<&str>,
    ) -> Result<IssuedToken, SessionError> {
        let start = Instant::now();

        let result = self
            .issue(
                session_handle,
                user_id,
                refresh_token_hash_1,
                parent_refresh_token_hash_1,
                user_data,
                anti_csrf_token,
            )
            .await;

        match &result {
            Ok(issued) => {
                debug!(
                    session = %hash_for_correlation(session_handle),
                    expiry_time = issued.expiry_time,
                    "Issued access token"
                );
                metrics::record_token_issuance("success", start.elapsed());
            }
            Err(e) => {
                metrics::record_token_issuance("error", start.elapsed());
                metrics::record_error("create_access_token", ErrorCategory::from(e).as_str());
            }
        }

        result
    }

    /// Verify a presented access token and return its claims.
    ///
    /// When `do_anti_csrf_check` is set and anti-CSRF is enabled, a token
    /// without an anti-CSRF field must be refreshed. Comparing the field
    /// against the request's value is left to the caller.
    #[instrument(skip_all)]
    pub async fn get_info_from_access_token(
        &self,
        token: &str,
        do_anti_csrf_check: bool,
    ) -> Result<TokenVerification, SessionError> {
        let result = self.verify(token, do_anti_csrf_check).await;

        match &result {
            Ok(TokenVerification::Valid(claims)) => {
                debug!(
                    session = %hash_for_correlation(&claims.session_handle),
                    "Access token verified"
                );
                metrics::record_token_validation("success", None);
            }
            Ok(TokenVerification::MustRefresh(reason)) => {
                debug!(reason = reason.as_str(), "Access token rejected");
                metrics::record_token_validation("rejected", Some(reason.as_str()));
            }
            Err(e) => {
                metrics::record_token_validation("error", None);
                metrics::record_error("verify_access_token", ErrorCategory::from(e).as_str());
            }
        }

        result
    }

    async fn issue(
        &self,
        session_handle: &str,
        user_id: &str,
        refresh_token_hash_1: &str,
        parent_refresh_token_hash_1: Option<&str>,
        user_data: serde_json::Value,
        anti_csrf_token: Option<&str>,
    ) -> Result<IssuedToken, SessionError> {
        if refresh_token_hash_1.is_empty() {
            return Err(SessionError::InvalidClaims(
                "refresh token hash must not be empty".to_string(),
            ));
        }

        let now = self.clock.now();
        let time_created = now.timestamp_millis();
        let expiry_time = (now + self.validity).timestamp_millis();

        let claims = AccessTokenClaims {
            session_handle: session_handle.to_string(),
            user_id: user_id.to_string(),
            refresh_token_hash_1: refresh_token_hash_1.to_string(),
            parent_refresh_token_hash_1: parent_refresh_token_hash_1.map(str::to_string),
            user_data,
            anti_csrf_token: anti_csrf_token.map(str::to_string),
            expiry_time,
            time_created,
        };

        let key = self.key_manager.get_signing_key().await?;

        let payload = token_codec::encode_payload(&claims, key.version)
            .map_err(|e| SessionError::InvalidClaims(e.to_string()))?;
        let signature = crypto::sign_payload(&key, payload.as_bytes());
        let token = token_codec::attach_signature(&payload, &signature);

        if token.len() > token_codec::MAX_ACCESS_TOKEN_SIZE_BYTES {
            return Err(SessionError::InvalidClaims(format!(
                "access token would be {} bytes, above the {} byte limit",
                token.len(),
                token_codec::MAX_ACCESS_TOKEN_SIZE_BYTES
            )));
        }

        Ok(IssuedToken {
            token,
            expiry_time,
            time_created,
        })
    }

    async fn verify(
        &self,
        token: &str,
        do_anti_csrf_check: bool,
    ) -> Result<TokenVerification, SessionError> {
        use TokenVerification::MustRefresh;

        // Parsed
        let decoded = match token_codec::decode(token) {
            Ok(decoded) => decoded,
            Err(CodecError::UnsupportedVersion(_)) => {
                return Ok(MustRefresh(RefreshReason::UnsupportedVersion))
            }
            Err(_) => return Ok(MustRefresh(RefreshReason::Malformed)),
        };

        // KeyResolved
        let Some(key) = self
            .key_manager
            .get_key_for_version(decoded.key_version)
            .await?
        else {
            return Ok(MustRefresh(RefreshReason::UnknownKeyVersion));
        };

        // SignatureValid
        if !crypto::verify_signature(&key, decoded.signed_payload.as_bytes(), &decoded.signature)
        {
            return Ok(MustRefresh(RefreshReason::SignatureMismatch));
        }

        // NotExpired
        if self.clock.now().timestamp_millis() >= decoded.claims.expiry_time {
            return Ok(MustRefresh(RefreshReason::Expired));
        }

        if do_anti_csrf_check && self.enable_anti_csrf && decoded.claims.anti_csrf_token.is_none()
        {
            return Ok(MustRefresh(RefreshReason::MissingAntiCsrfToken));
        }

        Ok(TokenVerification::Valid(decoded.claims))
    }
}
