use std::fmt;
use thiserror::Error;

/// Operational failures.
///
/// These are the errors a caller cannot fix by asking the client to refresh.
/// An access token that fails verification is NOT an error: it is reported
/// as [`crate::models::TokenVerification::MustRefresh`] with a
/// [`RefreshReason`].
#[derive(Debug, Error)]
pub enum SessionError {
    /// The signing key store could not be reached or the query failed.
    /// Retryable by the caller.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Key material read from the store is corrupted, or a configuration
    /// value is unusable. The process must not keep serving.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Cryptographic error: {0}")]
    Crypto(String),

    /// The caller supplied claims that can never form a valid token.
    #[error("Invalid claims: {0}")]
    InvalidClaims(String),
}

impl SessionError {
    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, SessionError::Storage(_))
    }
}

/// Why a presented access token must not be trusted.
///
/// Every reason leads to the same caller behaviour (run the refresh flow);
/// the distinction exists for logs and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefreshReason {
    Malformed,
    UnsupportedVersion,
    UnknownKeyVersion,
    SignatureMismatch,
    Expired,
    MissingAntiCsrfToken,
}

impl RefreshReason {
    /// Bounded label for metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            RefreshReason::Malformed => "malformed",
            RefreshReason::UnsupportedVersion => "unsupported_version",
            RefreshReason::UnknownKeyVersion => "unknown_key_version",
            RefreshReason::SignatureMismatch => "signature_mismatch",
            RefreshReason::Expired => "expired",
            RefreshReason::MissingAntiCsrfToken => "missing_anti_csrf_token",
        }
    }
}

impl fmt::Display for RefreshReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            RefreshReason::Malformed => "Access token is malformed",
            RefreshReason::UnsupportedVersion => "Access token format version is not supported",
            RefreshReason::UnknownKeyVersion => "Access token signing key is no longer available",
            RefreshReason::SignatureMismatch => "Access token signature does not match",
            RefreshReason::Expired => "Access token expired",
            RefreshReason::MissingAntiCsrfToken => "Access token is missing the anti-CSRF token",
        };
        f.write_str(message)
    }
}
