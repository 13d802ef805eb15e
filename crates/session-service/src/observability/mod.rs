//! Observability for the session service.
//!
//! # Privacy by Default
//!
//! All instrumentation uses `#[instrument(skip_all)]` and explicit safe field
//! allow-listing:
//! - **SAFE**: key versions, refresh reasons, durations
//! - **HASHED**: session handles, via [`hash_for_correlation`]
//! - **NEVER**: key material, tokens, refresh token hashes, user data

pub mod metrics;

use crate::errors::SessionError;
use sha2::{Digest, Sha256};

/// Hash a field value for correlation in logs (SHA-256, first 8 hex chars)
///
/// One-way and truncated. Not suitable for anything but log correlation.
pub fn hash_for_correlation(value: &str) -> String {
    let digest = Sha256::digest(value.as_bytes());
    hex::encode(digest.get(..4).unwrap_or_default())
}

/// Error categories for metrics labels (bounded cardinality)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Store unreachable or query failed
    Transient,
    /// Corrupted key material or unusable settings
    Configuration,
    Cryptographic,
    /// Caller-supplied claims rejected
    InvalidInput,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Transient => "transient",
            ErrorCategory::Configuration => "configuration",
            ErrorCategory::Cryptographic => "cryptographic",
            ErrorCategory::InvalidInput => "invalid_input",
        }
    }
}

impl From<&SessionError> for ErrorCategory {
    fn from(err: &SessionError) -> Self {
        match err {
            SessionError::Storage(_) => ErrorCategory::Transient,
            SessionError::Configuration(_) => ErrorCategory::Configuration,
            SessionError::Crypto(_) => ErrorCategory::Cryptographic,
            SessionError::InvalidClaims(_) => ErrorCategory::InvalidInput,
        }
    }
}
