//! Deterministic signing key fixtures for testing
//!
//! All fixtures are deterministic based on seed values.

use base64::engine::general_purpose;
use base64::Engine;
use chrono::{DateTime, Utc};
use ring::hmac;
use session_service::crypto::SIGNING_KEY_LENGTH;
use session_service::models::{SigningKey, SigningKeyRecord};
use thiserror::Error;

/// Test fixture error type
#[derive(Error, Debug)]
pub enum FixtureError {
    #[error("Fixture key rejected: {0}")]
    InvalidKey(String),
}

const FIXTURE_DERIVATION_KEY: &[u8] = b"session-test-utils fixture keys";

/// Deterministic HMAC key material. The same seed always produces the same
/// bytes; different seeds produce unrelated bytes.
pub fn test_key_material(seed: u8) -> Vec<u8> {
    let derivation = hmac::Key::new(hmac::HMAC_SHA256, FIXTURE_DERIVATION_KEY);
    let tag = hmac::sign(&derivation, &[seed]);
    tag.as_ref()
        .iter()
        .copied()
        .take(SIGNING_KEY_LENGTH)
        .collect()
}

/// Deterministic signing key for `version`.
pub fn test_signing_key(
    seed: u8,
    version: u64,
    created_at: DateTime<Utc>,
) -> Result<SigningKey, FixtureError> {
    SigningKey::from_bytes(test_key_material(seed), version, created_at)
        .map_err(|e| FixtureError::InvalidKey(e.to_string()))
}

/// Store record for a deterministic key, as if written by another instance.
pub fn test_signing_key_record(
    seed: u8,
    version: i64,
    created_at: DateTime<Utc>,
) -> SigningKeyRecord {
    SigningKeyRecord {
        key_version: version,
        key_material: general_purpose::STANDARD.encode(test_key_material(seed)),
        created_at,
        retired_at: None,
    }
}

/// A record whose key material has the wrong length.
pub fn truncated_key_record(version: i64, created_at: DateTime<Utc>) -> SigningKeyRecord {
    SigningKeyRecord {
        key_version: version,
        key_material: general_purpose::STANDARD.encode([0x5Au8; SIGNING_KEY_LENGTH / 2]),
        created_at,
        retired_at: None,
    }
}

/// A record whose key material is not base64 at all.
pub fn garbled_key_record(version: i64, created_at: DateTime<Utc>) -> SigningKeyRecord {
    SigningKeyRecord {
        key_version: version,
        key_material: "%%% not key material %%%".to_string(),
        created_at,
        retired_at: None,
    }
}
