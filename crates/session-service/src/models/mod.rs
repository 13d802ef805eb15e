use crate::crypto;
use crate::errors::{RefreshReason, SessionError};
use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Duration, Utc};
use common::secret::{ExposeSecret, SecretBox};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::sync::Arc;

/// Signing key row (maps to access_token_signing_keys table)
///
/// `key_material` is standard base64 of the raw HMAC key. It is only decoded
/// by [`SigningKey::from_record`], which is where corruption is detected.
#[derive(Clone, PartialEq, Eq, FromRow)]
pub struct SigningKeyRecord {
    pub key_version: i64,
    pub key_material: String,
    pub created_at: DateTime<Utc>,
    /// Set when a successor key is written. `None` for the current key.
    pub retired_at: Option<DateTime<Utc>>,
}

impl fmt::Debug for SigningKeyRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKeyRecord")
            .field("key_version", &self.key_version)
            .field("key_material", &"[REDACTED]")
            .field("created_at", &self.created_at)
            .field("retired_at", &self.retired_at)
            .finish()
    }
}

/// Decoded signing key held in memory.
///
/// Immutable once created. Cloning shares the underlying secret.
#[derive(Debug, Clone)]
pub struct SigningKey {
    value: Arc<SecretBox<Vec<u8>>>,
    pub created_at: DateTime<Utc>,
    /// Monotonically increasing; embedded in every token this key signs.
    pub version: u64,
}

impl SigningKey {
    /// Generate fresh key material for `version`.
    pub fn generate(version: u64, created_at: DateTime<Utc>) -> Result<Self, SessionError> {
        let bytes = crypto::generate_key_material()?;
        Self::from_bytes(bytes, version, created_at)
    }

    /// Build a key from raw bytes, enforcing the algorithm's key length.
    pub fn from_bytes(
        bytes: Vec<u8>,
        version: u64,
        created_at: DateTime<Utc>,
    ) -> Result<Self, SessionError> {
        if bytes.len() != crypto::SIGNING_KEY_LENGTH {
            return Err(SessionError::Configuration(format!(
                "Signing key {} has invalid length: {} (expected {})",
                version,
                bytes.len(),
                crypto::SIGNING_KEY_LENGTH
            )));
        }
        if version == 0 {
            return Err(SessionError::Configuration(
                "Signing key version must be positive".to_string(),
            ));
        }

        Ok(Self {
            value: Arc::new(SecretBox::new(Box::new(bytes))),
            created_at,
            version,
        })
    }

    /// Decode a stored record. Any inconsistency is a fatal configuration
    /// error: a corrupted key must never be silently replaced.
    pub fn from_record(record: &SigningKeyRecord) -> Result<Self, SessionError> {
        let version = u64::try_from(record.key_version).map_err(|_| {
            SessionError::Configuration(format!(
                "Stored signing key has invalid version: {}",
                record.key_version
            ))
        })?;

        let bytes = general_purpose::STANDARD
            .decode(record.key_material.as_bytes())
            .map_err(|e| {
                SessionError::Configuration(format!(
                    "Stored signing key {} is not valid base64: {}",
                    version, e
                ))
            })?;

        Self::from_bytes(bytes, version, record.created_at)
    }

    /// Record for a key that is about to become current.
    pub fn to_record(&self) -> Result<SigningKeyRecord, SessionError> {
        let key_version = i64::try_from(self.version).map_err(|_| {
            SessionError::Configuration(format!(
                "Signing key version {} does not fit the store",
                self.version
            ))
        })?;

        Ok(SigningKeyRecord {
            key_version,
            key_material: general_purpose::STANDARD.encode(self.value.expose_secret()),
            created_at: self.created_at,
            retired_at: None,
        })
    }

    pub fn expose_bytes(&self) -> &[u8] {
        self.value.expose_secret()
    }

    /// Rotation is a pure function of `(now, created_at, interval)`.
    pub fn is_rotation_due(&self, now: DateTime<Utc>, interval: Duration) -> bool {
        now - self.created_at > interval
    }

    /// Whether two handles carry the same key material.
    pub fn same_material(&self, other: &SigningKey) -> bool {
        self.version == other.version && self.expose_bytes() == other.expose_bytes()
    }
}

/// Session claims carried inside an access token.
///
/// `expiry_time` and `time_created` are milliseconds since the Unix epoch and
/// are computed by the access token service, never supplied by callers.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessTokenClaims {
    pub session_handle: String,
    pub user_id: String,
    pub refresh_token_hash_1: String,
    pub parent_refresh_token_hash_1: Option<String>,
    pub user_data: serde_json::Value,
    pub anti_csrf_token: Option<String>,
    pub expiry_time: i64,
    pub time_created: i64,
}

/// Custom Debug implementation that redacts credential-bearing fields.
impl fmt::Debug for AccessTokenClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessTokenClaims")
            .field("session_handle", &"[REDACTED]")
            .field("user_id", &"[REDACTED]")
            .field("refresh_token_hash_1", &"[REDACTED]")
            .field(
                "parent_refresh_token_hash_1",
                &self.parent_refresh_token_hash_1.as_ref().map(|_| "[REDACTED]"),
            )
            .field("user_data", &"[REDACTED]")
            .field(
                "anti_csrf_token",
                &self.anti_csrf_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("expiry_time", &self.expiry_time)
            .field("time_created", &self.time_created)
            .finish()
    }
}

/// Result of one issuance call.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedToken {
    pub token: String,
    pub expiry_time: i64,
    pub time_created: i64,
}

impl fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedToken")
            .field("token", &"[REDACTED]")
            .field("expiry_time", &self.expiry_time)
            .field("time_created", &self.time_created)
            .finish()
    }
}

/// Outcome of verifying a presented access token.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenVerification {
    Valid(AccessTokenClaims),
    /// The client must run the refresh flow. Never a server fault.
    MustRefresh(RefreshReason),
}

impl TokenVerification {
    pub fn claims(&self) -> Option<&AccessTokenClaims> {
        match self {
            TokenVerification::Valid(claims) => Some(claims),
            TokenVerification::MustRefresh(_) => None,
        }
    }

    pub fn refresh_reason(&self) -> Option<RefreshReason> {
        match self {
            TokenVerification::Valid(_) => None,
            TokenVerification::MustRefresh(reason) => Some(*reason),
        }
    }

    pub fn into_claims(self) -> Option<AccessTokenClaims> {
        match self {
            TokenVerification::Valid(claims) => Some(claims),
            TokenVerification::MustRefresh(_) => None,
        }
    }
}
