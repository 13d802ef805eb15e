//! Access token wire format.
//!
//! Format version 1 is eleven `.`-separated segments:
//!
//! ```text
//! 1.<session>.<user>.<rt_hash>.<parent_rt_hash>.<user_data>.<anti_csrf>.<expiry_ms>.<created_ms>.<key_version>.<signature>
//! ```
//!
//! String segments are base64url without padding, so they can never contain
//! the separator. An absent optional field is `~`, which is outside the
//! base64url alphabet and therefore distinct from an empty string. Numbers
//! are canonical decimal. The signature covers every byte before the final
//! separator.
//!
//! This module performs no cryptography. It only guarantees that
//! `decode(encode(claims, key_version))` yields the same claims and key
//! version, and that any structurally invalid input is rejected.

use crate::models::AccessTokenClaims;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use thiserror::Error;

/// Format revision written by [`encode_payload`].
pub const CURRENT_FORMAT_VERSION: u32 = 1;

/// Tokens above this size are rejected before any parsing.
pub const MAX_ACCESS_TOKEN_SIZE_BYTES: usize = 32 * 1024;

const SEPARATOR: char = '.';
const ABSENT: &str = "~";
const V1_SEGMENT_COUNT: usize = 11;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Malformed access token: {0}")]
    Malformed(String),

    /// A well-formed version tag this build cannot read. May be a token
    /// minted by a newer server.
    #[error("Unsupported access token format version: {0}")]
    UnsupportedVersion(u32),

    #[error("Access token claims could not be serialized: {0}")]
    Serialization(String),
}

/// A parsed but unverified token.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedToken<'a> {
    pub format_version: u32,
    pub claims: AccessTokenClaims,
    pub key_version: u64,
    pub signature: Vec<u8>,
    /// The exact bytes the signature was computed over.
    pub signed_payload: &'a str,
}

/// Encode claims and key version into the signed portion of a token.
pub fn encode_payload(claims: &AccessTokenClaims, key_version: u64) -> Result<String, CodecError> {
    let user_data = serde_json::to_vec(&claims.user_data)
        .map_err(|e| CodecError::Serialization(e.to_string()))?;

    let segments = [
        CURRENT_FORMAT_VERSION.to_string(),
        encode_text(&claims.session_handle),
        encode_text(&claims.user_id),
        encode_text(&claims.refresh_token_hash_1),
        encode_optional(claims.parent_refresh_token_hash_1.as_deref()),
        URL_SAFE_NO_PAD.encode(user_data),
        encode_optional(claims.anti_csrf_token.as_deref()),
        claims.expiry_time.to_string(),
        claims.time_created.to_string(),
        key_version.to_string(),
    ];

    Ok(segments.join("."))
}

/// Append a signature to an encoded payload.
pub fn attach_signature(payload: &str, signature: &[u8]) -> String {
    format!("{}{}{}", payload, SEPARATOR, URL_SAFE_NO_PAD.encode(signature))
}

/// Parse a token string without verifying it.
pub fn decode(token: &str) -> Result<DecodedToken<'_>, CodecError> {
    if token.len() > MAX_ACCESS_TOKEN_SIZE_BYTES {
        return Err(malformed("token exceeds maximum size"));
    }

    // The version tag decides how the rest is read, so check it first.
    let version_segment = token.split(SEPARATOR).next().unwrap_or_default();
    let format_version = parse_canonical_u32(version_segment)
        .ok_or_else(|| malformed("missing or non-numeric format version"))?;

    match format_version {
        1 => decode_v1(token),
        other => Err(CodecError::UnsupportedVersion(other)),
    }
}

fn decode_v1(token: &str) -> Result<DecodedToken<'_>, CodecError> {
    let (signed_payload, signature_segment) = token
        .rsplit_once(SEPARATOR)
        .ok_or_else(|| malformed("missing signature"))?;

    let segments: Vec<&str> = token.split(SEPARATOR).collect();
    let [_, session, user, rt_hash, parent_rt_hash, user_data, anti_csrf, expiry, created, key_version, _] =
        segments.as_slice()
    else {
        return Err(malformed(&format!(
            "expected {} segments, found {}",
            V1_SEGMENT_COUNT,
            segments.len()
        )));
    };

    let claims = AccessTokenClaims {
        session_handle: decode_text(session, "session handle")?,
        user_id: decode_text(user, "user id")?,
        refresh_token_hash_1: decode_text(rt_hash, "refresh token hash")?,
        parent_refresh_token_hash_1: decode_optional(parent_rt_hash, "parent refresh token hash")?,
        user_data: decode_user_data(user_data)?,
        anti_csrf_token: decode_optional(anti_csrf, "anti-CSRF token")?,
        expiry_time: parse_canonical_i64(expiry)
            .ok_or_else(|| malformed("invalid expiry time"))?,
        time_created: parse_canonical_i64(created)
            .ok_or_else(|| malformed("invalid creation time"))?,
    };

    if claims.refresh_token_hash_1.is_empty() {
        return Err(malformed("empty refresh token hash"));
    }
    if claims.expiry_time <= claims.time_created {
        return Err(malformed("expiry time not after creation time"));
    }

    let key_version = parse_canonical_u64(key_version)
        .filter(|v| *v > 0)
        .ok_or_else(|| malformed("invalid key version"))?;

    let signature = URL_SAFE_NO_PAD
        .decode(signature_segment)
        .map_err(|_| malformed("signature is not base64url"))?;
    if signature.is_empty() {
        return Err(malformed("empty signature"));
    }

    Ok(DecodedToken {
        format_version: 1,
        claims,
        key_version,
        signature,
        signed_payload,
    })
}

fn malformed(reason: &str) -> CodecError {
    CodecError::Malformed(reason.to_string())
}

fn encode_text(value: &str) -> String {
    URL_SAFE_NO_PAD.encode(value.as_bytes())
}

fn encode_optional(value: Option<&str>) -> String {
    match value {
        Some(v) => encode_text(v),
        None => ABSENT.to_string(),
    }
}

fn decode_text(segment: &str, field: &str) -> Result<String, CodecError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| malformed(&format!("{} is not base64url", field)))?;
    String::from_utf8(bytes).map_err(|_| malformed(&format!("{} is not UTF-8", field)))
}

fn decode_optional(segment: &str, field: &str) -> Result<Option<String>, CodecError> {
    if segment == ABSENT {
        return Ok(None);
    }
    decode_text(segment, field).map(Some)
}

fn decode_user_data(segment: &str) -> Result<serde_json::Value, CodecError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| malformed("user data is not base64url"))?;
    serde_json::from_slice(&bytes).map_err(|_| malformed("user data is not JSON"))
}

// Canonical parsing rejects "+1", "01", " 1" so a number has exactly one
// encoding.
fn parse_canonical_i64(segment: &str) -> Option<i64> {
    segment
        .parse::<i64>()
        .ok()
        .filter(|v| v.to_string() == segment)
}

fn parse_canonical_u64(segment: &str) -> Option<u64> {
    segment
        .parse::<u64>()
        .ok()
        .filter(|v| v.to_string() == segment)
}

fn parse_canonical_u32(segment: &str) -> Option<u32> {
    segment
        .parse::<u32>()
        .ok()
        .filter(|v| v.to_string() == segment)
}
