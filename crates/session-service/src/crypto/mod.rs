use crate::errors::SessionError;
use crate::models::SigningKey;
use ring::{
    hmac,
    rand::{SecureRandom, SystemRandom},
};
use tracing::instrument;

/// HMAC-SHA256 key length in bytes.
///
/// Matches the hash output size, the length recommended for HMAC keys.
pub const SIGNING_KEY_LENGTH: usize = 32;

/// HMAC-SHA256 tag length in bytes.
pub const SIGNATURE_LENGTH: usize = 32;

/// Generate cryptographically secure random bytes
pub fn generate_random_bytes(len: usize) -> Result<Vec<u8>, SessionError> {
    let rng = SystemRandom::new();
    let mut bytes = vec![0u8; len];
    rng.fill(&mut bytes)
        .map_err(|e| SessionError::Crypto(format!("Random bytes generation failed: {}", e)))?;
    Ok(bytes)
}

/// Generate fresh HMAC key material using CSPRNG
#[instrument(skip_all)]
pub fn generate_key_material() -> Result<Vec<u8>, SessionError> {
    generate_random_bytes(SIGNING_KEY_LENGTH)
}

/// Compute the HMAC-SHA256 tag of `payload` under `key`.
#[instrument(skip_all)]
pub fn sign_payload(key: &SigningKey, payload: &[u8]) -> Vec<u8> {
    let hmac_key = hmac::Key::new(hmac::HMAC_SHA256, key.expose_bytes());
    hmac::sign(&hmac_key, payload).as_ref().to_vec()
}

/// Recompute the tag of `payload` and compare it to `signature`.
///
/// `hmac::verify` compares in constant time, so the time taken does not
/// reveal how many leading bytes of a forged signature were correct.
#[instrument(skip_all)]
pub fn verify_signature(key: &SigningKey, payload: &[u8], signature: &[u8]) -> bool {
    let hmac_key = hmac::Key::new(hmac::HMAC_SHA256, key.expose_bytes());
    hmac::verify(&hmac_key, payload, signature).is_ok()
}
