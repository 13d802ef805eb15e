//! Signing key persistence.
//!
//! The store is the only channel through which process instances agree on
//! the current signing key. Every implementation must make
//! [`SigningKeyStore::write_new_key_if_still_current`] atomic: of two
//! concurrent writers expecting the same old version, exactly one succeeds.

pub mod memory;
pub mod signing_keys;

use crate::errors::SessionError;
use crate::models::SigningKeyRecord;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub use memory::InMemorySigningKeyStore;
pub use signing_keys::PgSigningKeyStore;

#[async_trait]
pub trait SigningKeyStore: Send + Sync {
    /// The record with the highest version, if any key was ever written.
    async fn read_current_key(&self) -> Result<Option<SigningKeyRecord>, SessionError>;

    /// Write `new_key` if the current version is still `expected_old_version`
    /// (`None` meaning the store is empty). The superseded key gets
    /// `retired_at = new_key.created_at`.
    ///
    /// Returns `Ok(false)` when a concurrent rotation won. That is not an
    /// error: the caller reads back the winner.
    async fn write_new_key_if_still_current(
        &self,
        expected_old_version: Option<i64>,
        new_key: &SigningKeyRecord,
    ) -> Result<bool, SessionError>;

    /// A specific retired (or current) record by version.
    async fn read_previous_key(
        &self,
        version: i64,
    ) -> Result<Option<SigningKeyRecord>, SessionError>;

    /// Delete keys retired strictly before `retired_before`. The current key
    /// is never deleted. Returns the number of records removed.
    async fn purge_retired_keys(&self, retired_before: DateTime<Utc>) -> Result<u64, SessionError>;
}
