//! Signing key stores with injectable faults
//!
//! [`FaultInjectingKeyStore`] wraps an in-memory store and can be told to
//! fail reads or writes, or to lose the next conditional write to a
//! simulated concurrent rotation. It also counts calls so tests can assert
//! when the store was (or was not) consulted.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use session_service::errors::SessionError;
use session_service::models::SigningKeyRecord;
use session_service::repositories::{InMemorySigningKeyStore, SigningKeyStore};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct FaultInjectingKeyStore {
    inner: InMemorySigningKeyStore,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    /// Written by a "competitor" just before the next conditional write.
    competitor: Mutex<Option<SigningKeyRecord>>,
    current_reads: AtomicUsize,
    previous_reads: AtomicUsize,
    writes: AtomicUsize,
}

impl FaultInjectingKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: impl IntoIterator<Item = SigningKeyRecord>) -> Self {
        Self {
            inner: InMemorySigningKeyStore::with_records(records),
            ..Self::default()
        }
    }

    pub fn inner(&self) -> &InMemorySigningKeyStore {
        &self.inner
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make the next conditional write lose to `winner`, which is written
    /// first as if by another instance.
    pub fn lose_next_write_to(&self, winner: SigningKeyRecord) {
        *self.competitor.lock().unwrap() = Some(winner);
    }

    pub fn current_reads(&self) -> usize {
        self.current_reads.load(Ordering::SeqCst)
    }

    pub fn previous_reads(&self) -> usize {
        self.previous_reads.load(Ordering::SeqCst)
    }

    /// Total reads of any kind.
    pub fn reads(&self) -> usize {
        self.current_reads() + self.previous_reads()
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn check_reads(&self) -> Result<(), SessionError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(SessionError::Storage("injected read failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl SigningKeyStore for FaultInjectingKeyStore {
    async fn read_current_key(&self) -> Result<Option<SigningKeyRecord>, SessionError> {
        self.current_reads.fetch_add(1, Ordering::SeqCst);
        self.check_reads()?;
        self.inner.read_current_key().await
    }

    async fn write_new_key_if_still_current(
        &self,
        expected_old_version: Option<i64>,
        new_key: &SigningKeyRecord,
    ) -> Result<bool, SessionError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(SessionError::Storage("injected write failure".to_string()));
        }

        let competitor = self.competitor.lock().unwrap().take();
        if let Some(winner) = competitor {
            let written = self
                .inner
                .write_new_key_if_still_current(expected_old_version, &winner)
                .await?;
            assert!(written, "competitor write should have succeeded");
        }

        self.inner
            .write_new_key_if_still_current(expected_old_version, new_key)
            .await
    }

    async fn read_previous_key(
        &self,
        version: i64,
    ) -> Result<Option<SigningKeyRecord>, SessionError> {
        self.previous_reads.fetch_add(1, Ordering::SeqCst);
        self.check_reads()?;
        self.inner.read_previous_key(version).await
    }

    async fn purge_retired_keys(&self, retired_before: DateTime<Utc>) -> Result<u64, SessionError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(SessionError::Storage("injected purge failure".to_string()));
        }
        self.inner.purge_retired_keys(retired_before).await
    }
}
