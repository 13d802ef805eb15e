use crate::errors::SessionError;
use crate::models::SigningKeyRecord;
use crate::repositories::SigningKeyStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tokio::sync::Mutex;

/// Process-local store.
///
/// Suitable for a single instance and for tests. Instances that need to
/// share keys must share one `Arc<InMemorySigningKeyStore>` or use
/// [`super::PgSigningKeyStore`].
#[derive(Debug, Default)]
pub struct InMemorySigningKeyStore {
    keys: Mutex<BTreeMap<i64, SigningKeyRecord>>,
}

impl InMemorySigningKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with existing records, e.g. to simulate a key written by
    /// another instance.
    pub fn with_records(records: impl IntoIterator<Item = SigningKeyRecord>) -> Self {
        Self {
            keys: Mutex::new(
                records
                    .into_iter()
                    .map(|record| (record.key_version, record))
                    .collect(),
            ),
        }
    }

    /// All records, oldest first.
    pub async fn records(&self) -> Vec<SigningKeyRecord> {
        self.keys.lock().await.values().cloned().collect()
    }

    /// Number of records whose `retired_at` is unset.
    pub async fn unretired_count(&self) -> usize {
        self.keys
            .lock()
            .await
            .values()
            .filter(|record| record.retired_at.is_none())
            .count()
    }
}

#[async_trait]
impl SigningKeyStore for InMemorySigningKeyStore {
    async fn read_current_key(&self) -> Result<Option<SigningKeyRecord>, SessionError> {
        Ok(self
            .keys
            .lock()
            .await
            .last_key_value()
            .map(|(_, record)| record.clone()))
    }

    async fn write_new_key_if_still_current(
        &self,
        expected_old_version: Option<i64>,
        new_key: &SigningKeyRecord,
    ) -> Result<bool, SessionError> {
        let mut keys = self.keys.lock().await;

        let current_version = keys.last_key_value().map(|(version, _)| *version);
        if current_version != expected_old_version || keys.contains_key(&new_key.key_version) {
            return Ok(false);
        }

        if let Some(version) = current_version {
            if let Some(old) = keys.get_mut(&version) {
                old.retired_at = Some(new_key.created_at);
            }
        }

        let mut record = new_key.clone();
        record.retired_at = None;
        keys.insert(record.key_version, record);

        Ok(true)
    }

    async fn read_previous_key(
        &self,
        version: i64,
    ) -> Result<Option<SigningKeyRecord>, SessionError> {
        Ok(self.keys.lock().await.get(&version).cloned())
    }

    async fn purge_retired_keys(&self, retired_before: DateTime<Utc>) -> Result<u64, SessionError> {
        let mut keys = self.keys.lock().await;
        let current_version = keys.last_key_value().map(|(version, _)| *version);

        let before = keys.len();
        keys.retain(|version, record| {
            Some(*version) == current_version
                || record.retired_at.map_or(true, |at| at >= retired_before)
        });

        Ok((before - keys.len()) as u64)
    }
}
