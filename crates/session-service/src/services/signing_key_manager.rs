//! Signing key lifecycle.
//!
//! Holds the current key (signs new tokens) and the superseded keys whose
//! verification window is still open. Rotation is decided lazily on read
//! from `(now, current.created_at, interval)`, so a process that was idle
//! across an interval still rotates on its next call.
//!
//! A superseded key verifies until `retired_at + previous_key_retention`,
//! where `retired_at` is its successor's creation time. With the default
//! retention equal to the token validity, no unexpired token outlives the
//! window of the key that signed it.
//!
//! Instances sharing one [`SigningKeyStore`] converge through conditional
//! writes: a writer that loses the race reads back the winner instead of
//! creating a second current key.

use crate::config::Config;
use crate::errors::SessionError;
use crate::models::SigningKey;
use crate::observability::metrics;
use crate::observability::ErrorCategory;
use crate::repositories::SigningKeyStore;
use chrono::{DateTime, Duration, Utc};
use common::clock::Clock;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone)]
struct RetiredKey {
    key: SigningKey,
    verify_until: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct KeyRing {
    current: Option<SigningKey>,
    /// Superseded keys by version.
    retired: BTreeMap<u64, RetiredKey>,
    /// Every version at or below this is closed or gone from the store.
    closed_through: u64,
}

impl KeyRing {
    /// `None` when the ring cannot answer without the store.
    fn lookup_retired(&self, version: u64, now: DateTime<Utc>) -> Option<Option<SigningKey>> {
        if version <= self.closed_through {
            return Some(None);
        }
        self.retired
            .get(&version)
            .map(|retired| (now < retired.verify_until).then(|| retired.key.clone()))
    }

    // Windows close in version order because `retired_at` grows with the
    // version and the purge removes the oldest keys first.
    fn close_through(&mut self, version: u64) {
        if version > self.closed_through {
            self.closed_through = version;
            self.retired = self.retired.split_off(&version.saturating_add(1));
        }
    }

    fn prune(&mut self, now: DateTime<Utc>) {
        let closed = self
            .retired
            .iter()
            .filter(|(_, retired)| now >= retired.verify_until)
            .map(|(version, _)| *version)
            .max();
        if let Some(version) = closed {
            self.close_through(version);
        }
    }
}

pub struct SigningKeyManager {
    store: Arc<dyn SigningKeyStore>,
    clock: Arc<dyn Clock>,
    update_interval: Duration,
    previous_key_retention: Duration,
    ring: RwLock<KeyRing>,
    /// Serializes rotation decisions within this process.
    rotation_lock: Mutex<()>,
}

impl SigningKeyManager {
    pub fn new(
        store: Arc<dyn SigningKeyStore>,
        clock: Arc<dyn Clock>,
        update_interval: std::time::Duration,
        previous_key_retention: std::time::Duration,
    ) -> Result<Self, SessionError> {
        Ok(Self {
            store,
            clock,
            update_interval: to_chrono(update_interval, "signing key update interval")?,
            previous_key_retention: to_chrono(previous_key_retention, "previous key retention")?,
            ring: RwLock::new(KeyRing::default()),
            rotation_lock: Mutex::new(()),
        })
    }

    pub fn from_config(
        store: Arc<dyn SigningKeyStore>,
        clock: Arc<dyn Clock>,
        config: &Config,
    ) -> Result<Self, SessionError> {
        Self::new(
            store,
            clock,
            config.signing_key_update_interval,
            config.previous_key_retention,
        )
    }

    /// The key to sign new tokens with, rotating first if it is due.
    ///
    /// Concurrent callers straddling a rotation boundary all receive the
    /// same new key.
    #[instrument(skip_all)]
    pub async fn get_signing_key(&self) -> Result<SigningKey, SessionError> {
        if let Some(key) = self.fresh_current(self.clock.now()).await {
            return Ok(key);
        }

        let _guard = self.rotation_lock.lock().await;

        // Another task may have rotated while we waited.
        let now = self.clock.now();
        if let Some(key) = self.fresh_current(now).await {
            return Ok(key);
        }

        let result = self.adopt_or_rotate(now).await;
        if let Err(e) = &result {
            let category = ErrorCategory::from(e);
            warn!(
                error_category = category.as_str(),
                error = %e,
                "Failed to obtain access token signing key"
            );
            metrics::record_error("get_signing_key", category.as_str());
        }
        result
    }

    /// Resolve the key a token claims to be signed with.
    ///
    /// `Ok(None)` means the version is unknown or its window has closed.
    /// That is an expected outcome of rotation, not a fault.
    #[instrument(skip_all, fields(key_version = version))]
    pub async fn get_key_for_version(
        &self,
        version: u64,
    ) -> Result<Option<SigningKey>, SessionError> {
        let now = self.clock.now();
        let cached = self.ring.read().await.current.clone();

        // No instance rotates before the cached key is due, so until then the
        // cache is authoritative for the current and any newer version.
        let current = match cached {
            Some(current)
                if version < current.version
                    || !current.is_rotation_due(now, self.update_interval) =>
            {
                current
            }
            _ => match self.refresh_current().await? {
                Some(current) => current,
                None => return Ok(None),
            },
        };

        match version.cmp(&current.version) {
            Ordering::Equal => Ok(Some(current)),
            Ordering::Greater => Ok(None),
            Ordering::Less => self.resolve_retired(version, now).await,
        }
    }

    /// Delete keys whose verification window has closed.
    #[instrument(skip_all)]
    pub async fn purge_retired_keys(&self) -> Result<u64, SessionError> {
        let cutoff = self.clock.now() - self.previous_key_retention;
        let purged = self.store.purge_retired_keys(cutoff).await?;
        if purged > 0 {
            info!(purged, "Purged retired access token signing keys");
            metrics::record_retired_keys_purged(purged);
        }
        Ok(purged)
    }

    /// Version of the in-memory current key, if one has been loaded.
    pub async fn current_key_version(&self) -> Option<u64> {
        self.ring.read().await.current.as_ref().map(|k| k.version)
    }

    async fn fresh_current(&self, now: DateTime<Utc>) -> Option<SigningKey> {
        self.ring
            .read()
            .await
            .current
            .as_ref()
            .filter(|key| !key.is_rotation_due(now, self.update_interval))
            .cloned()
    }

    /// Must be called with `rotation_lock` held.
    async fn adopt_or_rotate(&self, now: DateTime<Utc>) -> Result<SigningKey, SessionError> {
        let stored = self.store.read_current_key().await?;

        // A corrupted record is fatal. Replacing it would invalidate every
        // outstanding session.
        let stored_key = stored.as_ref().map(SigningKey::from_record).transpose()?;

        if let Some(key) = &stored_key {
            if !key.is_rotation_due(now, self.update_interval) {
                debug!(key_version = key.version, "Adopted signing key from store");
                self.install(key.clone(), None).await;
                return Ok(key.clone());
            }
        }

        let next_version = stored_key.as_ref().map_or(1, |key| key.version + 1);
        let new_key = SigningKey::generate(next_version, now)?;
        let expected_old_version = stored.as_ref().map(|record| record.key_version);

        let written = match self
            .store
            .write_new_key_if_still_current(expected_old_version, &new_key.to_record()?)
            .await
        {
            Ok(written) => written,
            Err(e) => {
                metrics::record_key_rotation("error");
                return Err(e);
            }
        };

        if written {
            info!(key_version = next_version, "Rotated access token signing key");
            metrics::record_key_rotation("success");
            self.install(new_key.clone(), stored_key).await;
            return Ok(new_key);
        }

        debug!(
            key_version = next_version,
            "Lost signing key rotation race, reading back winner"
        );
        metrics::record_key_rotation("lost_race");

        let winner = self.store.read_current_key().await?.ok_or_else(|| {
            SessionError::Storage("Signing key store empty after concurrent rotation".to_string())
        })?;
        let winner = SigningKey::from_record(&winner)?;
        self.install(winner.clone(), stored_key).await;
        Ok(winner)
    }

    /// Make `key` current unless a newer key is already installed.
    ///
    /// A superseded key whose direct successor is `key` is kept with its
    /// window. Older ones are resolved from the store on demand.
    async fn install(&self, key: SigningKey, predecessor: Option<SigningKey>) {
        let now = self.clock.now();
        let mut ring = self.ring.write().await;

        if let Some(current) = &ring.current {
            if current.version >= key.version {
                return;
            }
        }

        let verify_until = key.created_at + self.previous_key_retention;
        for superseded in [predecessor, ring.current.take()].into_iter().flatten() {
            if superseded.version.checked_add(1) == Some(key.version) {
                ring.retired.insert(
                    superseded.version,
                    RetiredKey {
                        key: superseded,
                        verify_until,
                    },
                );
            }
        }
        ring.prune(now);

        metrics::set_signing_key_age_seconds(age_seconds(now, &key));
        ring.current = Some(key);
    }

    async fn refresh_current(&self) -> Result<Option<SigningKey>, SessionError> {
        let Some(record) = self.store.read_current_key().await? else {
            return Ok(None);
        };
        let key = SigningKey::from_record(&record)?;
        self.install(key, None).await;
        Ok(self.ring.read().await.current.clone())
    }

    /// Resolve a version older than the current key. The window is measured
    /// from the store's `retired_at`, never from the local cache.
    async fn resolve_retired(
        &self,
        version: u64,
        now: DateTime<Utc>,
    ) -> Result<Option<SigningKey>, SessionError> {
        if let Some(known) = self.ring.read().await.lookup_retired(version, now) {
            return Ok(known);
        }

        let stored_version = i64::try_from(version).map_err(|_| {
            SessionError::Configuration(format!("Key version {} does not fit the store", version))
        })?;

        let Some(record) = self.store.read_previous_key(stored_version).await? else {
            // Purges remove the oldest keys first, so nothing below is left.
            self.ring.write().await.close_through(version);
            return Ok(None);
        };
        let Some(retired_at) = record.retired_at else {
            debug!(key_version = version, "Superseded signing key is not marked retired");
            return Ok(None);
        };
        let key = SigningKey::from_record(&record)?;
        if key.version != version {
            return Ok(None);
        }

        let verify_until = retired_at + self.previous_key_retention;
        let mut ring = self.ring.write().await;
        if now >= verify_until {
            ring.close_through(version);
            return Ok(None);
        }
        ring.retired.insert(
            version,
            RetiredKey {
                key: key.clone(),
                verify_until,
            },
        );
        Ok(Some(key))
    }
}

fn to_chrono(duration: std::time::Duration, name: &str) -> Result<Duration, SessionError> {
    Duration::from_std(duration)
        .map_err(|_| SessionError::Configuration(format!("{} is out of range", name)))
}

fn age_seconds(now: DateTime<Utc>, key: &SigningKey) -> f64 {
    (now - key.created_at).num_milliseconds() as f64 / 1000.0
}
