//! Service test harness
//!
//! Wires a signing key store, a clock, a [`SigningKeyManager`] and an
//! [`AccessTokenService`] together the way a host process would.

use chrono::Duration;
use common::clock::{Clock, ManualClock, SystemClock};
use session_service::config::Config;
use session_service::errors::SessionError;
use session_service::models::TokenVerification;
use session_service::repositories::{InMemorySigningKeyStore, SigningKeyStore};
use session_service::services::{AccessTokenService, SigningKeyManager};
use std::sync::Arc;

/// One service instance plus handles to its collaborators.
///
/// # Example
/// ```rust,ignore
/// let harness = TestSessionHarness::new();
/// let issued = TestClaimsBuilder::new().issue(&harness.service).await?;
///
/// harness.advance(Duration::hours(2));
/// harness
///     .verify(&issued.token)
///     .await?
///     .assert_must_refresh(RefreshReason::Expired);
/// ```
pub struct TestSessionHarness {
    pub config: Config,
    pub store: Arc<dyn SigningKeyStore>,
    pub key_manager: Arc<SigningKeyManager>,
    pub service: AccessTokenService,
    clock: Arc<dyn Clock>,
    manual_clock: Option<ManualClock>,
}

impl TestSessionHarness {
    /// Default configuration, empty in-memory store, manual clock at now.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        Self::with_store(config, Arc::new(InMemorySigningKeyStore::new()))
    }

    /// Manual clock at now over the given store.
    pub fn with_store(config: Config, store: Arc<dyn SigningKeyStore>) -> Self {
        let manual_clock = ManualClock::starting_now();
        Self::build(config, store, Arc::new(manual_clock.clone()), Some(manual_clock))
    }

    /// Real wall clock, for tests that sleep.
    pub fn with_system_clock(config: Config) -> Self {
        Self::with_system_clock_and_store(config, Arc::new(InMemorySigningKeyStore::new()))
    }

    /// Real wall clock over the given store, for tests that move stored
    /// timestamps instead of the clock.
    pub fn with_system_clock_and_store(config: Config, store: Arc<dyn SigningKeyStore>) -> Self {
        Self::build(config, store, Arc::new(SystemClock), None)
    }

    fn build(
        config: Config,
        store: Arc<dyn SigningKeyStore>,
        clock: Arc<dyn Clock>,
        manual_clock: Option<ManualClock>,
    ) -> Self {
        let key_manager = Arc::new(
            SigningKeyManager::from_config(store.clone(), clock.clone(), &config)
                .expect("harness config should be valid"),
        );
        let service = AccessTokenService::from_config(key_manager.clone(), clock.clone(), &config)
            .expect("harness config should be valid");

        Self {
            config,
            store,
            key_manager,
            service,
            clock,
            manual_clock,
        }
    }

    /// Another instance sharing this one's store and clock, with its own
    /// in-memory key cache. Models a second process behind the same store.
    pub fn second_instance(&self) -> Self {
        Self::build(
            self.config.clone(),
            self.store.clone(),
            self.clock.clone(),
            self.manual_clock.clone(),
        )
    }

    /// Advance the manual clock.
    ///
    /// # Panics
    /// If the harness was built with the system clock.
    pub fn advance(&self, by: Duration) {
        self.manual_clock
            .as_ref()
            .expect("advance() requires a harness with a manual clock")
            .advance(by);
    }

    pub fn now(&self) -> chrono::DateTime<chrono::Utc> {
        self.clock.now()
    }

    /// Advance just past the signing key update interval.
    pub fn advance_past_rotation_interval(&self) {
        let interval = Duration::from_std(self.config.signing_key_update_interval)
            .expect("interval fits chrono");
        self.advance(interval + Duration::milliseconds(1));
    }

    pub async fn verify(&self, token: &str) -> Result<TokenVerification, SessionError> {
        self.service.get_info_from_access_token(token, false).await
    }
}

impl Default for TestSessionHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Config with the given validity and update interval, in seconds.
///
/// Retention follows validity, as when loading from the environment.
pub fn test_config(validity_seconds: f64, update_interval_seconds: f64) -> Config {
    let access_token_validity = std::time::Duration::from_secs_f64(validity_seconds);
    let signing_key_update_interval = std::time::Duration::from_secs_f64(update_interval_seconds);
    Config {
        access_token_validity,
        signing_key_update_interval,
        previous_key_retention: access_token_validity,
        key_rotation_check_interval: signing_key_update_interval
            .min(std::time::Duration::from_secs(60)),
        ..Config::default()
    }
}
