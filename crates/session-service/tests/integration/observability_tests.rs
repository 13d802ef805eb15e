//! Metrics emitted by issuance, verification and rotation.
//!
//! Uses a thread-local debugging recorder and a current-thread runtime so
//! recorded values are isolated from other tests.

use chrono::Duration;
use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
use session_test_utils::*;
use std::future::Future;

fn with_recorder<F: Future<Output = ()>>(test: impl FnOnce() -> F) -> Snapshotter {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    metrics::with_local_recorder(&recorder, || {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
            .block_on(test());
    });

    snapshotter
}

fn counter(snapshotter: &Snapshotter, name: &str, labels: &[(&str, &str)]) -> u64 {
    snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .filter(|(key, _, _, _)| key.key().name() == name)
        .filter(|(key, _, _, _)| {
            labels.iter().all(|(k, v)| {
                key.key()
                    .labels()
                    .any(|label| label.key() == *k && label.value() == *v)
            })
        })
        .map(|(_, _, _, value)| match value {
            DebugValue::Counter(count) => count,
            _ => 0,
        })
        .sum()
}

#[test]
fn test_issuance_and_validation_counters() {
    let snapshotter = with_recorder(|| async {
        let harness = TestSessionHarness::new();
        let issued = TestClaimsBuilder::new().issue(&harness.service).await.unwrap();

        harness.verify(&issued.token).await.unwrap();
        harness.verify("token").await.unwrap();
        harness.advance(Duration::hours(2));
        harness.verify(&issued.token).await.unwrap();
    });

    assert_eq!(
        counter(
            &snapshotter,
            "session_access_token_issuance_total",
            &[("status", "success")]
        ),
        1
    );
    assert_eq!(
        counter(
            &snapshotter,
            "session_access_token_validations_total",
            &[("status", "success")]
        ),
        1
    );
    assert_eq!(
        counter(
            &snapshotter,
            "session_access_token_validations_total",
            &[("status", "rejected"), ("reason", "malformed")]
        ),
        1
    );
    assert_eq!(
        counter(
            &snapshotter,
            "session_access_token_validations_total",
            &[("status", "rejected"), ("reason", "expired")]
        ),
        1
    );
}

#[test]
fn test_rotation_counters() {
    let snapshotter = with_recorder(|| async {
        let harness = TestSessionHarness::with_config(test_config(60.0, 10.0));
        harness.key_manager.get_signing_key().await.unwrap();
        harness.advance_past_rotation_interval();
        harness.key_manager.get_signing_key().await.unwrap();
    });

    // The very first key also counts as a successful rotation.
    assert_eq!(
        counter(
            &snapshotter,
            "session_signing_key_rotations_total",
            &[("status", "success")]
        ),
        2
    );
    assert_eq!(
        counter(
            &snapshotter,
            "session_signing_key_rotations_total",
            &[("status", "lost_race")]
        ),
        0
    );
}

#[test]
fn test_storage_errors_are_counted() {
    let snapshotter = with_recorder(|| async {
        let store = std::sync::Arc::new(FaultInjectingKeyStore::new());
        store.set_fail_reads(true);
        let harness = TestSessionHarness::with_store(test_config(60.0, 10.0), store.clone());

        assert!(TestClaimsBuilder::new().issue(&harness.service).await.is_err());
    });

    assert_eq!(
        counter(
            &snapshotter,
            "session_errors_total",
            &[("operation", "create_access_token"), ("error_category", "transient")]
        ),
        1
    );
    assert_eq!(
        counter(
            &snapshotter,
            "session_access_token_issuance_total",
            &[("status", "error")]
        ),
        1
    );
}
