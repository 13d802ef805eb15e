//! Chaos tests for key rotation under concurrent load
//!
//! These tests validate that rotation stays consistent when:
//! - Many callers hit the rotation boundary at once
//! - Several instances share one store
//! - Issuance and verification run while keys rotate

use futures::future::join_all;
use session_service::repositories::InMemorySigningKeyStore;
use session_test_utils::*;
use std::collections::HashSet;
use std::sync::Arc;

/// N parallel callers at the rotation boundary all observe one new key.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_callers_agree_on_rotated_key() -> Result<(), anyhow::Error> {
    let store = Arc::new(InMemorySigningKeyStore::new());
    let harness = Arc::new(TestSessionHarness::with_store(
        test_config(60.0, 10.0),
        store.clone(),
    ));
    harness.key_manager.get_signing_key().await?;
    harness.advance_past_rotation_interval();

    let tasks = (0..64).map(|_| {
        let harness = harness.clone();
        tokio::spawn(async move { harness.key_manager.get_signing_key().await })
    });
    let keys = join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.expect("task panicked"))
        .collect::<Result<Vec<_>, _>>()?;

    let versions: HashSet<u64> = keys.iter().map(|k| k.version).collect();
    assert_eq!(versions, HashSet::from([2]));
    let first = keys.first().unwrap();
    assert!(keys.iter().all(|k| k.same_material(first)));

    assert_eq!(store.unretired_count().await, 1);
    assert_eq!(store.records().await.len(), 2);
    Ok(())
}

/// Instances with separate caches race through the store's conditional
/// write; exactly one new key is written.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_instances_race_on_shared_store() -> Result<(), anyhow::Error> {
    let store = Arc::new(FaultInjectingKeyStore::new());
    let primary = TestSessionHarness::with_store(test_config(60.0, 10.0), store.clone());
    let instances: Vec<_> = (0..8).map(|_| Arc::new(primary.second_instance())).collect();
    primary.key_manager.get_signing_key().await?;
    primary.advance_past_rotation_interval();

    let tasks = instances.iter().map(|instance| {
        let instance = instance.clone();
        tokio::spawn(async move { instance.key_manager.get_signing_key().await })
    });
    let keys = join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.expect("task panicked"))
        .collect::<Result<Vec<_>, _>>()?;

    let first = keys.first().unwrap();
    assert_eq!(first.version, 2);
    assert!(keys.iter().all(|k| k.same_material(first)));
    assert_eq!(store.inner().unretired_count().await, 1);
    assert_eq!(store.inner().records().await.len(), 2);
    Ok(())
}

/// Tokens issued on either side of a rotation verify on every instance.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_issue_and_verify_across_rotation() -> Result<(), anyhow::Error> {
    let primary = Arc::new(TestSessionHarness::with_config(test_config(60.0, 10.0)));
    let replica = Arc::new(primary.second_instance());

    let before: Vec<_> = join_all((0..16).map(|_| {
        let primary = primary.clone();
        async move {
            TestClaimsBuilder::new()
                .for_session(&unique_session_handle())
                .issue(&primary.service)
                .await
        }
    }))
    .await
    .into_iter()
    .collect::<Result<_, _>>()?;

    primary.advance_past_rotation_interval();

    let after: Vec<_> = join_all((0..16).map(|i| {
        let issuer = if i % 2 == 0 {
            primary.clone()
        } else {
            replica.clone()
        };
        async move {
            TestClaimsBuilder::new()
                .for_session(&unique_session_handle())
                .issue(&issuer.service)
                .await
        }
    }))
    .await
    .into_iter()
    .collect::<Result<_, _>>()?;

    for issued in before.iter().chain(after.iter()) {
        primary.verify(&issued.token).await?.assert_valid();
        replica.verify(&issued.token).await?.assert_valid();
    }
    assert_eq!(primary.key_manager.current_key_version().await, Some(2));
    assert_eq!(replica.key_manager.current_key_version().await, Some(2));
    Ok(())
}
