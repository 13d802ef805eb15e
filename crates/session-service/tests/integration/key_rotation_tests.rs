//! Signing key rotation as seen through issuance and verification.

use chrono::Duration;
use session_service::errors::RefreshReason;
use session_service::repositories::{InMemorySigningKeyStore, SigningKeyStore};
use session_test_utils::*;
use std::sync::Arc;

#[tokio::test]
async fn test_signing_key_stable_within_short_interval() -> Result<(), anyhow::Error> {
    let harness = TestSessionHarness::with_system_clock(test_config(3600.0, 1.0));

    let before = harness.key_manager.get_signing_key().await?;
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    let after = harness.key_manager.get_signing_key().await?;

    assert!(before.same_material(&after));
    Ok(())
}

#[tokio::test]
async fn test_repeated_reads_within_interval_return_same_key() -> Result<(), anyhow::Error> {
    let harness = TestSessionHarness::with_config(test_config(3600.0, 0.5));
    let first = harness.key_manager.get_signing_key().await?;

    for _ in 0..5 {
        harness.advance(Duration::milliseconds(100));
        let again = harness.key_manager.get_signing_key().await?;
        assert!(first.same_material(&again));
    }

    harness.advance(Duration::milliseconds(1));
    let rotated = harness.key_manager.get_signing_key().await?;
    assert_eq!(rotated.version, first.version + 1);
    assert!(!first.same_material(&rotated));
    Ok(())
}

#[tokio::test]
async fn test_old_tokens_verify_after_rotation_until_expiry() -> Result<(), anyhow::Error> {
    // Validity longer than the rotation interval.
    let harness = TestSessionHarness::with_config(test_config(10.0, 2.0));
    let old = TestClaimsBuilder::new().issue(&harness.service).await?;

    harness.advance(Duration::seconds(3));
    let new = TestClaimsBuilder::new().issue(&harness.service).await?;
    assert_eq!(harness.key_manager.current_key_version().await, Some(2));

    harness.verify(&old.token).await?.assert_valid();
    harness.verify(&new.token).await?.assert_valid();

    // The old token reaches its own expiry.
    harness.advance(Duration::seconds(7));
    harness
        .verify(&old.token)
        .await?
        .assert_must_refresh(RefreshReason::Expired);
    harness.verify(&new.token).await?.assert_valid();
    Ok(())
}

#[tokio::test]
async fn test_token_outlives_several_rotations_until_expiry() -> Result<(), anyhow::Error> {
    let harness = TestSessionHarness::with_config(test_config(60.0, 2.0));
    let oldest = TestClaimsBuilder::new().issue(&harness.service).await?;

    harness.advance(Duration::seconds(3));
    TestClaimsBuilder::new().issue(&harness.service).await?;
    harness.advance(Duration::seconds(3));
    TestClaimsBuilder::new().issue(&harness.service).await?;
    assert_eq!(harness.key_manager.current_key_version().await, Some(3));

    harness.verify(&oldest.token).await?.assert_valid();

    // Still inside the signing key's window but past the token's own expiry.
    harness.advance(Duration::seconds(54));
    harness
        .verify(&oldest.token)
        .await?
        .assert_must_refresh(RefreshReason::Expired);
    Ok(())
}

#[tokio::test]
async fn test_short_interval_keeps_every_unexpired_token_valid() -> Result<(), anyhow::Error> {
    let harness = TestSessionHarness::with_config(test_config(10.0, 1.0));
    let mut issued = vec![TestClaimsBuilder::new().issue(&harness.service).await?];

    for _ in 0..2 {
        harness.advance(Duration::milliseconds(1_100));
        issued.push(TestClaimsBuilder::new().issue(&harness.service).await?);
    }
    assert_eq!(harness.key_manager.current_key_version().await, Some(3));

    for token in &issued {
        harness.verify(&token.token).await?.assert_valid();
    }
    Ok(())
}

#[tokio::test]
async fn test_lagging_instance_rejects_key_past_its_window() -> Result<(), anyhow::Error> {
    let mut config = test_config(60.0, 10.0);
    config.previous_key_retention = std::time::Duration::from_secs(5);
    let first = TestSessionHarness::with_config(config);
    let second = first.second_instance();

    let oldest = TestClaimsBuilder::new().issue(&first.service).await?;
    second.verify(&oldest.token).await?.assert_valid();
    assert_eq!(second.key_manager.current_key_version().await, Some(1));

    for _ in 0..2 {
        first.advance_past_rotation_interval();
        TestClaimsBuilder::new().issue(&first.service).await?;
    }

    // The token itself is unexpired, but v1 was retired 10s ago.
    second
        .verify(&oldest.token)
        .await?
        .assert_must_refresh(RefreshReason::UnknownKeyVersion);
    assert_eq!(second.key_manager.current_key_version().await, Some(3));
    Ok(())
}

#[tokio::test]
async fn test_previous_key_ages_out_after_retention() -> Result<(), anyhow::Error> {
    let mut config = test_config(60.0, 2.0);
    config.previous_key_retention = std::time::Duration::from_secs(5);
    let harness = TestSessionHarness::with_config(config);
    let old = TestClaimsBuilder::new().issue(&harness.service).await?;

    harness.advance(Duration::seconds(3));
    TestClaimsBuilder::new().issue(&harness.service).await?;

    harness.advance(Duration::seconds(4));
    harness.verify(&old.token).await?.assert_valid();

    harness.advance(Duration::seconds(1));
    harness
        .verify(&old.token)
        .await?
        .assert_must_refresh(RefreshReason::UnknownKeyVersion);
    Ok(())
}

#[tokio::test]
async fn test_idle_instance_rotates_on_next_issuance() -> Result<(), anyhow::Error> {
    let harness = TestSessionHarness::with_config(test_config(3600.0, 60.0));
    TestClaimsBuilder::new().issue(&harness.service).await?;

    harness.advance(Duration::days(3));
    TestClaimsBuilder::new().issue(&harness.service).await?;

    assert_eq!(harness.key_manager.current_key_version().await, Some(2));
    Ok(())
}

#[tokio::test]
async fn test_instances_sharing_store_verify_each_others_tokens() -> Result<(), anyhow::Error> {
    let first = TestSessionHarness::with_config(test_config(60.0, 10.0));
    let second = first.second_instance();

    let from_first = TestClaimsBuilder::new().issue(&first.service).await?;
    second.verify(&from_first.token).await?.assert_valid();

    // The first instance rotates; the second has not seen the new key yet.
    first.advance_past_rotation_interval();
    let after_rotation = TestClaimsBuilder::new().issue(&first.service).await?;
    second.verify(&after_rotation.token).await?.assert_valid();
    second.verify(&from_first.token).await?.assert_valid();

    // The second instance signs with the key the first one wrote.
    let from_second = TestClaimsBuilder::new().issue(&second.service).await?;
    first.verify(&from_second.token).await?.assert_valid();
    assert_eq!(second.key_manager.current_key_version().await, Some(2));
    Ok(())
}

#[tokio::test]
async fn test_fresh_key_written_elsewhere_is_adopted() -> Result<(), anyhow::Error> {
    let store = Arc::new(InMemorySigningKeyStore::new());
    let harness = TestSessionHarness::with_store(test_config(60.0, 10.0), store.clone());
    let now = harness.now();
    let record = test_signing_key_record(9, 12, now);
    assert!(store.write_new_key_if_still_current(None, &record).await?);

    let key = harness.key_manager.get_signing_key().await?;

    assert!(key.same_material(&test_signing_key(9, 12, now)?));
    assert_eq!(store.records().await.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_purge_keeps_verifiable_keys() -> Result<(), anyhow::Error> {
    let store = Arc::new(InMemorySigningKeyStore::new());
    let harness = TestSessionHarness::with_store(test_config(5.0, 2.0), store.clone());
    let old = TestClaimsBuilder::new().issue(&harness.service).await?;

    harness.advance(Duration::seconds(3));
    TestClaimsBuilder::new().issue(&harness.service).await?;

    assert_eq!(harness.key_manager.purge_retired_keys().await?, 0);
    harness.verify(&old.token).await?.assert_valid();

    harness.advance(Duration::seconds(6));
    assert_eq!(harness.key_manager.purge_retired_keys().await?, 1);
    assert_eq!(store.records().await.len(), 1);
    Ok(())
}
