//! Rotation against the Postgres store.
//!
//! Run with `DATABASE_URL` set and `--ignored`.

use chrono::Duration;
use session_service::errors::{RefreshReason, SessionError};
use session_service::repositories::{PgSigningKeyStore, SigningKeyStore};
use session_test_utils::*;
use sqlx::PgPool;
use std::sync::Arc;

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_issue_and_verify_with_postgres_store(pool: PgPool) -> Result<(), anyhow::Error> {
    let store = Arc::new(PgSigningKeyStore::new(pool));
    let harness = TestSessionHarness::with_store(test_config(60.0, 10.0), store.clone());

    let issued = TestClaimsBuilder::new().issue(&harness.service).await?;
    harness.verify(&issued.token).await?.assert_valid();

    let other = harness.second_instance();
    other.verify(&issued.token).await?.assert_valid();
    assert_eq!(store.read_current_key().await?.unwrap().key_version, 1);
    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_two_instances_rotate_once(pool: PgPool) -> Result<(), anyhow::Error> {
    let store = Arc::new(PgSigningKeyStore::new(pool.clone()));
    let first = TestSessionHarness::with_store(test_config(60.0, 10.0), store.clone());
    let second = first.second_instance();
    first.key_manager.get_signing_key().await?;

    first.advance_past_rotation_interval();
    let (a, b) = tokio::join!(
        first.key_manager.get_signing_key(),
        second.key_manager.get_signing_key()
    );
    let (a, b) = (a?, b?);

    assert_eq!(a.version, 2);
    assert!(a.same_material(&b));

    let unretired: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM access_token_signing_keys WHERE retired_at IS NULL",
    )
    .fetch_one(&pool)
    .await?;
    assert_eq!(unretired, 1);
    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_backdated_key_is_rotated(pool: PgPool) -> Result<(), anyhow::Error> {
    let store = Arc::new(PgSigningKeyStore::new(pool.clone()));
    let harness = TestSessionHarness::with_system_clock_and_store(
        test_config(60.0, 3600.0),
        store.clone(),
    );
    let first = harness.key_manager.get_signing_key().await?;

    // A second process starting later sees the stale key and rotates.
    set_rotation_due(&pool, Duration::hours(1)).await?;
    let restarted = harness.second_instance();
    let rotated = restarted.key_manager.get_signing_key().await?;

    assert_eq!(rotated.version, first.version + 1);
    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_expired_retired_keys_purged(pool: PgPool) -> Result<(), anyhow::Error> {
    let store = Arc::new(PgSigningKeyStore::new(pool.clone()));
    let harness = TestSessionHarness::with_system_clock_and_store(
        test_config(60.0, 3600.0),
        store.clone(),
    );
    harness.key_manager.get_signing_key().await?;
    set_rotation_due(&pool, Duration::hours(1)).await?;
    harness.second_instance().key_manager.get_signing_key().await?;

    assert_eq!(harness.key_manager.purge_retired_keys().await?, 0);

    age_retired_keys(&pool, Duration::minutes(5)).await?;
    assert_eq!(harness.key_manager.purge_retired_keys().await?, 1);
    assert!(store.read_previous_key(1).await?.is_none());
    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_retired_key_window_follows_stored_retired_at(
    pool: PgPool,
) -> Result<(), anyhow::Error> {
    let store = Arc::new(PgSigningKeyStore::new(pool.clone()));
    let harness = TestSessionHarness::with_system_clock_and_store(
        test_config(60.0, 3600.0),
        store.clone(),
    );
    let old = TestClaimsBuilder::new().issue(&harness.service).await?;
    set_rotation_due(&pool, Duration::hours(1)).await?;
    harness.second_instance().key_manager.get_signing_key().await?;

    harness.second_instance().verify(&old.token).await?.assert_valid();

    age_retired_keys(&pool, Duration::minutes(5)).await?;
    harness
        .second_instance()
        .verify(&old.token)
        .await?
        .assert_must_refresh(RefreshReason::UnknownKeyVersion);
    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_corrupted_postgres_key_is_fatal(pool: PgPool) -> Result<(), anyhow::Error> {
    let store = Arc::new(PgSigningKeyStore::new(pool.clone()));
    let harness = TestSessionHarness::with_store(test_config(60.0, 10.0), store.clone());
    assert!(
        store
            .write_new_key_if_still_current(None, &truncated_key_record(1, harness.now()))
            .await?
    );

    let err = harness
        .key_manager
        .get_signing_key()
        .await
        .expect_err("corrupted key must not be used");

    assert!(matches!(err, SessionError::Configuration(_)));
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM access_token_signing_keys")
        .fetch_one(&pool)
        .await?;
    assert_eq!(count, 1, "corrupted key must not be replaced");
    Ok(())
}
