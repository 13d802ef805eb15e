//! Time manipulation utilities for key rotation tests
//!
//! Tests on the in-memory store drive time with
//! [`common::clock::ManualClock`]. Postgres-backed tests use a real clock,
//! so these helpers move stored timestamps into the past instead.

use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;

/// Set the creation time of the current signing key
///
/// # Example
/// ```rust,ignore
/// // Make the current key two hours old
/// set_current_key_created_at(&pool, Utc::now() - Duration::hours(2)).await?;
/// ```
pub async fn set_current_key_created_at(
    pool: &PgPool,
    timestamp: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE access_token_signing_keys
        SET created_at = $1
        WHERE key_version = (SELECT MAX(key_version) FROM access_token_signing_keys)
        "#,
    )
    .bind(timestamp)
    .execute(pool)
    .await?;

    Ok(())
}

/// Make the current key due for rotation under `update_interval`.
pub async fn set_rotation_due(pool: &PgPool, update_interval: Duration) -> Result<(), sqlx::Error> {
    set_current_key_created_at(pool, Utc::now() - update_interval - Duration::seconds(1)).await
}

/// Move every `retired_at` back by `by`, closing verification windows early.
pub async fn age_retired_keys(pool: &PgPool, by: Duration) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE access_token_signing_keys
        SET retired_at = retired_at - make_interval(secs => $1)
        WHERE retired_at IS NOT NULL
        "#,
    )
    .bind(by.num_milliseconds() as f64 / 1000.0)
    .execute(pool)
    .await?;

    Ok(())
}
