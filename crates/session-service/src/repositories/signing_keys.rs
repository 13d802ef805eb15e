use crate::errors::SessionError;
use crate::models::SigningKeyRecord;
use crate::repositories::SigningKeyStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

/// Signing key store shared by every instance connected to one database.
#[derive(Debug, Clone)]
pub struct PgSigningKeyStore {
    pool: PgPool,
}

impl PgSigningKeyStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SigningKeyStore for PgSigningKeyStore {
    async fn read_current_key(&self) -> Result<Option<SigningKeyRecord>, SessionError> {
        let record = sqlx::query_as::<_, SigningKeyRecord>(
            r#"
            SELECT key_version, key_material, created_at, retired_at
            FROM access_token_signing_keys
            ORDER BY key_version DESC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| SessionError::Storage(format!("Failed to fetch current key: {}", e)))?;

        Ok(record)
    }

    async fn write_new_key_if_still_current(
        &self,
        expected_old_version: Option<i64>,
        new_key: &SigningKeyRecord,
    ) -> Result<bool, SessionError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| SessionError::Storage(format!("Failed to start transaction: {}", e)))?;

        let current_version: Option<i64> =
            sqlx::query_scalar("SELECT MAX(key_version) FROM access_token_signing_keys")
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| {
                    SessionError::Storage(format!("Failed to read current key version: {}", e))
                })?;

        if current_version != expected_old_version {
            // Dropping the transaction rolls it back.
            return Ok(false);
        }

        // The primary key makes two writers of the same version conflict
        // even if both passed the check above.
        let inserted = sqlx::query(
            r#"
            INSERT INTO access_token_signing_keys (key_version, key_material, created_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (key_version) DO NOTHING
            "#,
        )
        .bind(new_key.key_version)
        .bind(&new_key.key_material)
        .bind(new_key.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| SessionError::Storage(format!("Failed to insert signing key: {}", e)))?
        .rows_affected();

        if inserted == 0 {
            return Ok(false);
        }

        if let Some(old_version) = expected_old_version {
            sqlx::query(
                r#"
                UPDATE access_token_signing_keys
                SET retired_at = $2
                WHERE key_version = $1 AND retired_at IS NULL
                "#,
            )
            .bind(old_version)
            .bind(new_key.created_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| SessionError::Storage(format!("Failed to retire old key: {}", e)))?;
        }

        tx.commit()
            .await
            .map_err(|e| SessionError::Storage(format!("Failed to commit rotation: {}", e)))?;

        Ok(true)
    }

    async fn read_previous_key(
        &self,
        version: i64,
    ) -> Result<Option<SigningKeyRecord>, SessionError> {
        let record = sqlx::query_as::<_, SigningKeyRecord>(
            r#"
            SELECT key_version, key_material, created_at, retired_at
            FROM access_token_signing_keys
            WHERE key_version = $1
            "#,
        )
        .bind(version)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| SessionError::Storage(format!("Failed to fetch key by version: {}", e)))?;

        Ok(record)
    }

    async fn purge_retired_keys(&self, retired_before: DateTime<Utc>) -> Result<u64, SessionError> {
        let result = sqlx::query(
            r#"
            DELETE FROM access_token_signing_keys
            WHERE retired_at IS NOT NULL
                AND retired_at < $1
                AND key_version < (SELECT MAX(key_version) FROM access_token_signing_keys)
            "#,
        )
        .bind(retired_before)
        .execute(&self.pool)
        .await
        .map_err(|e| SessionError::Storage(format!("Failed to purge retired keys: {}", e)))?;

        Ok(result.rows_affected())
    }
}
