//! Postgres [`SessionStore`] over the `sessions` table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgExecutor, PgPool};

use super::store::SessionStore;
use crate::auth::AuthError;
use crate::models::SessionRecord;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id::text AS id, token_hash, user_id::text AS user_id, expires_at, \
                       is_revoked, revoked_at, replaced_by_token, user_agent, ip_address, \
                       created_at";

#[derive(Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

async fn insert_with<'e, E: PgExecutor<'e>>(
    executor: E,
    record: &SessionRecord,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO sessions \
         (id, token_hash, user_id, expires_at, is_revoked, user_agent, ip_address, created_at) \
         VALUES ($1::uuid, $2, $3::uuid, $4, FALSE, $5, $6, $7)",
    )
    .bind(&record.id)
    .bind(&record.token_hash)
    .bind(&record.user_id)
    .bind(record.expires_at)
    .bind(&record.user_agent)
    .bind(&record.ip_address)
    .bind(record.created_at)
    .execute(executor)
    .await?;
    Ok(())
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn insert(&self, record: &SessionRecord) -> Result<(), AuthError> {
        insert_with(&self.pool, record).await?;
        Ok(())
    }

    async fn find_by_hash(&self, token_hash: &str) -> Result<Option<SessionRecord>, AuthError> {
        let query = format!("SELECT {COLUMNS} FROM sessions WHERE token_hash = $1");
        let row = sqlx::query_as::<_, SessionRecord>(&query)
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn active_for_user(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<SessionRecord>, AuthError> {
        let query = format!(
            "SELECT {COLUMNS} FROM sessions \
             WHERE user_id = $1::uuid AND is_revoked = FALSE AND expires_at > $2 \
             ORDER BY created_at ASC, id ASC"
        );
        let rows = sqlx::query_as::<_, SessionRecord>(&query)
            .bind(user_id)
            .bind(now)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn revoke_if_active(
        &self,
        token_hash: &str,
        replaced_by: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<bool, AuthError> {
        let result = sqlx::query(
            "UPDATE sessions SET is_revoked = TRUE, revoked_at = $2, replaced_by_token = $3 \
             WHERE token_hash = $1 AND is_revoked = FALSE",
        )
        .bind(token_hash)
        .bind(at)
        .bind(replaced_by)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn rotate(
        &self,
        old_hash: &str,
        user_id: &str,
        replaced_by: &str,
        successor: &SessionRecord,
        at: DateTime<Utc>,
    ) -> Result<bool, AuthError> {
        let mut tx = self.pool.begin().await?;

        // Row lock: a concurrent rotation of the same hash waits here, then
        // re-evaluates `is_revoked` and matches nothing.
        let result = sqlx::query(
            "UPDATE sessions SET is_revoked = TRUE, revoked_at = $3, replaced_by_token = $4 \
             WHERE token_hash = $1 AND user_id = $2::uuid AND is_revoked = FALSE",
        )
        .bind(old_hash)
        .bind(user_id)
        .bind(at)
        .bind(replaced_by)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        insert_with(&mut *tx, successor).await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn revoke_ids(&self, ids: &[String], at: DateTime<Utc>) -> Result<u64, AuthError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query(
            "UPDATE sessions SET is_revoked = TRUE, revoked_at = $2 \
             WHERE id = ANY($1::uuid[]) AND is_revoked = FALSE",
        )
        .bind(ids)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn revoke_all_for_user(
        &self,
        user_id: &str,
        at: DateTime<Utc>,
    ) -> Result<u64, AuthError> {
        let result = sqlx::query(
            "UPDATE sessions SET is_revoked = TRUE, revoked_at = $2 \
             WHERE user_id = $1::uuid AND is_revoked = FALSE",
        )
        .bind(user_id)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, AuthError> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
