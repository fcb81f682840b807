//! In-memory [`SessionStore`].
//!
//! All operations take the same mutex, which gives `rotate` and
//! `revoke_if_active` the same all-or-nothing behaviour as the Postgres
//! transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::store::SessionStore;
use crate::auth::AuthError;
use crate::models::SessionRecord;

/// Vector-backed session store; insertion order breaks `created_at` ties.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    rows: Mutex<Vec<SessionRecord>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every record currently held, in insertion order.
    pub async fn snapshot(&self) -> Vec<SessionRecord> {
        self.rows.lock().await.clone()
    }

    fn revoke_row(row: &mut SessionRecord, replaced_by: Option<&str>, at: DateTime<Utc>) {
        row.is_revoked = true;
        row.revoked_at = Some(at);
        row.replaced_by_token = replaced_by.map(str::to_string);
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn insert(&self, record: &SessionRecord) -> Result<(), AuthError> {
        let mut rows = self.rows.lock().await;
        if rows.iter().any(|r| r.token_hash == record.token_hash) {
            return Err(AuthError::Internal("duplicate session token hash".into()));
        }
        rows.push(record.clone());
        Ok(())
    }

    async fn find_by_hash(&self, token_hash: &str) -> Result<Option<SessionRecord>, AuthError> {
        let rows = self.rows.lock().await;
        Ok(rows.iter().find(|r| r.token_hash == token_hash).cloned())
    }

    async fn active_for_user(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<SessionRecord>, AuthError> {
        let rows = self.rows.lock().await;
        let mut active: Vec<SessionRecord> = rows
            .iter()
            .filter(|r| r.user_id == user_id && r.is_active(now))
            .cloned()
            .collect();
        // Stable sort keeps insertion order for equal timestamps.
        active.sort_by_key(|r| r.created_at);
        Ok(active)
    }

    async fn revoke_if_active(
        &self,
        token_hash: &str,
        replaced_by: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<bool, AuthError> {
        let mut rows = self.rows.lock().await;
        match rows
            .iter_mut()
            .find(|r| r.token_hash == token_hash && !r.is_revoked)
        {
            Some(row) => {
                Self::revoke_row(row, replaced_by, at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn rotate(
        &self,
        old_hash: &str,
        user_id: &str,
        replaced_by: &str,
        successor: &SessionRecord,
        at: DateTime<Utc>,
    ) -> Result<bool, AuthError> {
        let mut rows = self.rows.lock().await;
        if rows.iter().any(|r| r.token_hash == successor.token_hash) {
            return Err(AuthError::Internal("duplicate session token hash".into()));
        }
        let Some(old) = rows
            .iter_mut()
            .find(|r| r.token_hash == old_hash && r.user_id == user_id && !r.is_revoked)
        else {
            return Ok(false);
        };
        Self::revoke_row(old, Some(replaced_by), at);
        rows.push(successor.clone());
        Ok(true)
    }

    async fn revoke_ids(&self, ids: &[String], at: DateTime<Utc>) -> Result<u64, AuthError> {
        let mut rows = self.rows.lock().await;
        let mut changed = 0;
        for row in rows
            .iter_mut()
            .filter(|r| !r.is_revoked && ids.contains(&r.id))
        {
            Self::revoke_row(row, None, at);
            changed += 1;
        }
        Ok(changed)
    }

    async fn revoke_all_for_user(
        &self,
        user_id: &str,
        at: DateTime<Utc>,
    ) -> Result<u64, AuthError> {
        let mut rows = self.rows.lock().await;
        let mut changed = 0;
        for row in rows
            .iter_mut()
            .filter(|r| !r.is_revoked && r.user_id == user_id)
        {
            Self::revoke_row(row, None, at);
            changed += 1;
        }
        Ok(changed)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, AuthError> {
        let mut rows = self.rows.lock().await;
        let before = rows.len();
        rows.retain(|r| r.expires_at > now);
        Ok((before - rows.len()) as u64)
    }
}
