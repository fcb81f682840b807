//! Session ledger: the only authority on which refresh credentials are usable.
//!
//! Records are keyed by `SHA-256(token_id)`. A fast unsalted digest is enough
//! here because token ids are 64 random alphanumerics, and lookups need plain
//! equality on an indexed column.
//!
//! State per record:
//!
//! ```text
//! ACTIVE --rotate--> REVOKED { replaced_by_token }
//! ACTIVE --logout / logout-all / family / cap eviction--> REVOKED
//! ACTIVE --expires_at passed--> deleted on the next persist
//! ```

pub mod memory;
pub mod postgres;
pub mod store;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::auth::AuthError;
use crate::clock::Clock;
use crate::models::{ClientMetadata, SessionRecord};
use crate::uuid::uuidv7;

pub use memory::MemorySessionStore;
pub use postgres::PgSessionStore;
pub use store::SessionStore;

/// SHA-256 hex digest of a refresh token id.
pub fn hash_token_id(token_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token_id.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Result of [`SessionLedger::persist`].
#[derive(Debug, Clone)]
pub struct Persisted {
    pub session: SessionRecord,
    /// Sessions revoked to stay within the per-user cap.
    pub evicted: u64,
}

/// Records the lifecycle of every refresh session.
pub struct SessionLedger {
    store: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
    session_cap: usize,
}

impl SessionLedger {
    pub fn new(store: Arc<dyn SessionStore>, clock: Arc<dyn Clock>, session_cap: usize) -> Self {
        Self {
            store,
            clock,
            session_cap: session_cap.max(1),
        }
    }

    pub fn session_cap(&self) -> usize {
        self.session_cap
    }

    fn new_record(
        &self,
        user_id: &str,
        token_id: &str,
        expires_at: DateTime<Utc>,
        metadata: &ClientMetadata,
        now: DateTime<Utc>,
    ) -> SessionRecord {
        SessionRecord {
            id: uuidv7().to_string(),
            token_hash: hash_token_id(token_id),
            user_id: user_id.to_string(),
            expires_at,
            is_revoked: false,
            revoked_at: None,
            replaced_by_token: None,
            user_agent: metadata.user_agent.clone(),
            ip_address: metadata.ip_address.clone(),
            created_at: now,
        }
    }

    /// Delete rows past their expiry. Runs inline before every insert.
    pub async fn reclaim_expired(&self) -> Result<u64, AuthError> {
        let deleted = self.store.delete_expired(self.clock.now()).await?;
        if deleted > 0 {
            debug!(deleted, "reclaimed expired sessions");
        }
        Ok(deleted)
    }

    /// Record a new session for `token_id`, evicting the user's oldest active
    /// sessions first so that at most `session_cap` remain active afterwards.
    pub async fn persist(
        &self,
        user_id: &str,
        token_id: &str,
        expires_at: DateTime<Utc>,
        metadata: &ClientMetadata,
    ) -> Result<Persisted, AuthError> {
        self.reclaim_expired().await?;
        let now = self.clock.now();

        let active = self.store.active_for_user(user_id, now).await?;
        let overflow = (active.len() + 1).saturating_sub(self.session_cap);
        let evicted = if overflow > 0 {
            let ids: Vec<String> = active.iter().take(overflow).map(|r| r.id.clone()).collect();
            let evicted = self.store.revoke_ids(&ids, now).await?;
            info!(user_id, evicted, cap = self.session_cap, "session cap reached; evicted oldest sessions");
            evicted
        } else {
            0
        };

        let session = self.new_record(user_id, token_id, expires_at, metadata, now);
        self.store.insert(&session).await?;
        debug!(user_id, session_id = %session.id, "session persisted");
        Ok(Persisted { session, evicted })
    }

    /// The non-revoked record for `token_hash`, whatever its `expires_at`.
    /// Expiry is the caller's job, against the signed token's own claims.
    pub async fn find_active(&self, token_hash: &str) -> Result<Option<SessionRecord>, AuthError> {
        let record = self.store.find_by_hash(token_hash).await?;
        Ok(record.filter(|r| !r.is_revoked))
    }

    /// The record for `token_id` in any state.
    pub async fn find_by_token_id(&self, token_id: &str) -> Result<Option<SessionRecord>, AuthError> {
        self.store.find_by_hash(&hash_token_id(token_id)).await
    }

    /// Active sessions for a user, oldest first.
    pub async fn active_sessions(&self, user_id: &str) -> Result<Vec<SessionRecord>, AuthError> {
        self.store.active_for_user(user_id, self.clock.now()).await
    }

    /// Revoke the record for `token_id`. `replaced_by` is only set by rotation.
    /// Returns `false` when there was no active record to revoke.
    pub async fn revoke(&self, token_id: &str, replaced_by: Option<&str>) -> Result<bool, AuthError> {
        self.store
            .revoke_if_active(&hash_token_id(token_id), replaced_by, self.clock.now())
            .await
    }

    /// Atomically retire `old_token_id` in favour of `new_token_id`.
    ///
    /// Returns the successor record, or `None` when the old record was absent,
    /// already revoked or owned by someone else. Of two concurrent rotations
    /// of the same token at most one gets `Some`.
    pub async fn rotate(
        &self,
        old_token_id: &str,
        user_id: &str,
        new_token_id: &str,
        expires_at: DateTime<Utc>,
        metadata: &ClientMetadata,
    ) -> Result<Option<SessionRecord>, AuthError> {
        self.reclaim_expired().await?;
        let now = self.clock.now();
        let successor = self.new_record(user_id, new_token_id, expires_at, metadata, now);
        let rotated = self
            .store
            .rotate(
                &hash_token_id(old_token_id),
                user_id,
                new_token_id,
                &successor,
                now,
            )
            .await?;
        Ok(rotated.then_some(successor))
    }

    /// Revoke every active session for a user.
    pub async fn revoke_all(&self, user_id: &str) -> Result<u64, AuthError> {
        let revoked = self
            .store
            .revoke_all_for_user(user_id, self.clock.now())
            .await?;
        debug!(user_id, revoked, "revoked all sessions");
        Ok(revoked)
    }

    /// Resolve the owner of `token_id` (revoked or not) and revoke all of
    /// their sessions. Returns the owner and the count, or `None` if no
    /// record exists for the token.
    pub async fn revoke_family(&self, token_id: &str) -> Result<Option<(String, u64)>, AuthError> {
        let Some(record) = self.find_by_token_id(token_id).await? else {
            return Ok(None);
        };
        let revoked = self.revoke_all(&record.user_id).await?;
        Ok(Some((record.user_id, revoked)))
    }
}
