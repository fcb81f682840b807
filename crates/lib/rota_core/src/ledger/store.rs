//! Storage seam under the session ledger.
//!
//! Each method is a single round trip and must be atomic on its own; the
//! store is the only synchronization point between concurrent requests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::auth::AuthError;
use crate::models::SessionRecord;

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Insert a new, active record.
    async fn insert(&self, record: &SessionRecord) -> Result<(), AuthError>;

    /// Fetch a record by token hash in any state.
    async fn find_by_hash(&self, token_hash: &str) -> Result<Option<SessionRecord>, AuthError>;

    /// Non-revoked, unexpired records for a user, oldest `created_at` first.
    async fn active_for_user(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<SessionRecord>, AuthError>;

    /// Revoke one record only if it is still not revoked. Reports whether it matched.
    async fn revoke_if_active(
        &self,
        token_hash: &str,
        replaced_by: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<bool, AuthError>;

    /// Atomically revoke `old_hash` (if still active and owned by `user_id`),
    /// linking it to `replaced_by`, and insert `successor`. Nothing is written
    /// when the old record does not match.
    async fn rotate(
        &self,
        old_hash: &str,
        user_id: &str,
        replaced_by: &str,
        successor: &SessionRecord,
        at: DateTime<Utc>,
    ) -> Result<bool, AuthError>;

    /// Revoke the listed records that are still active. Returns how many changed.
    async fn revoke_ids(&self, ids: &[String], at: DateTime<Utc>) -> Result<u64, AuthError>;

    /// Revoke every non-revoked record for a user. Returns how many changed.
    async fn revoke_all_for_user(&self, user_id: &str, at: DateTime<Utc>)
    -> Result<u64, AuthError>;

    /// Delete every record whose `expires_at` has passed.
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, AuthError>;
}
