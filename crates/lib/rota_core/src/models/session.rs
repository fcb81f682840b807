//! Session ledger rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Advisory provenance captured when a session is created or rotated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientMetadata {
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}

impl ClientMetadata {
    pub fn new(user_agent: Option<String>, ip_address: Option<String>) -> Self {
        Self {
            user_agent,
            ip_address,
        }
    }
}

/// Refresh session record stored in the `sessions` table.
///
/// `token_hash` is the SHA-256 of the refresh credential's token id; the raw
/// id is never stored for the row itself. A row only ever moves from active
/// to revoked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SessionRecord {
    pub id: String,
    pub token_hash: String,
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
    pub is_revoked: bool,
    pub revoked_at: Option<DateTime<Utc>>,
    /// Token id of the successor, set only when revoked by rotation.
    pub replaced_by_token: Option<String>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Lifecycle state derived from a record at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Active,
    /// Revoked by rotation; a successor exists.
    Rotated,
    /// Revoked by logout, logout-all, family revocation or cap eviction.
    Revoked,
    /// Past `expires_at` and awaiting reclamation.
    Expired,
}

impl SessionRecord {
    /// Classify this record at `now`. Revocation wins over expiry.
    pub fn state(&self, now: DateTime<Utc>) -> SessionState {
        match (self.is_revoked, &self.replaced_by_token) {
            (true, Some(_)) => SessionState::Rotated,
            (true, None) => SessionState::Revoked,
            (false, _) if self.expires_at <= now => SessionState::Expired,
            (false, _) => SessionState::Active,
        }
    }

    /// Whether the record is still usable for rotation at `now`.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.state(now) == SessionState::Active
    }
}
