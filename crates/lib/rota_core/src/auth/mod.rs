//! Authentication: credential checks, token issuing and the public flows.
//!
//! Internal code keeps every failure kind distinct; only
//! [`orchestrator::AuthOrchestrator::refresh`] collapses them into
//! [`AuthError::InvalidRefreshToken`].

pub mod config;
pub mod credentials;
pub mod jwt;
pub mod orchestrator;
pub mod password;

use thiserror::Error;

pub use config::AuthConfig;
pub use credentials::{CredentialStore, MemoryCredentialStore, PgCredentialStore};
pub use jwt::TokenIssuer;
pub use orchestrator::AuthOrchestrator;

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown email, inactive user, or wrong password. Login path only.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Bad signature, issuer, audience or shape.
    #[error("Malformed token")]
    MalformedToken,

    /// The signed `exp` claim has elapsed.
    #[error("Token expired")]
    ExpiredToken,

    /// The ledger says the session is no longer usable.
    #[error("Token revoked")]
    RevokedToken,

    /// A validly signed refresh token had no active ledger record.
    /// All of the user's sessions have been revoked.
    #[error("Refresh token reuse detected for user {user_id}")]
    ReuseDetected { user_id: String },

    /// Opaque refresh failure returned across the public boundary.
    #[error("Invalid refresh token")]
    InvalidRefreshToken,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Token-level failures that the refresh boundary hides behind
    /// [`AuthError::InvalidRefreshToken`]. Store and internal failures are not
    /// among them and propagate unmapped.
    pub fn is_refresh_failure(&self) -> bool {
        matches!(
            self,
            AuthError::MalformedToken
                | AuthError::ExpiredToken
                | AuthError::RevokedToken
                | AuthError::ReuseDetected { .. }
                | AuthError::InvalidRefreshToken
        )
    }

    /// Short machine-readable reason for logs.
    pub fn reason(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::MalformedToken => "malformed",
            AuthError::ExpiredToken => "expired",
            AuthError::RevokedToken => "revoked",
            AuthError::ReuseDetected { .. } => "reuse_detected",
            AuthError::InvalidRefreshToken => "invalid_refresh_token",
            AuthError::Config(_) => "config",
            AuthError::Store(_) => "store",
            AuthError::Internal(_) => "internal",
        }
    }
}
