//! The four public auth flows: login, refresh, logout and logout-all.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::credentials::CredentialStore;
use super::jwt::TokenIssuer;
use super::{AuthConfig, AuthError};
use crate::clock::Clock;
use crate::ledger::{SessionLedger, SessionStore};
use crate::models::{ClientMetadata, TokenPair};

/// Sequences credential checks, token issuing and ledger updates.
pub struct AuthOrchestrator {
    credentials: Arc<dyn CredentialStore>,
    issuer: Arc<TokenIssuer>,
    ledger: Arc<SessionLedger>,
}

impl AuthOrchestrator {
    /// Wire the issuer and ledger over the given stores and clock.
    pub fn new(
        config: AuthConfig,
        credentials: Arc<dyn CredentialStore>,
        sessions: Arc<dyn SessionStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let ledger = Arc::new(SessionLedger::new(sessions, clock.clone(), config.session_cap));
        let issuer = Arc::new(TokenIssuer::new(
            config,
            ledger.clone(),
            credentials.clone(),
            clock,
        ));
        Self {
            credentials,
            issuer,
            ledger,
        }
    }

    pub fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    pub fn ledger(&self) -> &SessionLedger {
        &self.ledger
    }

    /// Authenticate with email + password and open a new session.
    ///
    /// Unknown email, inactive account, missing hash and wrong password all
    /// yield the same [`AuthError::InvalidCredentials`].
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        metadata: &ClientMetadata,
    ) -> Result<TokenPair, AuthError> {
        let Some(user) = self.credentials.find_user_by_email(email).await? else {
            debug!("login for unknown email");
            return Err(AuthError::InvalidCredentials);
        };
        if !user.is_active {
            debug!(user_id = %user.id, "login for inactive user");
            return Err(AuthError::InvalidCredentials);
        }
        let Some(hash) = user.password_hash.as_deref() else {
            return Err(AuthError::InvalidCredentials);
        };
        if !self.credentials.verify_password(password, hash)? {
            debug!(user_id = %user.id, "login with wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        let pair = self.issuer.generate_pair(&user, metadata).await?;
        info!(user_id = %user.id, "user logged in");
        Ok(pair)
    }

    /// Rotate a refresh token.
    ///
    /// Every token-level failure comes back as
    /// [`AuthError::InvalidRefreshToken`]; the real reason is only logged.
    /// Store failures propagate as-is.
    pub async fn refresh(
        &self,
        refresh_token: &str,
        metadata: &ClientMetadata,
    ) -> Result<TokenPair, AuthError> {
        match self.issuer.verify_and_rotate(refresh_token, metadata).await {
            Ok(pair) => Ok(pair),
            Err(e) if e.is_refresh_failure() => {
                debug!(reason = e.reason(), "refresh rejected");
                Err(AuthError::InvalidRefreshToken)
            }
            Err(e) => Err(e),
        }
    }

    /// Revoke one session. Idempotent: unknown, revoked or unverifiable
    /// tokens succeed silently.
    pub async fn logout(&self, refresh_token: &str) -> Result<(), AuthError> {
        match self.issuer.revoke(refresh_token).await {
            Ok(()) => Ok(()),
            Err(e @ (AuthError::MalformedToken | AuthError::RevokedToken)) => {
                debug!(reason = e.reason(), "logout had nothing to revoke");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Revoke every session of `user_id`. Returns how many were active.
    pub async fn logout_all(&self, user_id: &str) -> Result<u64, AuthError> {
        let revoked = self.ledger.revoke_all(user_id).await?;
        if revoked == 0 {
            warn!(user_id, "logout-all found no active sessions");
        } else {
            info!(user_id, revoked, "logged out of all sessions");
        }
        Ok(revoked)
    }
}
