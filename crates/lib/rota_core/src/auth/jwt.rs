//! JWT token generation, verification and refresh rotation.
//!
//! Access and refresh tokens are HS256 JWTs signed with separate secrets and
//! sharing one issuer/audience. `exp` is checked against the injected
//! [`Clock`] with zero leeway rather than by `jsonwebtoken` itself.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::credentials::CredentialStore;
use super::{AuthConfig, AuthError};
use crate::clock::Clock;
use crate::ledger::{SessionLedger, hash_token_id};
use crate::models::token::TOKEN_TYPE_BEARER;
use crate::models::{AccessClaims, ClientMetadata, RefreshClaims, TokenPair, User};
use crate::uuid::uuidv4;

/// Generate a refresh token id (64 random alphanumeric chars).
fn generate_token_id() -> String {
    rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect()
}

/// Signing material for one token kind.
struct Keys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl Keys {
    fn from_secret(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

/// A pair plus what the ledger needs to record it.
struct Minted {
    pair: TokenPair,
    refresh_expires_at: DateTime<Utc>,
}

/// Mints and verifies credential pairs and drives refresh rotation.
pub struct TokenIssuer {
    config: AuthConfig,
    access: Keys,
    refresh: Keys,
    validation: Validation,
    ledger: Arc<SessionLedger>,
    credentials: Arc<dyn CredentialStore>,
    clock: Arc<dyn Clock>,
}

impl TokenIssuer {
    pub fn new(
        config: AuthConfig,
        ledger: Arc<SessionLedger>,
        credentials: Arc<dyn CredentialStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_issuer(&[config.issuer.as_str()]);
        validation.set_audience(&[config.audience.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);

        Self {
            access: Keys::from_secret(&config.access_secret),
            refresh: Keys::from_secret(&config.refresh_secret),
            config,
            validation,
            ledger,
            credentials,
            clock,
        }
    }

    fn sign<T: Serialize>(&self, claims: &T, keys: &Keys) -> Result<String, AuthError> {
        encode(&Header::new(Algorithm::HS256), claims, &keys.encoding)
            .map_err(|e| AuthError::Internal(format!("jwt encode: {e}")))
    }

    fn decode_claims<T: DeserializeOwned>(&self, token: &str, keys: &Keys) -> Result<T, AuthError> {
        decode::<T>(token, &keys.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                debug!(error = %e, "token rejected");
                AuthError::MalformedToken
            })
    }

    fn check_expiry(&self, exp: i64) -> Result<(), AuthError> {
        if exp <= self.clock.now().timestamp() {
            return Err(AuthError::ExpiredToken);
        }
        Ok(())
    }

    fn mint(&self, user: &User, token_id: &str) -> Result<Minted, AuthError> {
        let now = self.clock.now();
        let access_claims = AccessClaims {
            sub: user.id.clone(),
            email: user.email.clone(),
            jti: uuidv4().to_string(),
            iss: self.config.issuer.clone(),
            aud: self.config.audience.clone(),
            iat: now.timestamp(),
            exp: (now + self.config.access_ttl).timestamp(),
        };
        let refresh_expires_at = now + self.config.refresh_ttl;
        let refresh_claims = RefreshClaims {
            sub: user.id.clone(),
            tid: token_id.to_string(),
            iss: self.config.issuer.clone(),
            aud: self.config.audience.clone(),
            iat: now.timestamp(),
            exp: refresh_expires_at.timestamp(),
        };

        Ok(Minted {
            pair: TokenPair {
                access_token: self.sign(&access_claims, &self.access)?,
                refresh_token: self.sign(&refresh_claims, &self.refresh)?,
                expires_in: self.config.access_ttl.num_seconds(),
                token_type: TOKEN_TYPE_BEARER.to_string(),
            },
            refresh_expires_at,
        })
    }

    /// Mint a fresh pair for `user` and record its refresh session.
    pub async fn generate_pair(
        &self,
        user: &User,
        metadata: &ClientMetadata,
    ) -> Result<TokenPair, AuthError> {
        let token_id = generate_token_id();
        let minted = self.mint(user, &token_id)?;
        self.ledger
            .persist(&user.id, &token_id, minted.refresh_expires_at, metadata)
            .await?;
        Ok(minted.pair)
    }

    /// Verify an access token (signature, issuer, audience, expiry).
    pub fn verify_access(&self, token: &str) -> Result<AccessClaims, AuthError> {
        let claims: AccessClaims = self.decode_claims(token, &self.access)?;
        self.check_expiry(claims.exp)?;
        Ok(claims)
    }

    /// Verify a refresh token fully, including expiry.
    pub fn verify_refresh(&self, token: &str) -> Result<RefreshClaims, AuthError> {
        let claims = self.refresh_claims(token)?;
        self.check_expiry(claims.exp)?;
        Ok(claims)
    }

    /// Decode a refresh token checking signature, issuer and audience but not
    /// expiry.
    pub fn refresh_claims(&self, token: &str) -> Result<RefreshClaims, AuthError> {
        self.decode_claims(token, &self.refresh)
    }

    /// Exchange `old_refresh_token` for a successor pair.
    ///
    /// A validly signed token whose ledger record is missing or already
    /// revoked is treated as stolen: every session of the user is revoked and
    /// [`AuthError::ReuseDetected`] is returned. Losing a race against a
    /// concurrent rotation of the same token is handled the same way.
    pub async fn verify_and_rotate(
        &self,
        old_refresh_token: &str,
        metadata: &ClientMetadata,
    ) -> Result<TokenPair, AuthError> {
        let claims = self.verify_refresh(old_refresh_token)?;

        let Some(record) = self.ledger.find_active(&hash_token_id(&claims.tid)).await? else {
            return Err(self.contain_replay(&claims).await?);
        };
        if record.user_id != claims.sub {
            warn!(
                user_id = %claims.sub,
                session_id = %record.id,
                "refresh token subject does not match session owner"
            );
            return Err(AuthError::MalformedToken);
        }

        let user = match self.credentials.find_user_by_id(&claims.sub).await? {
            Some(user) if user.is_active => user,
            _ => {
                self.ledger.revoke(&claims.tid, None).await?;
                debug!(user_id = %claims.sub, "refresh for missing or inactive user");
                return Err(AuthError::RevokedToken);
            }
        };

        let successor_id = generate_token_id();
        let minted = self.mint(&user, &successor_id)?;
        let rotated = self
            .ledger
            .rotate(
                &claims.tid,
                &user.id,
                &successor_id,
                minted.refresh_expires_at,
                metadata,
            )
            .await?;

        match rotated {
            Some(successor) => {
                debug!(
                    user_id = %user.id,
                    previous_session = %record.id,
                    session_id = %successor.id,
                    "refresh token rotated"
                );
                Ok(minted.pair)
            }
            None => Err(self.contain_replay(&claims).await?),
        }
    }

    /// Revoke the user's entire session set after a replayed (or raced)
    /// refresh token. Returns the error to hand back.
    async fn contain_replay(&self, claims: &RefreshClaims) -> Result<AuthError, AuthError> {
        let (user_id, revoked) = match self.ledger.revoke_family(&claims.tid).await? {
            Some(found) => found,
            None => {
                let revoked = self.ledger.revoke_all(&claims.sub).await?;
                (claims.sub.clone(), revoked)
            }
        };
        warn!(
            user_id = %user_id,
            revoked,
            "refresh token reuse detected; revoked all sessions for user"
        );
        Ok(AuthError::ReuseDetected { user_id })
    }

    /// Revoke the single session behind `refresh_token`. Expired tokens are
    /// accepted; logging out of one is still meaningful.
    pub async fn revoke(&self, refresh_token: &str) -> Result<(), AuthError> {
        let claims = self.refresh_claims(refresh_token)?;
        if self.ledger.revoke(&claims.tid, None).await? {
            debug!(user_id = %claims.sub, "session revoked");
            Ok(())
        } else {
            Err(AuthError::RevokedToken)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemoryCredentialStore;
    use crate::clock::ManualClock;
    use crate::ledger::{MemorySessionStore, SessionStore};
    use crate::models::SessionRecord;
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use chrono::Duration;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Token id of the rotation that beats the request under test.
    const COMPETING_TID: &str = "competing-successor";

    /// Session store that lets a competing rotation of the same token commit
    /// just before the first `rotate` call goes through, after `find_active`
    /// has already seen the record as active.
    struct RacingStore {
        inner: MemorySessionStore,
        armed: AtomicBool,
    }

    impl RacingStore {
        fn new() -> Self {
            Self {
                inner: MemorySessionStore::new(),
                armed: AtomicBool::new(true),
            }
        }
    }

    #[async_trait]
    impl SessionStore for RacingStore {
        async fn insert(&self, record: &SessionRecord) -> Result<(), AuthError> {
            self.inner.insert(record).await
        }

        async fn find_by_hash(&self, token_hash: &str) -> Result<Option<SessionRecord>, AuthError> {
            self.inner.find_by_hash(token_hash).await
        }

        async fn active_for_user(
            &self,
            user_id: &str,
            now: DateTime<Utc>,
        ) -> Result<Vec<SessionRecord>, AuthError> {
            self.inner.active_for_user(user_id, now).await
        }

        async fn revoke_if_active(
            &self,
            token_hash: &str,
            replaced_by: Option<&str>,
            at: DateTime<Utc>,
        ) -> Result<bool, AuthError> {
            self.inner.revoke_if_active(token_hash, replaced_by, at).await
        }

        async fn rotate(
            &self,
            old_hash: &str,
            user_id: &str,
            replaced_by: &str,
            successor: &SessionRecord,
            at: DateTime<Utc>,
        ) -> Result<bool, AuthError> {
            if self.armed.swap(false, Ordering::SeqCst) {
                let competitor = SessionRecord {
                    id: crate::uuid::uuidv7().to_string(),
                    token_hash: hash_token_id(COMPETING_TID),
                    ..successor.clone()
                };
                let won = self
                    .inner
                    .rotate(old_hash, user_id, COMPETING_TID, &competitor, at)
                    .await?;
                assert!(won, "competing rotation should commit first");
            }
            self.inner
                .rotate(old_hash, user_id, replaced_by, successor, at)
                .await
        }

        async fn revoke_ids(&self, ids: &[String], at: DateTime<Utc>) -> Result<u64, AuthError> {
            self.inner.revoke_ids(ids, at).await
        }

        async fn revoke_all_for_user(
            &self,
            user_id: &str,
            at: DateTime<Utc>,
        ) -> Result<u64, AuthError> {
            self.inner.revoke_all_for_user(user_id, at).await
        }

        async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, AuthError> {
            self.inner.delete_expired(now).await
        }
    }

    struct Fixture {
        issuer: TokenIssuer,
        ledger: Arc<SessionLedger>,
        credentials: Arc<MemoryCredentialStore>,
        clock: ManualClock,
        user: User,
    }

    async fn fixture() -> Fixture {
        fixture_with_store(Arc::new(MemorySessionStore::new())).await
    }

    async fn fixture_with_store(store: Arc<dyn SessionStore>) -> Fixture {
        let config = AuthConfig::with_secrets("access-secret", "refresh-secret");
        let clock = ManualClock::default();
        let ledger = Arc::new(SessionLedger::new(
            store,
            Arc::new(clock.clone()),
            config.session_cap,
        ));
        let credentials = Arc::new(MemoryCredentialStore::new());
        let user = credentials.add_user("ada@example.com", "pw").await.unwrap();
        let issuer = TokenIssuer::new(
            config,
            ledger.clone(),
            credentials.clone(),
            Arc::new(clock.clone()),
        );
        Fixture {
            issuer,
            ledger,
            credentials,
            clock,
            user,
        }
    }

    #[tokio::test]
    async fn pair_claims_are_consistent() {
        let f = fixture().await;
        let pair = f
            .issuer
            .generate_pair(&f.user, &ClientMetadata::default())
            .await
            .unwrap();

        assert_eq!(pair.token_type, "Bearer");
        assert_eq!(pair.expires_in, 15 * 60);

        let access = f.issuer.verify_access(&pair.access_token).unwrap();
        let refresh = f.issuer.verify_refresh(&pair.refresh_token).unwrap();
        assert_eq!(access.sub, f.user.id);
        assert_eq!(access.email, f.user.email);
        assert_eq!(refresh.sub, f.user.id);
        assert_ne!(refresh.tid, access.jti);
        assert_eq!(refresh.exp - refresh.iat, 7 * 24 * 60 * 60);

        let record = f.ledger.find_by_token_id(&refresh.tid).await.unwrap().unwrap();
        assert_eq!(record.user_id, f.user.id);
    }

    #[tokio::test]
    async fn tokens_do_not_cross_verify() {
        let f = fixture().await;
        let pair = f
            .issuer
            .generate_pair(&f.user, &ClientMetadata::default())
            .await
            .unwrap();

        assert_matches!(
            f.issuer.verify_access(&pair.refresh_token),
            Err(AuthError::MalformedToken)
        );
        assert_matches!(
            f.issuer.verify_refresh(&pair.access_token),
            Err(AuthError::MalformedToken)
        );
        assert_matches!(
            f.issuer.verify_access("not.a.jwt"),
            Err(AuthError::MalformedToken)
        );
    }

    #[tokio::test]
    async fn wrong_audience_is_malformed() {
        let f = fixture().await;
        let pair = f
            .issuer
            .generate_pair(&f.user, &ClientMetadata::default())
            .await
            .unwrap();

        let mut other = AuthConfig::with_secrets("access-secret", "refresh-secret");
        other.audience = "someone-else".into();
        let foreign = TokenIssuer::new(
            other,
            f.ledger.clone(),
            f.credentials.clone(),
            Arc::new(f.clock.clone()),
        );
        assert_matches!(
            foreign.verify_access(&pair.access_token),
            Err(AuthError::MalformedToken)
        );
    }

    #[tokio::test]
    async fn access_token_expires_on_the_clock() {
        let f = fixture().await;
        let pair = f
            .issuer
            .generate_pair(&f.user, &ClientMetadata::default())
            .await
            .unwrap();

        f.clock.advance(Duration::minutes(15));
        assert_matches!(
            f.issuer.verify_access(&pair.access_token),
            Err(AuthError::ExpiredToken)
        );
    }

    #[tokio::test]
    async fn rotate_then_replay_revokes_family() {
        let f = fixture().await;
        let meta = ClientMetadata::default();
        let r0 = f.issuer.generate_pair(&f.user, &meta).await.unwrap();
        let other = f.issuer.generate_pair(&f.user, &meta).await.unwrap();

        let r1 = f
            .issuer
            .verify_and_rotate(&r0.refresh_token, &meta)
            .await
            .unwrap();

        let r0_tid = f.issuer.refresh_claims(&r0.refresh_token).unwrap().tid;
        let r1_tid = f.issuer.refresh_claims(&r1.refresh_token).unwrap().tid;
        let old = f.ledger.find_by_token_id(&r0_tid).await.unwrap().unwrap();
        assert!(old.is_revoked);
        assert_eq!(old.replaced_by_token.as_deref(), Some(r1_tid.as_str()));

        let replay = f.issuer.verify_and_rotate(&r0.refresh_token, &meta).await;
        assert_matches!(replay, Err(AuthError::ReuseDetected { user_id }) if user_id == f.user.id);

        assert!(f.ledger.active_sessions(&f.user.id).await.unwrap().is_empty());
        assert_matches!(
            f.issuer.verify_and_rotate(&r1.refresh_token, &meta).await,
            Err(AuthError::ReuseDetected { .. })
        );
        assert_matches!(
            f.issuer.verify_and_rotate(&other.refresh_token, &meta).await,
            Err(AuthError::ReuseDetected { .. })
        );
    }

    #[tokio::test]
    async fn expired_refresh_fails_even_if_ledger_active() {
        let f = fixture().await;
        let meta = ClientMetadata::default();
        let pair = f.issuer.generate_pair(&f.user, &meta).await.unwrap();
        let tid = f.issuer.refresh_claims(&pair.refresh_token).unwrap().tid;

        f.clock.advance(Duration::days(7) + Duration::seconds(1));

        assert_matches!(
            f.issuer.verify_and_rotate(&pair.refresh_token, &meta).await,
            Err(AuthError::ExpiredToken)
        );
        let record = f.ledger.find_by_token_id(&tid).await.unwrap().unwrap();
        assert!(!record.is_revoked);
    }

    #[tokio::test]
    async fn inactive_user_cannot_rotate() {
        let f = fixture().await;
        let meta = ClientMetadata::default();
        let pair = f.issuer.generate_pair(&f.user, &meta).await.unwrap();
        f.credentials.set_active(&f.user.id, false).await;

        assert_matches!(
            f.issuer.verify_and_rotate(&pair.refresh_token, &meta).await,
            Err(AuthError::RevokedToken)
        );
        assert!(f.ledger.active_sessions(&f.user.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn revoke_accepts_expired_tokens() {
        let f = fixture().await;
        let meta = ClientMetadata::default();
        let pair = f.issuer.generate_pair(&f.user, &meta).await.unwrap();
        f.clock.advance(Duration::days(8));

        f.issuer.revoke(&pair.refresh_token).await.unwrap();
        assert_matches!(
            f.issuer.revoke(&pair.refresh_token).await,
            Err(AuthError::RevokedToken)
        );

        let tid = f.issuer.refresh_claims(&pair.refresh_token).unwrap().tid;
        let record = f.ledger.find_by_token_id(&tid).await.unwrap().unwrap();
        assert!(record.is_revoked);
        assert!(record.replaced_by_token.is_none());
    }

    #[tokio::test]
    async fn losing_a_rotation_race_is_treated_as_replay() {
        let store = Arc::new(RacingStore::new());
        let f = fixture_with_store(store.clone()).await;
        let meta = ClientMetadata::default();
        let pair = f.issuer.generate_pair(&f.user, &meta).await.unwrap();
        let tid = f.issuer.refresh_claims(&pair.refresh_token).unwrap().tid;

        let result = f.issuer.verify_and_rotate(&pair.refresh_token, &meta).await;
        assert_matches!(result, Err(AuthError::ReuseDetected { user_id }) if user_id == f.user.id);

        // The competing rotation is recorded as the successor...
        let old = f.ledger.find_by_token_id(&tid).await.unwrap().unwrap();
        assert_eq!(old.replaced_by_token.as_deref(), Some(COMPETING_TID));
        // ...and its session was swept up by the family revocation.
        let competitor = f.ledger.find_by_token_id(COMPETING_TID).await.unwrap().unwrap();
        assert!(competitor.is_revoked);
        assert!(f.ledger.active_sessions(&f.user.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn replay_without_ledger_row_revokes_by_subject() {
        let store = Arc::new(MemorySessionStore::new());
        let f = fixture_with_store(store.clone()).await;
        let meta = ClientMetadata::default();
        let vanished = f.issuer.generate_pair(&f.user, &meta).await.unwrap();

        // Drop every row, then open a fresh session the fallback must reach.
        store
            .delete_expired(f.clock.now() + Duration::days(30))
            .await
            .unwrap();
        f.issuer.generate_pair(&f.user, &meta).await.unwrap();
        assert_eq!(f.ledger.active_sessions(&f.user.id).await.unwrap().len(), 1);

        let tid = f.issuer.refresh_claims(&vanished.refresh_token).unwrap().tid;
        assert!(f.ledger.find_by_token_id(&tid).await.unwrap().is_none());

        assert_matches!(
            f.issuer.verify_and_rotate(&vanished.refresh_token, &meta).await,
            Err(AuthError::ReuseDetected { user_id }) if user_id == f.user.id
        );
        assert!(f.ledger.active_sessions(&f.user.id).await.unwrap().is_empty());
    }
}
