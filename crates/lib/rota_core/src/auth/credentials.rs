//! User lookup and password verification.
//!
//! The users table belongs to the surrounding application. This core only
//! needs to find a user and check a password, so that is all the
//! [`CredentialStore`] seam exposes.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::PgPool;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::AuthError;
use super::password;
use crate::models::User;
use crate::uuid::uuidv4;

/// Column list shared across user queries.
const USER_COLUMNS: &str = "id::text AS id, email, password_hash, is_active";

/// Read-only access to users.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Case-insensitive lookup by email.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AuthError>;

    /// Lookup by id; used when rotating, where only the subject is known.
    async fn find_user_by_id(&self, user_id: &str) -> Result<Option<User>, AuthError>;

    /// Check `password` against a stored hash. bcrypt unless overridden.
    fn verify_password(&self, password: &str, password_hash: &str) -> Result<bool, AuthError> {
        password::verify_password(password, password_hash)
    }
}

/// [`CredentialStore`] over the `users` table.
#[derive(Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE lower(email) = lower($1)");
        let user = sqlx::query_as::<_, User>(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_user_by_id(&self, user_id: &str) -> Result<Option<User>, AuthError> {
        // Compare as uuid so the primary key index is used.
        let Ok(id) = Uuid::parse_str(user_id) else {
            return Ok(None);
        };
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }
}

/// In-memory [`CredentialStore`] for tests and local development.
#[derive(Default)]
pub struct MemoryCredentialStore {
    users: RwLock<HashMap<String, User>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an active user with a bcrypt-hashed password.
    pub async fn add_user(&self, email: &str, password: &str) -> Result<User, AuthError> {
        // Lowest bcrypt cost: these users only ever live in memory.
        let hash = password::hash_password_with_cost(password, 4)?;
        let user = User {
            id: uuidv4().to_string(),
            email: email.to_string(),
            password_hash: Some(hash),
            is_active: true,
        };
        self.insert(user.clone()).await;
        Ok(user)
    }

    /// Insert or replace a user keyed by id.
    pub async fn insert(&self, user: User) {
        self.users.write().await.insert(user.id.clone(), user);
    }

    /// Flip a user's active flag. Returns `false` if the user is unknown.
    pub async fn set_active(&self, user_id: &str, active: bool) -> bool {
        match self.users.write().await.get_mut(user_id) {
            Some(user) => {
                user.is_active = active;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        let users = self.users.read().await;
        Ok(users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_user_by_id(&self, user_id: &str) -> Result<Option<User>, AuthError> {
        Ok(self.users.read().await.get(user_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_finds_by_email_case_insensitively() {
        let store = MemoryCredentialStore::new();
        let user = store.add_user("Ada@Example.com", "hunter22").await.unwrap();

        let found = store
            .find_user_by_email("ada@example.com")
            .await
            .unwrap()
            .expect("user");
        assert_eq!(found.id, user.id);
        assert!(
            store
                .verify_password("hunter22", found.password_hash.as_deref().unwrap())
                .unwrap()
        );
    }

    #[tokio::test]
    async fn set_active_reports_unknown_users() {
        let store = MemoryCredentialStore::new();
        let user = store.add_user("a@b.c", "pw").await.unwrap();
        assert!(store.set_active(&user.id, false).await);
        assert!(!store.set_active("nobody", false).await);
        let found = store.find_user_by_id(&user.id).await.unwrap().unwrap();
        assert!(!found.is_active);
    }
}
