use serde::{Deserialize, Serialize};

/// A user as seen by this core. Owned by the credential store; never mutated here.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: String,
    pub email: String,
    /// bcrypt hash. Accounts without one (e.g. invite-only) cannot log in.
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub is_active: bool,
}
