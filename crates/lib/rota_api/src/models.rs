//! Request and response bodies.
//!
//! Requests are parsed into these types and then validated explicitly via
//! their `validate` methods before anything reaches `rota_core`.

use rota_core::models::TokenPair;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Longest accepted email, per RFC 5321.
const MAX_EMAIL_LEN: usize = 254;

/// bcrypt ignores input past 72 bytes; reject rather than silently truncate.
const MAX_PASSWORD_LEN: usize = 72;

/// Generous upper bound on a signed refresh token.
const MAX_TOKEN_LEN: usize = 4096;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// A login request after validation.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl LoginRequest {
    /// Trim and lowercase the email and bound both fields.
    pub fn validate(self) -> Result<Credentials, AppError> {
        let email = self.email.trim().to_lowercase();
        if email.is_empty() || email.len() > MAX_EMAIL_LEN {
            return Err(AppError::Validation("email is required".into()));
        }
        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {}
            _ => return Err(AppError::Validation("email is not valid".into())),
        }
        if self.password.is_empty() {
            return Err(AppError::Validation("password is required".into()));
        }
        if self.password.len() > MAX_PASSWORD_LEN {
            return Err(AppError::Validation("password is too long".into()));
        }
        Ok(Credentials {
            email,
            password: self.password,
        })
    }
}

/// Body of `POST /auth/refresh` and `POST /auth/logout`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

impl RefreshTokenRequest {
    /// Returns the trimmed token, or `None` if it cannot possibly be valid.
    pub fn token(&self) -> Option<&str> {
        let token = self.refresh_token.trim();
        (!token.is_empty() && token.len() <= MAX_TOKEN_LEN).then_some(token)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub token_type: String,
}

impl From<TokenPair> for TokenResponse {
    fn from(pair: TokenPair) -> Self {
        Self {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            expires_in: pair.expires_in,
            token_type: pair.token_type,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub user_id: String,
    pub email: String,
    pub access_token_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}
