//! Token and session configuration.

use std::path::PathBuf;

use chrono::Duration;
use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use tracing::{info, warn};

use super::AuthError;

/// Access token lifetime: 15 minutes.
pub const DEFAULT_ACCESS_TTL_SECS: i64 = 15 * 60;

/// Refresh token lifetime: 7 days.
pub const DEFAULT_REFRESH_TTL_SECS: i64 = 7 * 24 * 60 * 60;

/// Maximum concurrently active sessions per user.
pub const DEFAULT_SESSION_CAP: usize = 5;

pub const DEFAULT_ISSUER: &str = "rota";
pub const DEFAULT_AUDIENCE: &str = "rota-clients";

/// Signing secrets, lifetimes and limits for the token issuer and ledger.
///
/// Passed explicitly to constructors; nothing reads it from a global.
#[derive(Clone)]
pub struct AuthConfig {
    pub access_secret: String,
    pub refresh_secret: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub issuer: String,
    pub audience: String,
    pub session_cap: usize,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("access_secret", &"<redacted>")
            .field("refresh_secret", &"<redacted>")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("session_cap", &self.session_cap)
            .finish()
    }
}

impl AuthConfig {
    /// Defaults for everything except the two secrets.
    pub fn with_secrets(access_secret: impl Into<String>, refresh_secret: impl Into<String>) -> Self {
        Self {
            access_secret: access_secret.into(),
            refresh_secret: refresh_secret.into(),
            access_ttl: Duration::seconds(DEFAULT_ACCESS_TTL_SECS),
            refresh_ttl: Duration::seconds(DEFAULT_REFRESH_TTL_SECS),
            issuer: DEFAULT_ISSUER.to_string(),
            audience: DEFAULT_AUDIENCE.to_string(),
            session_cap: DEFAULT_SESSION_CAP,
        }
    }

    /// Reads configuration from environment variables.
    ///
    /// | Variable                | Default                          |
    /// |-------------------------|----------------------------------|
    /// | `JWT_ACCESS_SECRET` / `JWT_SECRET` | generated & persisted to file |
    /// | `JWT_REFRESH_SECRET`    | generated & persisted to file    |
    /// | `JWT_ACCESS_TTL_SECS`   | `900`                            |
    /// | `JWT_REFRESH_TTL_SECS`  | `604800`                         |
    /// | `JWT_ISSUER`            | `rota`                           |
    /// | `JWT_AUDIENCE`          | `rota-clients`                   |
    /// | `SESSION_CAP`           | `5`                              |
    pub fn from_env() -> Result<Self, AuthError> {
        let config = Self {
            access_secret: resolve_secret(&["JWT_ACCESS_SECRET", "JWT_SECRET"], "access-secret"),
            refresh_secret: resolve_secret(&["JWT_REFRESH_SECRET"], "refresh-secret"),
            access_ttl: Duration::seconds(env_parse("JWT_ACCESS_TTL_SECS", DEFAULT_ACCESS_TTL_SECS)?),
            refresh_ttl: Duration::seconds(env_parse(
                "JWT_REFRESH_TTL_SECS",
                DEFAULT_REFRESH_TTL_SECS,
            )?),
            issuer: env_or("JWT_ISSUER", DEFAULT_ISSUER),
            audience: env_or("JWT_AUDIENCE", DEFAULT_AUDIENCE),
            session_cap: env_parse("SESSION_CAP", DEFAULT_SESSION_CAP)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the issuer cannot operate safely with.
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.access_secret.is_empty() || self.refresh_secret.is_empty() {
            return Err(AuthError::Config("signing secrets must not be empty".into()));
        }
        if self.access_secret == self.refresh_secret {
            return Err(AuthError::Config(
                "access and refresh secrets must differ".into(),
            ));
        }
        if self.access_ttl <= Duration::zero() || self.refresh_ttl <= Duration::zero() {
            return Err(AuthError::Config("token lifetimes must be positive".into()));
        }
        if self.session_cap == 0 {
            return Err(AuthError::Config("session cap must be at least 1".into()));
        }
        Ok(())
    }
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> Result<T, AuthError> {
    match std::env::var(name) {
        Ok(raw) if !raw.is_empty() => raw
            .parse()
            .map_err(|_| AuthError::Config(format!("{name} is not a valid number: {raw}"))),
        _ => Ok(default),
    }
}

/// Resolve a signing secret: first non-empty env var in `vars` → persisted
/// file → freshly generated (and persisted) 64-char secret.
pub fn resolve_secret(vars: &[&str], file_name: &str) -> String {
    for var in vars {
        if let Ok(secret) = std::env::var(var)
            && !secret.is_empty()
        {
            return secret;
        }
    }
    let secret_path = secret_path(file_name);
    if let Ok(existing) = std::fs::read_to_string(&secret_path) {
        let trimmed = existing.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }
    let secret = generate_secret();
    if let Some(parent) = secret_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    match std::fs::write(&secret_path, &secret) {
        Ok(()) => info!(path = %secret_path.display(), "generated new signing secret"),
        Err(e) => warn!(
            path = %secret_path.display(),
            error = %e,
            "could not persist signing secret; tokens will not survive a restart"
        ),
    }
    secret
}

fn generate_secret() -> String {
    rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect()
}

/// Path to a persisted secret file.
fn secret_path(file_name: &str) -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("rota")
        .join(file_name)
}
