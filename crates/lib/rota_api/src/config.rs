//! API server configuration.

use rota_core::auth::{AuthConfig, AuthError};

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:3100").
    pub bind_addr: String,
    /// PostgreSQL connection URL.
    pub database_url: String,
    /// Token secrets, lifetimes and the per-user session cap.
    pub auth: AuthConfig,
}

impl ApiConfig {
    /// Reads configuration from environment variables with sensible defaults.
    ///
    /// | Variable       | Default                          |
    /// |----------------|----------------------------------|
    /// | `BIND_ADDR`    | `127.0.0.1:3100`                 |
    /// | `DATABASE_URL` | `postgres://localhost:5432/rota` |
    ///
    /// Token settings are read by [`AuthConfig::from_env`].
    pub fn from_env() -> Result<Self, AuthError> {
        Ok(Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:3100".into()),
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://localhost:5432/rota".into()),
            auth: AuthConfig::from_env()?,
        })
    }
}
