//! Request extractors.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::header::USER_AGENT;
use axum::http::request::Parts;
use rota_core::models::ClientMetadata;

/// Longest user agent kept on a session row.
const MAX_USER_AGENT_LEN: usize = 512;

/// Provenance of the caller: `User-Agent` and client IP.
///
/// The IP comes from the first `X-Forwarded-For` hop when present, otherwise
/// from the socket (if the server was started with connect info). Both are
/// advisory only.
#[derive(Debug, Clone, Default)]
pub struct ClientInfo(pub ClientMetadata);

impl<S: Send + Sync> FromRequestParts<S> for ClientInfo {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_agent = parts
            .headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(|ua| ua.chars().take(MAX_USER_AGENT_LEN).collect::<String>());

        let forwarded = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|ip| !ip.is_empty())
            .map(str::to_string);

        let ip_address = forwarded.or_else(|| {
            parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        });

        Ok(ClientInfo(ClientMetadata::new(user_agent, ip_address)))
    }
}
