//! Authentication request handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::extract::ClientInfo;
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{LoginRequest, MeResponse, RefreshTokenRequest, TokenResponse};

/// Turn a JSON body rejection into a validation error.
fn parse_body<T>(body: Result<Json<T>, JsonRejection>) -> AppResult<T> {
    body.map(|Json(b)| b)
        .map_err(|e| AppError::Validation(e.body_text()))
}

/// `POST /auth/login` — authenticate with email + password.
pub async fn login_handler(
    State(state): State<AppState>,
    ClientInfo(meta): ClientInfo,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> AppResult<Json<TokenResponse>> {
    let creds = parse_body(body)?.validate()?;
    let pair = state
        .auth
        .login(&creds.email, &creds.password, &meta)
        .await?;
    Ok(Json(pair.into()))
}

/// `POST /auth/refresh` — exchange a refresh token for a new token pair.
///
/// Any token problem, including an empty token, is a plain 401.
pub async fn refresh_handler(
    State(state): State<AppState>,
    ClientInfo(meta): ClientInfo,
    body: Result<Json<RefreshTokenRequest>, JsonRejection>,
) -> AppResult<Json<TokenResponse>> {
    let body = parse_body(body)?;
    let token = body
        .token()
        .ok_or_else(|| AppError::Unauthorized("Invalid refresh token".into()))?;
    let pair = state.auth.refresh(token, &meta).await?;
    Ok(Json(pair.into()))
}

/// `POST /auth/logout` — revoke one refresh token. Always 204 unless the
/// store fails.
pub async fn logout_handler(
    State(state): State<AppState>,
    body: Result<Json<RefreshTokenRequest>, JsonRejection>,
) -> AppResult<StatusCode> {
    let body = parse_body(body)?;
    if let Some(token) = body.token() {
        state.auth.logout(token).await?;
    }
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /auth/logout-all` — revoke every session of the bearer's user.
pub async fn logout_all_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(claims)): Extension<AuthenticatedUser>,
) -> AppResult<StatusCode> {
    state.auth.logout_all(&claims.sub).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /auth/me` — identity carried by the bearer access token.
pub async fn me_handler(
    Extension(AuthenticatedUser(claims)): Extension<AuthenticatedUser>,
) -> Json<MeResponse> {
    Json(MeResponse {
        user_id: claims.sub,
        email: claims.email,
        access_token_id: claims.jti,
    })
}
