//! Auth handlers

use super::ApiResponse;
use crate::auth::middleware::bearer_token;
use crate::auth::SessionTokens;
use crate::config::AppState;
use crate::error::{Error, Result};
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutRequest {
    /// Falls back to the Authorization header when absent.
    #[serde(default)]
    pub access_token: Option<String>,
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub user_id: String,
    pub username: String,
    pub access_token: String,
    pub access_expires_at: i64,
    pub refresh_token: String,
    pub refresh_expires_at: i64,
}

impl From<SessionTokens> for SessionResponse {
    fn from(tokens: SessionTokens) -> Self {
        Self {
            user_id: tokens.user_id,
            username: tokens.username,
            access_token: tokens.access_token.token,
            access_expires_at: tokens.access_token.expires_at,
            refresh_token: tokens.refresh_token.token,
            refresh_expires_at: tokens.refresh_token.expires_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub user_id: String,
    pub access_token: String,
    pub access_expires_at: i64,
}

/// POST /auth/register
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<CredentialsRequest>,
) -> Result<(StatusCode, Json<ApiResponse<SessionResponse>>)> {
    info!("POST /auth/register - {}", req.username);

    let tokens = state.identity.register(&req.username, &req.password).await?;
    Ok((
        StatusCode::CREATED,
        ApiResponse::ok("register successful", tokens.into()),
    ))
}

/// POST /auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<CredentialsRequest>,
) -> Result<Json<ApiResponse<SessionResponse>>> {
    info!("POST /auth/login - {}", req.username);

    let tokens = state.identity.login(&req.username, &req.password).await?;
    Ok(ApiResponse::ok("login successful", tokens.into()))
}

/// POST /auth/logout
///
/// Not behind the auth middleware: an expired or already revoked access
/// token must still be accepted here. The token service only checks that
/// the pair is well formed and belongs to one subject.
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<LogoutRequest>,
) -> Result<Json<ApiResponse<()>>> {
    info!("POST /auth/logout");

    let access_token = match req.access_token.filter(|t| !t.trim().is_empty()) {
        Some(token) => token,
        None => bearer_token(&headers)?.ok_or(Error::AuthFailNoToken)?,
    };

    state
        .identity
        .logout(&access_token, &req.refresh_token)
        .await?;
    Ok(ApiResponse::message("logout successful"))
}

/// POST /auth/refresh
pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshTokenRequest>,
) -> Result<Json<ApiResponse<RefreshResponse>>> {
    info!("POST /auth/refresh");

    let refreshed = state.identity.refresh_token(&req.refresh_token).await?;
    Ok(ApiResponse::ok(
        "refresh successful",
        RefreshResponse {
            user_id: refreshed.subject,
            access_token: refreshed.access.token,
            access_expires_at: refreshed.access.expires_at,
        },
    ))
}
