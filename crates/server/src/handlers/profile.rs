//! Profile handlers

use super::ApiResponse;
use crate::config::AppState;
use crate::ctx::Ctx;
use crate::error::Result;
use crate::profile::{NewProfile, Profile, ProfilePatch};
use axum::{extract::State, http::StatusCode, Json};
use tracing::info;

/// POST /profile
pub async fn create_profile(
    State(state): State<AppState>,
    ctx: Ctx,
    Json(req): Json<NewProfile>,
) -> Result<(StatusCode, Json<ApiResponse<Profile>>)> {
    info!("POST /profile - {}", ctx.user_id());

    let profile = state.profiles.create_profile(ctx.user_id(), req).await?;
    Ok((StatusCode::CREATED, ApiResponse::ok("create profile successful", profile)))
}

/// GET /profile
pub async fn get_profile(State(state): State<AppState>, ctx: Ctx) -> Result<Json<ApiResponse<Profile>>> {
    let profile = state.profiles.get_profile(ctx.user_id()).await?;
    Ok(ApiResponse::ok("retrieve profile successful", profile))
}

/// PUT /profile
pub async fn update_profile(
    State(state): State<AppState>,
    ctx: Ctx,
    Json(req): Json<ProfilePatch>,
) -> Result<Json<ApiResponse<Profile>>> {
    info!("PUT /profile - {}", ctx.user_id());

    let profile = state.profiles.update_profile(ctx.user_id(), req).await?;
    Ok(ApiResponse::ok("update profile successful", profile))
}
