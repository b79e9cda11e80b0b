//! Follow and like handlers

use super::{ApiResponse, PageQuery};
use crate::config::AppState;
use crate::ctx::Ctx;
use crate::error::Result;
use crate::graph::{FollowCounts, FollowToggle, FollowerInfo, LikeToggle, LikerInfo, Page};
use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use tracing::info;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowRequest {
    pub following_id: String,
}

/// POST /follow
pub async fn toggle_follow(
    State(state): State<AppState>,
    ctx: Ctx,
    Json(req): Json<FollowRequest>,
) -> Result<Json<FollowToggle>> {
    info!("POST /follow - {} -> {}", ctx.user_id(), req.following_id);

    let result = state.graph.toggle_follow(ctx.user_id(), &req.following_id).await?;
    Ok(Json(result))
}

/// GET /users/{id}/followers
pub async fn followers(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(page): Query<PageQuery>,
) -> Result<Json<ApiResponse<Page<FollowerInfo>>>> {
    let followers = state.graph.followers(&user_id, page.limit, page.offset).await?;
    Ok(ApiResponse::ok("retrieve followers successful", followers))
}

/// GET /users/{id}/following
pub async fn following(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(page): Query<PageQuery>,
) -> Result<Json<ApiResponse<Page<FollowerInfo>>>> {
    let following = state.graph.following(&user_id, page.limit, page.offset).await?;
    Ok(ApiResponse::ok("retrieve following successful", following))
}

/// GET /users/{id}/follow-counts
pub async fn follow_counts(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<ApiResponse<FollowCounts>>> {
    let counts = state.graph.follow_counts(&user_id).await?;
    Ok(ApiResponse::ok("retrieve follow counts successful", counts))
}

/// POST /{post_id}/like
pub async fn toggle_like(
    State(state): State<AppState>,
    ctx: Ctx,
    Path(post_id): Path<String>,
) -> Result<Json<ApiResponse<LikeToggle>>> {
    info!("POST /{}/like - {}", post_id, ctx.user_id());

    let result = state.graph.toggle_like(ctx.user_id(), &post_id).await?;
    let message = if result.is_active {
        "like successful"
    } else {
        "unlike successful"
    };
    Ok(ApiResponse::ok(message, result))
}

/// GET /{post_id}/likers
pub async fn likers(
    State(state): State<AppState>,
    ctx: Option<Ctx>,
    Path(post_id): Path<String>,
    Query(page): Query<PageQuery>,
) -> Result<Json<ApiResponse<Page<LikerInfo>>>> {
    let viewer = ctx.as_ref().map(Ctx::user_id);
    let likers = state
        .graph
        .likers(viewer, &post_id, page.limit, page.offset)
        .await?;
    Ok(ApiResponse::ok("retrieve likers successful", likers))
}
