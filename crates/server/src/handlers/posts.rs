//! Post handlers

use super::{ApiResponse, PageQuery};
use crate::config::AppState;
use crate::ctx::Ctx;
use crate::error::Result;
use crate::graph::Page;
use crate::posts::{Comment, FeedItem, Post, Privacy};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct CreatePostRequest {
    pub content: String,
    #[serde(default)]
    pub privacy: Privacy,
}

#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    pub content: String,
    /// Comment being replied to, if any.
    #[serde(default)]
    pub parent: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCommentRequest {
    pub comment_id: String,
    pub content: String,
}

/// POST /posts
pub async fn create_post(
    State(state): State<AppState>,
    ctx: Ctx,
    Json(req): Json<CreatePostRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Post>>)> {
    info!("POST /posts - {}", ctx.user_id());

    let post = state
        .posts
        .create_post(ctx.user_id(), &req.content, req.privacy)
        .await?;
    Ok((StatusCode::CREATED, ApiResponse::ok("create post successful", post)))
}

/// GET /posts/{id}
pub async fn get_post(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> Result<Json<ApiResponse<Post>>> {
    let post = state.posts.get_post(&post_id).await?;
    Ok(ApiResponse::ok("retrieve post successful", post))
}

/// GET /newsfeed
pub async fn newsfeed(
    State(state): State<AppState>,
    ctx: Ctx,
    Query(page): Query<PageQuery>,
) -> Result<Json<ApiResponse<Page<FeedItem>>>> {
    info!("GET /newsfeed - {}", ctx.user_id());

    let feed = state
        .posts
        .newsfeed(ctx.user_id(), page.limit, page.offset)
        .await?;
    Ok(ApiResponse::ok("retrieve newsfeed successful", feed))
}

/// POST /posts/{id}/comments
pub async fn create_comment(
    State(state): State<AppState>,
    ctx: Ctx,
    Path(post_id): Path<String>,
    Json(req): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Comment>>)> {
    info!("POST /posts/{}/comments - {}", post_id, ctx.user_id());

    let comment = state
        .posts
        .create_comment(ctx.user_id(), &post_id, &req.content, req.parent.as_deref())
        .await?;
    Ok((StatusCode::CREATED, ApiResponse::ok("create comment successful", comment)))
}

/// GET /posts/{id}/comments
pub async fn comments(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    Query(page): Query<PageQuery>,
) -> Result<Json<ApiResponse<Page<Comment>>>> {
    let comments = state.posts.comments(&post_id, page.limit, page.offset).await?;
    Ok(ApiResponse::ok("retrieve comments successful", comments))
}

/// PUT /posts/{id}/comments
pub async fn update_comment(
    State(state): State<AppState>,
    ctx: Ctx,
    Path(post_id): Path<String>,
    Json(req): Json<UpdateCommentRequest>,
) -> Result<Json<ApiResponse<Comment>>> {
    info!("PUT /posts/{}/comments - {}", post_id, ctx.user_id());

    let comment = state
        .posts
        .update_comment(ctx.user_id(), &post_id, &req.comment_id, &req.content)
        .await?;
    Ok(ApiResponse::ok("modify comment successful", comment))
}
