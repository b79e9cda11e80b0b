use super::{aborted, clamp_page, run_until, GraphEngine, GraphError, Page};
use crate::posts::{load_post, Post};
use chrono::Utc;
use serde::Serialize;
use tokio::time::Instant;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeToggle {
    pub post_id: String,
    pub is_active: bool,
    pub like_count: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LikerInfo {
    pub user_id: String,
    pub profile_id: Option<String>,
    pub firstname: String,
    pub lastname: String,
    pub avatar: String,
}

impl GraphEngine {
    /// Like if not liked, unlike if liked. `posts.like_count` moves by ±1 in
    /// the same transaction as the edge flip, so it always equals the number
    /// of active like edges for the post.
    pub async fn toggle_like(&self, user_id: &str, post_id: &str) -> Result<LikeToggle, GraphError> {
        self.toggle_like_until(user_id, post_id, self.default_deadline())
            .await
    }

    pub async fn toggle_like_until(
        &self,
        user_id: &str,
        post_id: &str,
        deadline: Instant,
    ) -> Result<LikeToggle, GraphError> {
        if load_post(&self.pool, post_id).await?.is_none() {
            return Err(GraphError::NotFound("Post".to_string()));
        }
        run_until(deadline, self.toggle_like_tx(user_id, post_id)).await
    }

    async fn toggle_like_tx(&self, user_id: &str, post_id: &str) -> Result<LikeToggle, GraphError> {
        let mut tx = self.pool.begin().await.map_err(aborted)?;
        let now = Utc::now().to_rfc3339();

        let inserted = sqlx::query(
            "INSERT INTO likes (like_id, post_id, user_id, type, is_active, created_at)
             VALUES (?, ?, ?, 'post', 1, ?)
             ON CONFLICT(post_id, user_id) DO NOTHING",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(post_id)
        .bind(user_id)
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(aborted)?
        .rows_affected()
            == 1;

        let is_active = if inserted {
            true
        } else {
            let (is_active,): (bool,) = sqlx::query_as(
                "UPDATE likes SET is_active = NOT is_active, updated_at = ?
                 WHERE post_id = ? AND user_id = ?
                 RETURNING is_active",
            )
            .bind(&now)
            .bind(post_id)
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(aborted)?;
            is_active
        };

        let delta: i64 = if is_active { 1 } else { -1 };
        let updated: Option<(i64,)> = sqlx::query_as(
            "UPDATE posts SET like_count = like_count + ?
             WHERE post_id = ? AND deleted = 0
             RETURNING like_count",
        )
        .bind(delta)
        .bind(post_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(aborted)?;

        // Post vanished between the existence check and now; dropping tx rolls back
        let Some((like_count,)) = updated else {
            return Err(GraphError::NotFound("Post".to_string()));
        };

        tx.commit().await.map_err(aborted)?;

        info!(user = %user_id, post = %post_id, is_active, like_count, "[Graph] Like toggled");

        Ok(LikeToggle {
            post_id: post_id.to_string(),
            is_active,
            like_count,
        })
    }

    /// Current state of one like edge, if ever created.
    pub async fn like_edge(&self, user_id: &str, post_id: &str) -> Result<Option<bool>, GraphError> {
        let row: Option<(bool,)> =
            sqlx::query_as("SELECT is_active FROM likes WHERE post_id = ? AND user_id = ?")
                .bind(post_id)
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(active,)| active))
    }

    /// Active likers of a post, subject to the configured visibility policy.
    /// `viewer` is `None` for guests.
    pub async fn likers(
        &self,
        viewer: Option<&str>,
        post_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Page<LikerInfo>, GraphError> {
        let post: Post = load_post(&self.pool, post_id)
            .await?
            .ok_or_else(|| GraphError::NotFound("Post".to_string()))?;
        self.likers_policy.check(self, viewer, &post).await?;

        let (limit, offset) = clamp_page(limit, offset);
        let (total,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM likes WHERE post_id = ? AND is_active = 1")
                .bind(post_id)
                .fetch_one(&self.pool)
                .await?;

        let rows: Vec<(String, Option<String>, Option<String>, Option<String>, Option<String>)> =
            sqlx::query_as(
                "SELECT l.user_id, p.profile_id, p.firstname, p.lastname, p.avatar_url
                 FROM likes l
                 LEFT JOIN profiles p ON p.user_id = l.user_id
                 WHERE l.post_id = ? AND l.is_active = 1
                 ORDER BY COALESCE(p.lastname, '') ASC, l.user_id ASC
                 LIMIT ? OFFSET ?",
            )
            .bind(post_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        let data = rows
            .into_iter()
            .map(|(user_id, profile_id, firstname, lastname, avatar)| LikerInfo {
                user_id,
                profile_id,
                firstname: firstname.unwrap_or_default(),
                lastname: lastname.unwrap_or_default(),
                avatar: avatar.unwrap_or_default(),
            })
            .collect();

        Ok(Page {
            data,
            limit,
            offset,
            total,
        })
    }
}
