use super::{aborted, clamp_page, run_until, GraphEngine, GraphError, Page};
use chrono::Utc;
use serde::Serialize;
use sqlx::{Sqlite, Transaction};
use tokio::time::Instant;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FollowAction {
    Followed,
    Refollowed,
    Unfollowed,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowToggle {
    pub status: &'static str,
    pub message: String,
    pub action: FollowAction,
    pub is_active: bool,
    pub is_mutual: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowerInfo {
    pub user_id: String,
    pub profile_id: Option<String>,
    pub firstname: String,
    pub lastname: String,
    pub avatar: String,
    pub is_mutual: bool,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct FollowCounts {
    pub num_of_followers: i64,
    pub num_of_following: i64,
}

/// Flip `is_mutual` on both directions of the pair in one statement.
async fn set_mutual(
    tx: &mut Transaction<'_, Sqlite>,
    a: &str,
    b: &str,
    mutual: bool,
) -> Result<(), GraphError> {
    sqlx::query(
        "UPDATE follows SET is_mutual = ?
         WHERE (follower_id = ? AND following_id = ?) OR (follower_id = ? AND following_id = ?)",
    )
    .bind(mutual)
    .bind(a)
    .bind(b)
    .bind(b)
    .bind(a)
    .execute(&mut **tx)
    .await
    .map_err(aborted)?;
    Ok(())
}

impl GraphEngine {
    /// Follow if not following, unfollow if following.
    ///
    /// Edges are never deleted; unfollow clears `is_active`. After every
    /// activation the reverse edge is consulted and `is_mutual` is written to
    /// both rows; after a deactivation both rows are forced non-mutual.
    pub async fn toggle_follow(&self, follower_id: &str, following_id: &str) -> Result<FollowToggle, GraphError> {
        self.toggle_follow_until(follower_id, following_id, self.default_deadline())
            .await
    }

    pub async fn toggle_follow_until(
        &self,
        follower_id: &str,
        following_id: &str,
        deadline: Instant,
    ) -> Result<FollowToggle, GraphError> {
        if follower_id == following_id {
            return Err(GraphError::SelfFollow);
        }
        run_until(deadline, self.toggle_follow_tx(follower_id, following_id)).await
    }

    async fn toggle_follow_tx(&self, follower_id: &str, following_id: &str) -> Result<FollowToggle, GraphError> {
        let mut tx = self.pool.begin().await.map_err(aborted)?;
        let now = Utc::now().to_rfc3339();

        let inserted = sqlx::query(
            "INSERT INTO follows (follower_id, following_id, is_active, is_mutual, created_at)
             VALUES (?, ?, 1, 0, ?)
             ON CONFLICT(follower_id, following_id) DO NOTHING",
        )
        .bind(follower_id)
        .bind(following_id)
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(aborted)?
        .rows_affected()
            == 1;

        let (is_active, action) = if inserted {
            (true, FollowAction::Followed)
        } else {
            let (is_active,): (bool,) = sqlx::query_as(
                "UPDATE follows SET is_active = NOT is_active, updated_at = ?
                 WHERE follower_id = ? AND following_id = ?
                 RETURNING is_active",
            )
            .bind(&now)
            .bind(follower_id)
            .bind(following_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(aborted)?;
            let action = if is_active {
                FollowAction::Refollowed
            } else {
                FollowAction::Unfollowed
            };
            (is_active, action)
        };

        let is_mutual = if is_active {
            let reverse: Option<(bool,)> = sqlx::query_as(
                "SELECT is_active FROM follows WHERE follower_id = ? AND following_id = ?",
            )
            .bind(following_id)
            .bind(follower_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(aborted)?;
            let mutual = matches!(reverse, Some((true,)));
            if mutual {
                set_mutual(&mut tx, follower_id, following_id, true).await?;
            }
            mutual
        } else {
            set_mutual(&mut tx, follower_id, following_id, false).await?;
            false
        };

        tx.commit().await.map_err(aborted)?;

        let message = match action {
            FollowAction::Followed => format!("follow {following_id} successful"),
            FollowAction::Refollowed => format!("refollow {following_id} successful"),
            FollowAction::Unfollowed => format!("unfollow {following_id} successful"),
        };
        info!(
            follower = %follower_id,
            following = %following_id,
            ?action,
            is_mutual,
            "[Graph] Follow toggled"
        );

        Ok(FollowToggle {
            status: "successful",
            message,
            action,
            is_active,
            is_mutual,
        })
    }

    /// Current state of one directed edge: `(is_active, is_mutual)`.
    pub async fn follow_edge(&self, follower_id: &str, following_id: &str) -> Result<Option<(bool, bool)>, GraphError> {
        let row: Option<(bool, bool)> = sqlx::query_as(
            "SELECT is_active, is_mutual FROM follows WHERE follower_id = ? AND following_id = ?",
        )
        .bind(follower_id)
        .bind(following_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn followers(&self, user_id: &str, limit: i64, offset: i64) -> Result<Page<FollowerInfo>, GraphError> {
        self.follow_list(user_id, limit, offset, true).await
    }

    pub async fn following(&self, user_id: &str, limit: i64, offset: i64) -> Result<Page<FollowerInfo>, GraphError> {
        self.follow_list(user_id, limit, offset, false).await
    }

    /// `incoming == true` lists who follows `user_id`; otherwise whom
    /// `user_id` follows. Active edges only, ordered by last name.
    async fn follow_list(
        &self,
        user_id: &str,
        limit: i64,
        offset: i64,
        incoming: bool,
    ) -> Result<Page<FollowerInfo>, GraphError> {
        let (limit, offset) = clamp_page(limit, offset);
        let (other_col, self_col) = if incoming {
            ("follower_id", "following_id")
        } else {
            ("following_id", "follower_id")
        };

        let (total,): (i64,) = sqlx::query_as(&format!(
            "SELECT COUNT(*) FROM follows WHERE {self_col} = ? AND is_active = 1"
        ))
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        let rows: Vec<(String, Option<String>, Option<String>, Option<String>, Option<String>, bool)> =
            sqlx::query_as(&format!(
                "SELECT f.{other_col}, p.profile_id, p.firstname, p.lastname, p.avatar_url, f.is_mutual
                 FROM follows f
                 LEFT JOIN profiles p ON p.user_id = f.{other_col}
                 WHERE f.{self_col} = ? AND f.is_active = 1
                 ORDER BY COALESCE(p.lastname, '') ASC, f.{other_col} ASC
                 LIMIT ? OFFSET ?"
            ))
            .bind(user_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        let data = rows
            .into_iter()
            .map(|(user_id, profile_id, firstname, lastname, avatar, is_mutual)| FollowerInfo {
                user_id,
                profile_id,
                firstname: firstname.unwrap_or_default(),
                lastname: lastname.unwrap_or_default(),
                avatar: avatar.unwrap_or_default(),
                is_mutual,
            })
            .collect();

        Ok(Page {
            data,
            limit,
            offset,
            total,
        })
    }

    pub async fn follow_counts(&self, user_id: &str) -> Result<FollowCounts, GraphError> {
        let (followers, following): (i64, i64) = sqlx::query_as(
            "SELECT
                (SELECT COUNT(*) FROM follows WHERE following_id = ? AND is_active = 1),
                (SELECT COUNT(*) FROM follows WHERE follower_id = ? AND is_active = 1)",
        )
        .bind(user_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(FollowCounts {
            num_of_followers: followers,
            num_of_following: following,
        })
    }
}
