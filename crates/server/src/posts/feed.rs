use super::{PostError, PostStore, Privacy};
use crate::graph::{clamp_page, Page};
use chrono::{Duration, Utc};
use serde::Serialize;

/// Posts older than this drop out of the newsfeed.
pub const FEED_WINDOW_DAYS: i64 = 7;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedItem {
    pub post_id: String,
    pub user_id: String,
    pub firstname: String,
    pub lastname: String,
    pub avatar: String,
    pub content: String,
    pub privacy: Privacy,
    pub like_count: i64,
    pub comment_count: i64,
    pub created_at: String,
    /// Whether the viewer currently likes the post.
    pub liked: bool,
}

type FeedRow = (
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    i64,
    i64,
    String,
    bool,
);

// Own posts, plus posts of actively followed users that are public, or
// friends-only with a mutual edge. Private posts stay with their owner.
const FEED_FILTER: &str = "FROM posts p
     LEFT JOIN profiles pf ON pf.user_id = p.user_id
     LEFT JOIN follows f
       ON f.follower_id = ? AND f.following_id = p.user_id AND f.is_active = 1
     WHERE p.deleted = 0 AND p.created_at >= ?
       AND (p.user_id = ?
            OR (f.id IS NOT NULL
                AND (p.privacy = 'public' OR (p.privacy = 'friends' AND f.is_mutual = 1))))";

impl PostStore {
    /// Recent posts visible to `viewer`, newest first.
    pub async fn newsfeed(&self, viewer: &str, limit: i64, offset: i64) -> Result<Page<FeedItem>, PostError> {
        let (limit, offset) = clamp_page(limit, offset);
        let since = (Utc::now() - Duration::days(FEED_WINDOW_DAYS)).to_rfc3339();

        let (total,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) {FEED_FILTER}"))
            .bind(viewer)
            .bind(&since)
            .bind(viewer)
            .fetch_one(&self.pool)
            .await?;

        let rows: Vec<FeedRow> = sqlx::query_as(&format!(
            "SELECT p.post_id, p.user_id, COALESCE(pf.firstname, ''), COALESCE(pf.lastname, ''),
                    COALESCE(pf.avatar_url, ''), p.content, p.privacy, p.like_count, p.comment_count,
                    p.created_at,
                    EXISTS(SELECT 1 FROM likes l
                           WHERE l.post_id = p.post_id AND l.user_id = ? AND l.is_active = 1)
             {FEED_FILTER}
             ORDER BY p.created_at DESC, p.post_id
             LIMIT ? OFFSET ?"
        ))
        .bind(viewer)
        .bind(viewer)
        .bind(&since)
        .bind(viewer)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let mut data = Vec::with_capacity(rows.len());
        for row in rows {
            let (
                post_id,
                user_id,
                firstname,
                lastname,
                avatar,
                content,
                privacy,
                like_count,
                comment_count,
                created_at,
                liked,
            ) = row;
            data.push(FeedItem {
                post_id,
                user_id,
                firstname,
                lastname,
                avatar,
                content,
                privacy: privacy.parse()?,
                like_count,
                comment_count,
                created_at,
                liked,
            });
        }

        Ok(Page {
            data,
            limit,
            offset,
            total,
        })
    }
}
