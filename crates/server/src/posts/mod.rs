//! Posts, comments and the newsfeed
//!
//! `like_count` is written only by the like toggle in `graph`;
//! `comment_count` only by `create_comment`.

mod comments;
mod feed;

pub use comments::Comment;
pub use feed::{FeedItem, FEED_WINDOW_DAYS};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

pub const MAX_CONTENT_LEN: usize = 10_000;

#[derive(Debug, Error)]
pub enum PostError {
    #[error("Post not found")]
    NotFound,
    #[error("Comment not found")]
    CommentNotFound,
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Privacy {
    #[default]
    Public,
    Friends,
    Private,
}

impl Privacy {
    pub fn as_str(self) -> &'static str {
        match self {
            Privacy::Public => "public",
            Privacy::Friends => "friends",
            Privacy::Private => "private",
        }
    }
}

impl fmt::Display for Privacy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Privacy {
    type Err = PostError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(Privacy::Public),
            "friends" => Ok(Privacy::Friends),
            "private" => Ok(Privacy::Private),
            other => Err(PostError::InvalidInput(format!("unknown privacy '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub post_id: String,
    pub user_id: String,
    pub content: String,
    pub privacy: Privacy,
    pub like_count: i64,
    pub comment_count: i64,
    pub created_at: String,
}

type PostRow = (String, String, String, String, i64, i64, String);

fn post_from_row(row: PostRow) -> Result<Post, sqlx::Error> {
    let (post_id, user_id, content, privacy, like_count, comment_count, created_at) = row;
    let privacy = privacy
        .parse::<Privacy>()
        .map_err(|e: PostError| sqlx::Error::Decode(e.to_string().into()))?;
    Ok(Post {
        post_id,
        user_id,
        content,
        privacy,
        like_count,
        comment_count,
        created_at,
    })
}

/// Load a live (not deleted) post.
pub async fn load_post(pool: &SqlitePool, post_id: &str) -> Result<Option<Post>, sqlx::Error> {
    let row: Option<PostRow> = sqlx::query_as(
        "SELECT post_id, user_id, content, privacy, like_count, comment_count, created_at
         FROM posts WHERE post_id = ? AND deleted = 0",
    )
    .bind(post_id)
    .fetch_optional(pool)
    .await?;

    row.map(post_from_row).transpose()
}

pub struct PostStore {
    pool: SqlitePool,
}

fn check_content(content: &str) -> Result<&str, PostError> {
    let content = content.trim();
    if content.is_empty() {
        return Err(PostError::InvalidInput("content is required".to_string()));
    }
    if content.len() > MAX_CONTENT_LEN {
        return Err(PostError::InvalidInput("content is too long".to_string()));
    }
    Ok(content)
}

impl PostStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create_post(&self, user_id: &str, content: &str, privacy: Privacy) -> Result<Post, PostError> {
        let content = check_content(content)?;

        let post = Post {
            post_id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            content: content.to_string(),
            privacy,
            like_count: 0,
            comment_count: 0,
            created_at: Utc::now().to_rfc3339(),
        };

        sqlx::query(
            "INSERT INTO posts (post_id, user_id, content, privacy, like_count, comment_count, created_at)
             VALUES (?, ?, ?, ?, 0, 0, ?)",
        )
        .bind(&post.post_id)
        .bind(&post.user_id)
        .bind(&post.content)
        .bind(post.privacy.as_str())
        .bind(&post.created_at)
        .execute(&self.pool)
        .await?;

        info!(post_id = %post.post_id, user_id = %user_id, privacy = %privacy, "[Posts] Created");
        Ok(post)
    }

    pub async fn get_post(&self, post_id: &str) -> Result<Post, PostError> {
        load_post(&self.pool, post_id)
            .await?
            .ok_or(PostError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use tempfile::tempdir;

    #[test]
    fn test_privacy_parse() {
        assert_eq!("friends".parse::<Privacy>().unwrap(), Privacy::Friends);
        assert!("everyone".parse::<Privacy>().is_err());
        assert_eq!(Privacy::Private.to_string(), "private");
    }

    #[tokio::test]
    async fn test_create_and_get_post() {
        let dir = tempdir().unwrap();
        let pool = db::connect_file(&dir.path().join("posts.sqlite")).await.unwrap();
        let store = PostStore::new(pool);

        let post = store
            .create_post("user-1", "  hello world ", Privacy::Friends)
            .await
            .unwrap();
        assert_eq!(post.content, "hello world");

        let loaded = store.get_post(&post.post_id).await.unwrap();
        assert_eq!(loaded.user_id, "user-1");
        assert_eq!(loaded.privacy, Privacy::Friends);
        assert_eq!(loaded.like_count, 0);

        assert!(matches!(store.get_post("missing").await, Err(PostError::NotFound)));
        assert!(matches!(
            store.create_post("user-1", "   ", Privacy::Public).await,
            Err(PostError::InvalidInput(_))
        ));
    }
}
