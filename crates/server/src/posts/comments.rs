use super::{check_content, PostError, PostStore};
use crate::graph::{clamp_page, Page};
use chrono::Utc;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub comment_id: String,
    pub post_id: String,
    pub user_id: String,
    pub parent_id: Option<String>,
    pub content: String,
    pub reply_count: i64,
    pub created_at: String,
    pub updated_at: Option<String>,
    pub profile_id: Option<String>,
    pub firstname: String,
    pub lastname: String,
    pub avatar: String,
}

type CommentRow = (
    String,
    String,
    String,
    Option<String>,
    String,
    i64,
    String,
    Option<String>,
    Option<String>,
    String,
    String,
    String,
);

const COMMENT_COLUMNS: &str = "c.comment_id, c.post_id, c.user_id, c.parent_id, c.content, c.reply_count,
     c.created_at, c.updated_at, pf.profile_id, COALESCE(pf.firstname, ''),
     COALESCE(pf.lastname, ''), COALESCE(pf.avatar_url, '')";

fn comment_from_row(row: CommentRow) -> Comment {
    let (
        comment_id,
        post_id,
        user_id,
        parent_id,
        content,
        reply_count,
        created_at,
        updated_at,
        profile_id,
        firstname,
        lastname,
        avatar,
    ) = row;
    Comment {
        comment_id,
        post_id,
        user_id,
        parent_id,
        content,
        reply_count,
        created_at,
        updated_at,
        profile_id,
        firstname,
        lastname,
        avatar,
    }
}

async fn load_comment(pool: &SqlitePool, comment_id: &str) -> Result<Option<Comment>, sqlx::Error> {
    let row: Option<CommentRow> = sqlx::query_as(&format!(
        "SELECT {COMMENT_COLUMNS}
         FROM comments c
         LEFT JOIN profiles pf ON pf.user_id = c.user_id
         WHERE c.comment_id = ? AND c.status = 'active'"
    ))
    .bind(comment_id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(comment_from_row))
}

impl PostStore {
    /// Add a comment (or a reply when `parent_id` is set) to a live post.
    ///
    /// The post's `comment_count` and the parent's `reply_count` move in the
    /// same transaction as the insert.
    pub async fn create_comment(
        &self,
        user_id: &str,
        post_id: &str,
        content: &str,
        parent_id: Option<&str>,
    ) -> Result<Comment, PostError> {
        let content = check_content(content)?;
        let parent_id = parent_id.map(str::trim).filter(|p| !p.is_empty());
        let comment_id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        let mut tx = self.pool.begin().await?;

        let counted: Option<(i64,)> = sqlx::query_as(
            "UPDATE posts SET comment_count = comment_count + 1
             WHERE post_id = ? AND deleted = 0
             RETURNING comment_count",
        )
        .bind(post_id)
        .fetch_optional(&mut *tx)
        .await?;
        if counted.is_none() {
            return Err(PostError::NotFound);
        }

        if let Some(parent) = parent_id {
            let replied = sqlx::query(
                "UPDATE comments SET reply_count = reply_count + 1
                 WHERE comment_id = ? AND post_id = ? AND status = 'active'",
            )
            .bind(parent)
            .bind(post_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
            if replied == 0 {
                return Err(PostError::InvalidInput(
                    "parent comment does not belong to this post".to_string(),
                ));
            }
        }

        sqlx::query(
            "INSERT INTO comments (comment_id, post_id, user_id, parent_id, content, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&comment_id)
        .bind(post_id)
        .bind(user_id)
        .bind(parent_id)
        .bind(content)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(comment_id = %comment_id, post_id = %post_id, user_id = %user_id, "[Posts] Comment created");
        load_comment(&self.pool, &comment_id)
            .await?
            .ok_or(PostError::CommentNotFound)
    }

    /// Active comments on a live post, newest first.
    pub async fn comments(&self, post_id: &str, limit: i64, offset: i64) -> Result<Page<Comment>, PostError> {
        self.get_post(post_id).await?;
        let (limit, offset) = clamp_page(limit, offset);

        let (total,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM comments WHERE post_id = ? AND status = 'active'")
                .bind(post_id)
                .fetch_one(&self.pool)
                .await?;

        let rows: Vec<CommentRow> = sqlx::query_as(&format!(
            "SELECT {COMMENT_COLUMNS}
             FROM comments c
             LEFT JOIN profiles pf ON pf.user_id = c.user_id
             WHERE c.post_id = ? AND c.status = 'active'
             ORDER BY c.created_at DESC, c.comment_id
             LIMIT ? OFFSET ?"
        ))
        .bind(post_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(Page {
            data: rows.into_iter().map(comment_from_row).collect(),
            limit,
            offset,
            total,
        })
    }

    /// Replace the text of one of `user_id`'s own comments on `post_id`.
    pub async fn update_comment(
        &self,
        user_id: &str,
        post_id: &str,
        comment_id: &str,
        content: &str,
    ) -> Result<Comment, PostError> {
        let content = check_content(content)?;

        let updated = sqlx::query(
            "UPDATE comments SET content = ?, updated_at = ?
             WHERE comment_id = ? AND post_id = ? AND user_id = ? AND status = 'active'",
        )
        .bind(content)
        .bind(Utc::now().to_rfc3339())
        .bind(comment_id)
        .bind(post_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if updated == 0 {
            return match load_comment(&self.pool, comment_id).await? {
                Some(existing) if existing.post_id == post_id => Err(PostError::Forbidden(
                    "only the author can edit a comment".to_string(),
                )),
                _ => Err(PostError::CommentNotFound),
            };
        }

        info!(comment_id = %comment_id, user_id = %user_id, "[Posts] Comment updated");
        load_comment(&self.pool, comment_id)
            .await?
            .ok_or(PostError::CommentNotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::posts::Privacy;
    use tempfile::tempdir;

    async fn store() -> (tempfile::TempDir, PostStore) {
        let dir = tempdir().unwrap();
        let pool = db::connect_file(&dir.path().join("comments.sqlite")).await.unwrap();
        (dir, PostStore::new(pool))
    }

    #[tokio::test]
    async fn test_comment_counts_follow_inserts() {
        let (_dir, store) = store().await;
        let post = store.create_post("author", "hello", Privacy::Public).await.unwrap();

        let first = store
            .create_comment("reader", &post.post_id, " nice ", None)
            .await
            .unwrap();
        assert_eq!(first.content, "nice");
        assert_eq!(first.parent_id, None);

        let reply = store
            .create_comment("author", &post.post_id, "thanks", Some(&first.comment_id))
            .await
            .unwrap();
        assert_eq!(reply.parent_id.as_deref(), Some(first.comment_id.as_str()));

        let loaded = store.get_post(&post.post_id).await.unwrap();
        assert_eq!(loaded.comment_count, 2);

        let page = store.comments(&post.post_id, 10, 0).await.unwrap();
        assert_eq!(page.total, 2);
        let parent = page.data.iter().find(|c| c.comment_id == first.comment_id).unwrap();
        assert_eq!(parent.reply_count, 1);
    }

    #[tokio::test]
    async fn test_failed_comment_leaves_counts_alone() {
        let (_dir, store) = store().await;
        let post = store.create_post("author", "hello", Privacy::Public).await.unwrap();
        let other = store.create_post("author", "other", Privacy::Public).await.unwrap();
        let foreign = store
            .create_comment("reader", &other.post_id, "elsewhere", None)
            .await
            .unwrap();

        // Parent from a different post: the count bump is rolled back
        let err = store
            .create_comment("reader", &post.post_id, "reply", Some(&foreign.comment_id))
            .await
            .unwrap_err();
        assert!(matches!(err, PostError::InvalidInput(_)));
        assert_eq!(store.get_post(&post.post_id).await.unwrap().comment_count, 0);

        assert!(matches!(
            store.create_comment("reader", "missing", "hi", None).await,
            Err(PostError::NotFound)
        ));
        assert!(matches!(
            store.create_comment("reader", &post.post_id, "  ", None).await,
            Err(PostError::InvalidInput(_))
        ));
        assert_eq!(store.comments(&post.post_id, 0, 0).await.unwrap().total, 0);
    }

    #[tokio::test]
    async fn test_only_author_can_update_comment() {
        let (_dir, store) = store().await;
        let post = store.create_post("author", "hello", Privacy::Public).await.unwrap();
        let comment = store
            .create_comment("reader", &post.post_id, "first draft", None)
            .await
            .unwrap();

        let err = store
            .update_comment("author", &post.post_id, &comment.comment_id, "hijack")
            .await
            .unwrap_err();
        assert!(matches!(err, PostError::Forbidden(_)));

        let updated = store
            .update_comment("reader", &post.post_id, &comment.comment_id, "second draft")
            .await
            .unwrap();
        assert_eq!(updated.content, "second draft");
        assert!(updated.updated_at.is_some());

        assert!(matches!(
            store.update_comment("reader", &post.post_id, "missing", "x").await,
            Err(PostError::CommentNotFound)
        ));
    }
}
