//! Who may see a post's likers.

use super::{GraphEngine, GraphError};
use crate::posts::{Post, Privacy};
use async_trait::async_trait;

#[async_trait]
pub trait LikerVisibility: Send + Sync + 'static {
    async fn check(&self, engine: &GraphEngine, viewer: Option<&str>, post: &Post) -> Result<(), GraphError>;
}

/// Guests see likers of public posts only. Signed-in viewers also see them
/// on their own posts and on posts of users they are mutual followers with.
pub struct PrivacyPolicy;

#[async_trait]
impl LikerVisibility for PrivacyPolicy {
    async fn check(&self, engine: &GraphEngine, viewer: Option<&str>, post: &Post) -> Result<(), GraphError> {
        if post.privacy == Privacy::Public {
            return Ok(());
        }
        let Some(viewer) = viewer else {
            return Err(GraphError::Forbidden(
                "you don't have permission to get likers in this post".to_string(),
            ));
        };
        if viewer == post.user_id {
            return Ok(());
        }
        if post.privacy == Privacy::Friends {
            if let Some((true, true)) = engine.follow_edge(&post.user_id, viewer).await? {
                return Ok(());
            }
        }
        Err(GraphError::Forbidden(
            "you don't have permission to get likers in this post".to_string(),
        ))
    }
}

/// No restriction.
pub struct AllowAll;

#[async_trait]
impl LikerVisibility for AllowAll {
    async fn check(&self, _engine: &GraphEngine, _viewer: Option<&str>, _post: &Post) -> Result<(), GraphError> {
        Ok(())
    }
}
