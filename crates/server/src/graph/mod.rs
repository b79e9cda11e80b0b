//! Graph Mutation Engine
//!
//! Toggle operations over the two edge tables (`follows`, `likes`) plus the
//! read queries that sit next to them. Each toggle runs in one SQLite
//! transaction whose first statement is a write, so concurrent toggles on
//! the same pair queue on the database write lock rather than interleave.
//! Dropping an open transaction (error, deadline, or the caller going away)
//! rolls it back.

mod follow;
mod like;
mod policy;

pub use follow::{FollowAction, FollowCounts, FollowToggle, FollowerInfo};
pub use like::{LikeToggle, LikerInfo};
pub use policy::{AllowAll, LikerVisibility, PrivacyPolicy};

use serde::Serialize;
use sqlx::SqlitePool;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

pub const DEFAULT_TX_TIMEOUT: Duration = Duration::from_secs(5);
pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("Can not follow yourself")]
    SelfFollow,
    #[error("{0} not found")]
    NotFound(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Transaction aborted: {0}")]
    TransactionAborted(String),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Any failure inside a mutation transaction.
pub(crate) fn aborted(err: sqlx::Error) -> GraphError {
    GraphError::TransactionAborted(err.to_string())
}

/// A page of rows plus the total the query would return unpaged.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub limit: i64,
    pub offset: i64,
    pub total: i64,
}

/// `limit <= 0` means "no limit" like the list endpoints always allowed,
/// capped at MAX_PAGE_SIZE.
pub(crate) fn clamp_page(limit: i64, offset: i64) -> (i64, i64) {
    let limit = if limit <= 0 || limit > MAX_PAGE_SIZE {
        MAX_PAGE_SIZE
    } else {
        limit
    };
    (limit, offset.max(0))
}

pub struct GraphEngine {
    pool: SqlitePool,
    tx_timeout: Duration,
    likers_policy: Arc<dyn LikerVisibility>,
}

impl GraphEngine {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            tx_timeout: DEFAULT_TX_TIMEOUT,
            likers_policy: Arc::new(PrivacyPolicy),
        }
    }

    pub fn with_tx_timeout(mut self, tx_timeout: Duration) -> Self {
        self.tx_timeout = tx_timeout;
        self
    }

    pub fn with_likers_policy(mut self, policy: Arc<dyn LikerVisibility>) -> Self {
        self.likers_policy = policy;
        self
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn default_deadline(&self) -> Instant {
        Instant::now() + self.tx_timeout
    }
}

/// Run a mutation under `deadline`. On expiry the inner future, and with it
/// the open transaction, is dropped and rolled back.
async fn run_until<T, F>(deadline: Instant, op: F) -> Result<T, GraphError>
where
    F: Future<Output = Result<T, GraphError>>,
{
    if Instant::now() >= deadline {
        return Err(GraphError::TransactionAborted("deadline exceeded".to_string()));
    }
    match tokio::time::timeout_at(deadline, op).await {
        Ok(result) => result,
        Err(_) => Err(GraphError::TransactionAborted(
            "deadline exceeded before commit".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_page() {
        assert_eq!(clamp_page(10, 5), (10, 5));
        assert_eq!(clamp_page(0, 0), (MAX_PAGE_SIZE, 0));
        assert_eq!(clamp_page(-3, -1), (MAX_PAGE_SIZE, 0));
        assert_eq!(clamp_page(1000, 2), (MAX_PAGE_SIZE, 2));
    }

    #[tokio::test]
    async fn test_run_until_past_deadline_never_starts() {
        let started = std::sync::atomic::AtomicBool::new(false);
        let deadline = Instant::now() - Duration::from_millis(1);
        let result = run_until(deadline, async {
            started.store(true, std::sync::atomic::Ordering::SeqCst);
            Ok::<_, GraphError>(())
        })
        .await;

        assert!(matches!(result, Err(GraphError::TransactionAborted(_))));
        assert!(!started.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_run_until_times_out() {
        let deadline = Instant::now() + Duration::from_millis(20);
        let result = run_until(deadline, async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, GraphError>(())
        })
        .await;
        assert!(matches!(result, Err(GraphError::TransactionAborted(_))));
    }
}
