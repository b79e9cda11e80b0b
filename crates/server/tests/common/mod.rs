#![allow(dead_code)]

use social_server::auth::{ManualClock, TokenService};
use social_server::config::{AppConfig, AppState};
use social_server::db;
use social_server::session::MemorySessionStore;
use std::sync::Arc;
use tempfile::TempDir;

pub const T0: i64 = 1_700_000_000;

/// Fully wired state over a temp database, an in-memory session store and
/// a manual clock. Keep `_dir` alive for the duration of the test.
pub struct TestApp {
    pub _dir: TempDir,
    pub state: AppState,
    pub sessions: Arc<MemorySessionStore>,
    pub clock: Arc<ManualClock>,
}

pub fn test_config() -> AppConfig {
    AppConfig {
        jwt_secret: "integration-secret".to_string(),
        bcrypt_cost: 4,
        ..AppConfig::default()
    }
}

pub async fn test_app() -> TestApp {
    test_app_with(test_config(), Some(T0)).await
}

/// `clock_start: None` keeps the real system clock.
pub async fn test_app_with(config: AppConfig, clock_start: Option<i64>) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let pool = db::connect_file(&dir.path().join("social.sqlite")).await.unwrap();
    let sessions = Arc::new(MemorySessionStore::new());
    let clock = Arc::new(ManualClock::new(clock_start.unwrap_or(T0)));

    let mut tokens = TokenService::new(config.token_settings(), sessions.clone());
    if clock_start.is_some() {
        tokens = tokens.with_clock(clock.clone());
    }

    let state = AppState::with_tokens(config, pool, Arc::new(tokens)).unwrap();
    TestApp {
        _dir: dir,
        state,
        sessions,
        clock,
    }
}

/// Register a user and return its id.
pub async fn register(app: &TestApp, username: &str) -> String {
    app.state
        .identity
        .register(username, "correct horse battery staple")
        .await
        .unwrap()
        .user_id
}
