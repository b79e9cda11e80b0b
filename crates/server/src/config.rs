//! Server configuration and shared state

use std::sync::Arc;
use std::time::Duration;

use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{info, warn};

use crate::auth::password::DEFAULT_SALT_SIZE;
use crate::auth::token::{DEFAULT_ACCESS_TTL, DEFAULT_REFRESH_TTL};
use crate::auth::{IdentityError, IdentityService, PasswordHandler, TokenService, TokenSettings};
use crate::db;
use crate::graph::{GraphEngine, DEFAULT_TX_TIMEOUT};
use crate::posts::PostStore;
use crate::profile::ProfileStore;
use crate::session::{MemorySessionStore, RedisSessionStore, SessionStore, SessionStoreError};

const DEV_SECRET: &str = "dev-only-secret-change-me";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

/// Configuration for the social server
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub bind_address: String,
    pub database_url: String,
    /// In-process session store when unset
    pub redis_url: Option<String>,
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub bcrypt_cost: u32,
    pub salt_size: usize,
    pub tx_timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3001".to_string(),
            database_url: "sqlite://social.sqlite".to_string(),
            redis_url: None,
            jwt_secret: DEV_SECRET.to_string(),
            jwt_issuer: "social-server".to_string(),
            access_ttl: DEFAULT_ACCESS_TTL,
            refresh_ttl: DEFAULT_REFRESH_TTL,
            bcrypt_cost: bcrypt::DEFAULT_COST,
            salt_size: DEFAULT_SALT_SIZE,
            tx_timeout: DEFAULT_TX_TIMEOUT,
        }
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { key, value }),
        None => Ok(None),
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let jwt_secret = match lookup("JWT_SECRET_KEY") {
            Some(secret) => secret,
            None => {
                warn!("JWT_SECRET_KEY not set, using a development secret");
                defaults.jwt_secret
            }
        };

        let config = Self {
            bind_address: lookup("BIND_ADDRESS").unwrap_or(defaults.bind_address),
            database_url: lookup("DATABASE_URL").unwrap_or(defaults.database_url),
            redis_url: lookup("REDIS_URL").filter(|url| !url.trim().is_empty()),
            jwt_secret,
            jwt_issuer: lookup("JWT_ISSUER").unwrap_or(defaults.jwt_issuer),
            access_ttl: parse_var(&lookup, "ACCESS_TOKEN_TTL_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.access_ttl),
            refresh_ttl: parse_var(&lookup, "REFRESH_TOKEN_TTL_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.refresh_ttl),
            bcrypt_cost: parse_var(&lookup, "BCRYPT_COST")?.unwrap_or(defaults.bcrypt_cost),
            salt_size: parse_var(&lookup, "SALT_SIZE")?.unwrap_or(defaults.salt_size),
            tx_timeout: parse_var(&lookup, "TX_TIMEOUT_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.tx_timeout),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.is_empty() {
            return Err(ConfigError::ValidationError(
                "JWT_SECRET_KEY cannot be empty".to_string(),
            ));
        }
        if self.access_ttl.is_zero() || self.refresh_ttl.is_zero() {
            return Err(ConfigError::ValidationError(
                "token TTLs must be greater than zero".to_string(),
            ));
        }
        if !(4..=31).contains(&self.bcrypt_cost) {
            return Err(ConfigError::ValidationError(
                "BCRYPT_COST must be between 4 and 31".to_string(),
            ));
        }
        if self.salt_size == 0 {
            return Err(ConfigError::ValidationError("SALT_SIZE must be at least 1".to_string()));
        }
        if self.tx_timeout.is_zero() {
            return Err(ConfigError::ValidationError("TX_TIMEOUT_MS must be greater than zero".to_string()));
        }
        if self.refresh_ttl < self.access_ttl {
            warn!("REFRESH_TOKEN_TTL_SECS is shorter than ACCESS_TOKEN_TTL_SECS");
        }
        Ok(())
    }

    pub fn token_settings(&self) -> TokenSettings {
        TokenSettings {
            access_ttl: self.access_ttl,
            refresh_ttl: self.refresh_ttl,
            ..TokenSettings::new(self.jwt_secret.clone(), self.jwt_issuer.clone())
        }
    }
}

/// Pick the session store backend.
pub async fn connect_session_store(config: &AppConfig) -> Result<Arc<dyn SessionStore>, SessionStoreError> {
    match &config.redis_url {
        Some(url) => {
            let store = RedisSessionStore::connect(url).await?;
            info!("Session store: redis");
            Ok(Arc::new(store))
        }
        None => {
            warn!("REDIS_URL not set, sessions are kept in process memory");
            Ok(Arc::new(MemorySessionStore::new()))
        }
    }
}

/// App state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub identity: Arc<IdentityService>,
    pub graph: Arc<GraphEngine>,
    pub posts: Arc<PostStore>,
    pub profiles: Arc<ProfileStore>,
}

impl AppState {
    /// Wire services over an open pool and session store.
    pub fn new(config: AppConfig, pool: SqlitePool, sessions: Arc<dyn SessionStore>) -> Result<Self, IdentityError> {
        let tokens = Arc::new(TokenService::new(config.token_settings(), sessions));
        Self::with_tokens(config, pool, tokens)
    }

    /// Same as `new` with a caller-built token service (custom clock in tests).
    pub fn with_tokens(config: AppConfig, pool: SqlitePool, tokens: Arc<TokenService>) -> Result<Self, IdentityError> {
        let passwords = PasswordHandler::new(config.salt_size, config.bcrypt_cost);
        let identity = IdentityService::new(pool.clone(), passwords, tokens)?;
        let graph = GraphEngine::new(pool.clone()).with_tx_timeout(config.tx_timeout);

        Ok(Self {
            config: Arc::new(config),
            identity: Arc::new(identity),
            graph: Arc::new(graph),
            posts: Arc::new(PostStore::new(pool.clone())),
            profiles: Arc::new(ProfileStore::new(pool)),
        })
    }

    /// Open the database and session store named by `config`.
    pub async fn connect(config: AppConfig) -> anyhow::Result<Self> {
        let pool = db::connect(&config.database_url).await?;
        let sessions = connect_session_store(&config).await?;
        Ok(Self::new(config, pool, sessions)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.bind_address, "0.0.0.0:3001");
        assert_eq!(config.access_ttl, Duration::from_secs(86_400));
        assert_eq!(config.refresh_ttl, Duration::from_secs(604_800));
        assert_eq!(config.salt_size, 16);
        assert!(config.redis_url.is_none());
    }

    #[test]
    fn test_overrides_and_validation() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("ACCESS_TOKEN_TTL_SECS", "60"),
            ("TX_TIMEOUT_MS", "250"),
            ("REDIS_URL", "redis://127.0.0.1:6379"),
        ]))
        .unwrap();
        assert_eq!(config.access_ttl, Duration::from_secs(60));
        assert_eq!(config.tx_timeout, Duration::from_millis(250));
        assert_eq!(config.redis_url.as_deref(), Some("redis://127.0.0.1:6379"));

        assert!(matches!(
            AppConfig::from_lookup(lookup_from(&[("JWT_SECRET_KEY", "")])),
            Err(ConfigError::ValidationError(_))
        ));
        assert!(matches!(
            AppConfig::from_lookup(lookup_from(&[("REFRESH_TOKEN_TTL_SECS", "0")])),
            Err(ConfigError::ValidationError(_))
        ));
        assert!(matches!(
            AppConfig::from_lookup(lookup_from(&[("BCRYPT_COST", "cheap")])),
            Err(ConfigError::InvalidValue { key: "BCRYPT_COST", .. })
        ));
    }
}
