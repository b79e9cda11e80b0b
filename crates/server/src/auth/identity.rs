//! Registration, login, logout and refresh.
//!
//! User rows live in SQLite; sessions live in the token layer. The two are
//! not written atomically together: a registration whose token issue fails
//! leaves the account in place, and the user can simply log in.

use super::password::{PasswordError, PasswordHandler};
use super::token::{IssuedToken, RefreshedAccess, TokenError, TokenKind, TokenService, ValidatedToken};
use chrono::Utc;
use serde::Serialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Invalid username or password")]
    InvalidCredentials,
    #[error("User already exists")]
    AlreadyExists,
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error("Password handling failed: {0}")]
    Password(PasswordError),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<PasswordError> for IdentityError {
    fn from(err: PasswordError) -> Self {
        match err {
            PasswordError::InvalidCredentials => IdentityError::InvalidCredentials,
            other => IdentityError::Password(other),
        }
    }
}

/// User row as stored.
#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    pub username: String,
    pub salt: String,
    pub password_hash: String,
    pub created_at: String,
}

/// Token pair handed out by register and login.
#[derive(Debug, Clone, Serialize)]
pub struct SessionTokens {
    pub user_id: String,
    pub username: String,
    pub access_token: IssuedToken,
    pub refresh_token: IssuedToken,
}

pub struct IdentityService {
    pool: SqlitePool,
    passwords: PasswordHandler,
    tokens: Arc<TokenService>,
    /// Compared against when the username is unknown, so both failure paths
    /// cost one bcrypt verification.
    decoy_hash: String,
}

impl IdentityService {
    pub fn new(
        pool: SqlitePool,
        passwords: PasswordHandler,
        tokens: Arc<TokenService>,
    ) -> Result<Self, IdentityError> {
        let decoy_salt = passwords.generate_salt()?;
        let decoy_hash = passwords.hash(&Uuid::new_v4().to_string(), &decoy_salt)?;
        Ok(Self {
            pool,
            passwords,
            tokens,
            decoy_hash,
        })
    }

    pub fn tokens(&self) -> &Arc<TokenService> {
        &self.tokens
    }

    pub async fn user_exists(&self, username: &str) -> Result<bool, IdentityError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT id FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    pub async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, IdentityError> {
        let row: Option<(String, String, String, String, String)> = sqlx::query_as(
            "SELECT id, username, salt, password_hash, created_at FROM users WHERE username = ? AND deleted = 0",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(id, username, salt, password_hash, created_at)| User {
            id,
            username,
            salt,
            password_hash,
            created_at,
        }))
    }

    async fn insert_user(&self, user: &User) -> Result<(), IdentityError> {
        let result = sqlx::query(
            "INSERT INTO users (id, username, salt, password_hash, created_at, deleted) VALUES (?, ?, ?, ?, ?, 0)",
        )
        .bind(&user.id)
        .bind(&user.username)
        .bind(&user.salt)
        .bind(&user.password_hash)
        .bind(&user.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            // Lost a race with a concurrent registration of the same name
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(IdentityError::AlreadyExists)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn register(&self, username: &str, password: &str) -> Result<SessionTokens, IdentityError> {
        check_credentials_input(username, password)?;

        if self.user_exists(username).await? {
            return Err(IdentityError::AlreadyExists);
        }

        let salt = self.passwords.generate_salt()?;
        let password_hash = self.passwords.hash(password, &salt)?;
        let user = User {
            id: Uuid::new_v4().to_string(),
            username: username.to_string(),
            salt,
            password_hash,
            created_at: Utc::now().to_rfc3339(),
        };
        self.insert_user(&user).await?;

        info!(user_id = %user.id, username = %user.username, "[Auth] User registered");

        self.issue_pair(user.id, user.username).await
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<SessionTokens, IdentityError> {
        let user = match self.find_user_by_username(username).await? {
            Some(user) => user,
            None => {
                let _ = self.passwords.verify(&self.decoy_hash, password, "");
                warn!("[Auth] Failed login attempt");
                return Err(IdentityError::InvalidCredentials);
            }
        };

        if self
            .passwords
            .verify(&user.password_hash, password, &user.salt)
            .is_err()
        {
            warn!("[Auth] Failed login attempt");
            return Err(IdentityError::InvalidCredentials);
        }

        info!(user_id = %user.id, "[Auth] User logged in");
        self.issue_pair(user.id, user.username).await
    }

    async fn issue_pair(&self, user_id: String, username: String) -> Result<SessionTokens, IdentityError> {
        let access_token = self.tokens.issue(&user_id, TokenKind::Access).await?;
        let refresh_token = self.tokens.issue(&user_id, TokenKind::Refresh).await?;
        Ok(SessionTokens {
            user_id,
            username,
            access_token,
            refresh_token,
        })
    }

    /// Idempotent: logging out an already-revoked pair succeeds.
    pub async fn logout(&self, access_token: &str, refresh_token: &str) -> Result<(), IdentityError> {
        self.tokens.revoke(access_token, refresh_token).await?;
        Ok(())
    }

    pub async fn refresh_token(&self, refresh_token: &str) -> Result<RefreshedAccess, IdentityError> {
        Ok(self.tokens.refresh(refresh_token).await?)
    }

    /// Resolve a bearer access token to its subject.
    pub async fn authenticate(&self, access_token: &str) -> Result<ValidatedToken, IdentityError> {
        Ok(self.tokens.validate(access_token, TokenKind::Access).await?)
    }
}

fn check_credentials_input(username: &str, password: &str) -> Result<(), IdentityError> {
    if username.trim().is_empty() {
        return Err(IdentityError::InvalidInput("username is required".to_string()));
    }
    if username.len() > 50 {
        return Err(IdentityError::InvalidInput("username is too long".to_string()));
    }
    if password.is_empty() {
        return Err(IdentityError::InvalidInput("password is required".to_string()));
    }
    Ok(())
}
