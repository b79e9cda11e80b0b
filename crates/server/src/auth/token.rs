//! Signed session tokens (access + refresh).
//!
//! Tokens are HS256 JWTs carrying `{jti, sub, iat, exp, iss}`. The token kind
//! is not a separate claim: it is the prefix of the token id
//! (`access@<uuid>` / `refresh@<uuid>`).
//!
//! Validity beyond the signature lives in the session store:
//! - refresh tokens are tracked positively: `refresh-validity:<subject>`
//!   holds the id of the subject's one live refresh token;
//! - access tokens are never stored on issue, only blacklisted on logout
//!   under `blacklist:access:<token>` until they would have expired anyway.

use crate::session::{access_blacklist_key, refresh_validity_key, SessionStore, SessionStoreError};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const DEFAULT_ACCESS_TTL: Duration = Duration::from_secs(24 * 60 * 60);
pub const DEFAULT_REFRESH_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

const REVOKED_MARKER: &str = "revoked";

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Malformed token: {0}")]
    MalformedToken(String),
    #[error("Token expired")]
    Expired,
    #[error("Token not yet valid")]
    NotYetValid,
    #[error("Token revoked")]
    Revoked,
    #[error("Failed to sign token: {0}")]
    Signing(String),
    #[error("Revocation incomplete: {0}")]
    RevocationIncomplete(String),
    #[error(transparent)]
    Store(#[from] SessionStoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    fn prefix(self) -> &'static str {
        match self {
            TokenKind::Access => "access@",
            TokenKind::Refresh => "refresh@",
        }
    }

    pub fn from_token_id(token_id: &str) -> Option<Self> {
        if token_id.starts_with(TokenKind::Access.prefix()) {
            Some(TokenKind::Access)
        } else if token_id.starts_with(TokenKind::Refresh.prefix()) {
            Some(TokenKind::Refresh)
        } else {
            None
        }
    }
}

/// Signed claim set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub jti: String,
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub token: String,
    #[serde(skip)]
    pub token_id: String,
    pub expires_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedToken {
    pub subject: String,
    pub token_id: String,
    pub kind: TokenKind,
    pub expires_at: i64,
}

#[derive(Debug, Clone)]
pub struct RefreshedAccess {
    pub subject: String,
    pub access: IssuedToken,
}

/// Source of "now" in Unix seconds.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> i64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Clock that only moves when told to. Used to drive expiry without sleeping.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(now: i64) -> Self {
        Self {
            now: AtomicI64::new(now),
        }
    }

    pub fn set(&self, now: i64) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: i64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct TokenSettings {
    pub secret: String,
    pub issuer: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl TokenSettings {
    pub fn new(secret: impl Into<String>, issuer: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            issuer: issuer.into(),
            access_ttl: DEFAULT_ACCESS_TTL,
            refresh_ttl: DEFAULT_REFRESH_TTL,
        }
    }

    fn ttl(&self, kind: TokenKind) -> Duration {
        match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        }
    }
}

pub struct TokenService {
    settings: TokenSettings,
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    store: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
}

impl TokenService {
    pub fn new(settings: TokenSettings, store: Arc<dyn SessionStore>) -> Self {
        let encoding = EncodingKey::from_secret(settings.secret.as_bytes());
        let decoding = DecodingKey::from_secret(settings.secret.as_bytes());

        // Time checks are done by hand so Expired / NotYetValid stay distinct
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.leeway = 0;
        validation.set_issuer(&[settings.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "sub", "iss"]);

        Self {
            settings,
            encoding,
            decoding,
            validation,
            store,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn now(&self) -> i64 {
        self.clock.now()
    }

    /// Sign a fresh token for `subject`. Refresh tokens also (re)write the
    /// subject's validity record, superseding any earlier refresh token.
    pub async fn issue(&self, subject: &str, kind: TokenKind) -> Result<IssuedToken, TokenError> {
        let now = self.clock.now();
        let ttl = self.settings.ttl(kind);
        let claims = Claims {
            jti: format!("{}{}", kind.prefix(), Uuid::new_v4()),
            sub: subject.to_string(),
            iat: now,
            exp: now + ttl.as_secs() as i64,
            iss: self.settings.issuer.clone(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))?;

        if kind == TokenKind::Refresh {
            self.store
                .set(&refresh_validity_key(subject), &claims.jti, ttl)
                .await?;
        }

        debug!(token_id = %claims.jti, subject = %subject, "Issued token");

        Ok(IssuedToken {
            token,
            token_id: claims.jti,
            expires_at: claims.exp,
        })
    }

    /// Signature and claim-shape check only; no time or store checks.
    fn parse(&self, raw: &str) -> Result<(Claims, TokenKind), TokenError> {
        let data = decode::<Claims>(raw, &self.decoding, &self.validation)
            .map_err(|e| TokenError::MalformedToken(e.to_string()))?;
        let claims = data.claims;
        let kind = TokenKind::from_token_id(&claims.jti)
            .ok_or_else(|| TokenError::MalformedToken("unknown token kind".to_string()))?;
        if claims.sub.is_empty() {
            return Err(TokenError::MalformedToken("empty subject".to_string()));
        }
        Ok((claims, kind))
    }

    fn parse_kind(&self, raw: &str, expected: TokenKind) -> Result<Claims, TokenError> {
        let (claims, kind) = self.parse(raw)?;
        if kind != expected {
            return Err(TokenError::MalformedToken(format!(
                "expected {} token",
                match expected {
                    TokenKind::Access => "access",
                    TokenKind::Refresh => "refresh",
                }
            )));
        }
        Ok(claims)
    }

    pub async fn validate(&self, raw: &str, kind: TokenKind) -> Result<ValidatedToken, TokenError> {
        let claims = self.parse_kind(raw, kind)?;

        let now = self.clock.now();
        if now < claims.iat {
            return Err(TokenError::NotYetValid);
        }
        if now > claims.exp {
            return Err(TokenError::Expired);
        }

        match kind {
            TokenKind::Refresh => {
                let current = self.store.get(&refresh_validity_key(&claims.sub)).await?;
                if current.as_deref() != Some(claims.jti.as_str()) {
                    return Err(TokenError::Revoked);
                }
            }
            TokenKind::Access => {
                if self.store.exists(&access_blacklist_key(raw)).await? {
                    return Err(TokenError::Revoked);
                }
            }
        }

        Ok(ValidatedToken {
            subject: claims.sub,
            token_id: claims.jti,
            kind,
            expires_at: claims.exp,
        })
    }

    /// Deny further use of an access/refresh pair.
    ///
    /// Expiry is not re-checked: revoking an expired token succeeds. Both
    /// store writes are attempted even if the first fails; an error is
    /// returned only when a write that was still needed did not happen.
    /// Revoking an already-revoked pair is a no-op.
    pub async fn revoke(&self, access_token: &str, refresh_token: &str) -> Result<(), TokenError> {
        let access = self.parse_kind(access_token, TokenKind::Access)?;
        let refresh = self.parse_kind(refresh_token, TokenKind::Refresh)?;
        if access.sub != refresh.sub {
            return Err(TokenError::MalformedToken(
                "access and refresh token belong to different subjects".to_string(),
            ));
        }

        let mut failures: Vec<String> = Vec::new();

        let remaining = access.exp - self.clock.now();
        if remaining > 0 {
            let ttl = Duration::from_secs(remaining as u64);
            if let Err(e) = self
                .store
                .set(&access_blacklist_key(access_token), REVOKED_MARKER, ttl)
                .await
            {
                warn!(subject = %access.sub, error = %e, "Failed to blacklist access token");
                failures.push(format!("access blacklist: {e}"));
            }
        }

        // A newer login may have replaced the record; only our own id is dropped
        let key = refresh_validity_key(&refresh.sub);
        match self.store.delete_if_eq(&key, &refresh.jti).await {
            Ok(true) => {}
            Ok(false) => debug!(subject = %refresh.sub, "Refresh token already invalid"),
            Err(e) => {
                warn!(subject = %refresh.sub, error = %e, "Failed to drop refresh validity");
                failures.push(format!("refresh validity: {e}"));
            }
        }

        if failures.is_empty() {
            info!(subject = %access.sub, "Session revoked");
            Ok(())
        } else {
            Err(TokenError::RevocationIncomplete(failures.join("; ")))
        }
    }

    /// Exchange a live refresh token for a new access token. The refresh
    /// token itself is not rotated.
    pub async fn refresh(&self, raw_refresh: &str) -> Result<RefreshedAccess, TokenError> {
        let validated = self.validate(raw_refresh, TokenKind::Refresh).await?;
        let access = self.issue(&validated.subject, TokenKind::Access).await?;
        Ok(RefreshedAccess {
            subject: validated.subject,
            access,
        })
    }
}
