//! Authentication
//!
//! Passwords, signed session tokens, the identity flows built on them, and
//! the bearer-token middleware guarding the HTTP routes.

pub mod identity;
pub mod middleware;
pub mod password;
pub mod token;

pub use identity::{IdentityError, IdentityService, SessionTokens, User};
pub use password::{PasswordError, PasswordHandler};
pub use token::{
    Clock, IssuedToken, ManualClock, RefreshedAccess, SystemClock, TokenError, TokenKind, TokenService,
    TokenSettings, ValidatedToken,
};
