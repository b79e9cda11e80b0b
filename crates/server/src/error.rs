use crate::auth::{IdentityError, TokenError};
use crate::graph::GraphError;
use crate::posts::PostError;
use crate::profile::ProfileError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

#[derive(Debug)]
pub enum Error {
    // Auth Errors
    AuthFailNoToken,
    AuthFailTokenWrongFormat,
    AuthFailCtxNotInRequestExt,

    // Domain Errors
    Token(TokenError),
    Identity(IdentityError),
    Graph(GraphError),
    Post(PostError),
    Profile(ProfileError),

    // Generic
    BadRequest(String),
    Internal(String),
}

pub type Result<T> = core::result::Result<T, Error>;

const INTERNAL_MESSAGE: &str = "Internal server error";

fn token_parts(err: &TokenError) -> (StatusCode, &'static str, String) {
    match err {
        TokenError::MalformedToken(_) => (StatusCode::UNAUTHORIZED, "MALFORMED_TOKEN", "Malformed token".to_string()),
        TokenError::Expired => (StatusCode::UNAUTHORIZED, "TOKEN_EXPIRED", err.to_string()),
        TokenError::NotYetValid => (StatusCode::UNAUTHORIZED, "TOKEN_NOT_YET_VALID", err.to_string()),
        TokenError::Revoked => (StatusCode::UNAUTHORIZED, "TOKEN_REVOKED", err.to_string()),
        TokenError::RevocationIncomplete(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            "REVOCATION_INCOMPLETE",
            "Logout could not be completed, please retry".to_string(),
        ),
        TokenError::Store(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            "SESSION_STORE_UNAVAILABLE",
            "Session store unavailable".to_string(),
        ),
        TokenError::Signing(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL", INTERNAL_MESSAGE.to_string()),
    }
}

impl Error {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            Error::AuthFailNoToken => (StatusCode::UNAUTHORIZED, "NO_AUTH_TOKEN", "No auth token found".to_string()),
            Error::AuthFailTokenWrongFormat => (
                StatusCode::UNAUTHORIZED,
                "AUTH_TOKEN_WRONG_FORMAT",
                "Auth token wrong format".to_string(),
            ),
            Error::AuthFailCtxNotInRequestExt => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "AUTH_CONTEXT_MISSING",
                "Auth context missing".to_string(),
            ),

            Error::Token(err) => token_parts(err),

            Error::Identity(err) => match err {
                IdentityError::InvalidCredentials => (
                    StatusCode::UNAUTHORIZED,
                    "INVALID_CREDENTIALS",
                    "Invalid username or password".to_string(),
                ),
                IdentityError::AlreadyExists => (StatusCode::CONFLICT, "ALREADY_EXISTS", err.to_string()),
                IdentityError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
                IdentityError::Token(token_err) => token_parts(token_err),
                IdentityError::Password(_) | IdentityError::Database(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL", INTERNAL_MESSAGE.to_string())
                }
            },

            Error::Graph(err) => match err {
                GraphError::SelfFollow => (StatusCode::BAD_REQUEST, "SELF_FOLLOW", err.to_string()),
                GraphError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND", err.to_string()),
                GraphError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
                GraphError::TransactionAborted(_) => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "TRANSACTION_ABORTED",
                    "Operation aborted, no changes were made".to_string(),
                ),
                GraphError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL", INTERNAL_MESSAGE.to_string()),
            },

            Error::Post(err) => match err {
                PostError::NotFound | PostError::CommentNotFound => {
                    (StatusCode::NOT_FOUND, "NOT_FOUND", err.to_string())
                }
                PostError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
                PostError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
                PostError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL", INTERNAL_MESSAGE.to_string()),
            },

            Error::Profile(err) => match err {
                ProfileError::NotFound => (StatusCode::NOT_FOUND, "NOT_FOUND", err.to_string()),
                ProfileError::AlreadyExists => (StatusCode::CONFLICT, "ALREADY_EXISTS", err.to_string()),
                ProfileError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
                ProfileError::Database(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL", INTERNAL_MESSAGE.to_string())
                }
            },

            Error::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            Error::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL", INTERNAL_MESSAGE.to_string()),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();

        if status.is_server_error() {
            error!(?self, code, "[HTTP] Request failed");
        }

        let body = Json(json!({
            "status": "error",
            "code": code,
            "message": message,
        }));

        (status, body).into_response()
    }
}

impl From<TokenError> for Error {
    fn from(err: TokenError) -> Self {
        Error::Token(err)
    }
}

impl From<IdentityError> for Error {
    fn from(err: IdentityError) -> Self {
        Error::Identity(err)
    }
}

impl From<GraphError> for Error {
    fn from(err: GraphError) -> Self {
        Error::Graph(err)
    }
}

impl From<PostError> for Error {
    fn from(err: PostError) -> Self {
        Error::Post(err)
    }
}

impl From<ProfileError> for Error {
    fn from(err: ProfileError) -> Self {
        Error::Profile(err)
    }
}
