use crate::config::AppState;
use crate::ctx::Ctx;
use crate::error::{Error, Result};
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use tracing::debug;

/// `Ok(None)` when no Authorization header is present at all.
pub(crate) fn bearer_token(headers: &HeaderMap) -> Result<Option<String>> {
    let Some(auth_header) = headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };
    let auth_header = auth_header.to_str().map_err(|_| Error::AuthFailTokenWrongFormat)?;

    // Format: "Bearer <token>"
    let token = auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(Error::AuthFailTokenWrongFormat)?;
    Ok(Some(token.to_string()))
}

async fn resolve_ctx(state: &AppState, token: &str) -> Result<Ctx> {
    let validated = state.identity.authenticate(token).await?;
    Ok(Ctx::new(validated.subject))
}

pub async fn mw_require_auth(State(state): State<AppState>, mut req: Request, next: Next) -> Result<Response> {
    debug!("MIDDLEWARE: require_auth");

    let token = bearer_token(req.headers())?.ok_or(Error::AuthFailNoToken)?;
    let ctx = resolve_ctx(&state, &token).await?;

    req.extensions_mut().insert(ctx);
    Ok(next.run(req).await)
}

/// Guests pass through without a `Ctx`. A token that is present but invalid
/// is still rejected.
pub async fn mw_optional_auth(State(state): State<AppState>, mut req: Request, next: Next) -> Result<Response> {
    debug!("MIDDLEWARE: optional_auth");

    if let Some(token) = bearer_token(req.headers())? {
        let ctx = resolve_ctx(&state, &token).await?;
        req.extensions_mut().insert(ctx);
    }
    Ok(next.run(req).await)
}
