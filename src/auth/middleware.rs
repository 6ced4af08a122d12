use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use super::token::AuthClaims;
use crate::shared::{AppError, AppState};

/// Bearer authentication middleware - validates the Authorization header and
/// adds AuthClaims to request extensions.
///
/// WebSocket upgrades cannot set headers from the browser, so a `token` query
/// parameter is accepted as a fallback; the token itself is verified the same
/// way in both cases.
pub async fn bearer_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let header_token = req
        .headers()
        .get("Authorization")
        .and_then(|header| header.to_str().ok())
        .and_then(|raw| raw.strip_prefix("Bearer "));

    let token = match header_token {
        Some(token) => token.to_string(),
        None => query_token(req.uri().query()).ok_or_else(|| {
            warn!(uri = %req.uri(), "Missing authorization");
            AppError::Unauthorized("missing authorization".to_string())
        })?,
    };

    let claims = match state.tokens.validate(&token) {
        Ok(claims) => claims,
        Err(e) => {
            warn!(uri = %req.uri(), "Authentication failed: {}", e);
            return Err(e);
        }
    };

    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

/// Admin guard. Must run after `bearer_auth` so the claims extension exists.
pub async fn admin_only(req: Request, next: Next) -> Result<Response, AppError> {
    let claims = req
        .extensions()
        .get::<AuthClaims>()
        .ok_or_else(|| AppError::Unauthorized("missing authorization".to_string()))?;

    if !claims.is_admin() {
        warn!(user_id = %claims.sub, uri = %req.uri(), "Non-admin on admin route");
        return Err(AppError::Forbidden);
    }

    Ok(next.run(req).await)
}

// JWTs are base64url and never contain '&' or '=', so a plain split is enough.
fn query_token(query: Option<&str>) -> Option<String> {
    query?
        .split('&')
        .find_map(|pair| pair.strip_prefix("token="))
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
}
