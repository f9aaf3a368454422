//! Authentication and authorization middleware.
//!
//! `protect` resolves the acting identity and inserts it into request
//! extensions as the per-request context; `restrict_to` checks the resolved
//! role against an allow-list. Routes compose them in order:
//! protect → restrict_to → handler.

use axum::{
    body::Body,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use bson::{doc, oid::ObjectId};
use std::convert::Infallible;

use crate::auth::tokens::SESSION_COOKIE;
use crate::error::{Error, Result};
use crate::models::{Role, User};
use crate::state::AppState;

/// Per-request authenticated identity, inserted by [`protect`].
#[derive(Clone)]
pub struct CurrentUser(pub User);

/// Identity for rendered pages: resolved when the cookie is valid, absent
/// otherwise, never an error.
#[derive(Clone)]
pub struct OptionalUser(pub Option<User>);

/// Pull the session token from the Authorization header (Bearer scheme) or
/// the session cookie.
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        if let Some(token) = value.strip_prefix("Bearer ") {
            return Some(token.to_string());
        }
    }

    headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(cookie_value)
}

fn cookie_value(cookie_header: &str) -> Option<String> {
    cookie_header.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE).then(|| value.to_string())
    })
}

/// Resolve the acting user: verify the token, load the identity, and reject
/// tokens issued before the last password change.
pub async fn resolve_user(state: &AppState, headers: &HeaderMap) -> Result<User> {
    let token = extract_token(headers).ok_or_else(|| {
        Error::Unauthorized("You are not logged in! Please log in to get access.".to_string())
    })?;

    let claims = state.sessions.verify(&token)?;
    let id = ObjectId::parse_str(&claims.sub)
        .map_err(|_| Error::Unauthorized("Invalid token. Please log in again!".to_string()))?;

    let user = state
        .db
        .users
        .find_one(doc! { "_id": id, "active": { "$ne": false } })
        .await?
        .ok_or_else(|| {
            Error::Unauthorized("The user belonging to this token no longer exists.".to_string())
        })?;

    if user.changed_password_after(claims.iat) {
        return Err(Error::Unauthorized(
            "User recently changed password! Please log in again.".to_string(),
        ));
    }

    Ok(user)
}

/// Authentication gate for protected routes.
pub async fn protect(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response> {
    let user = resolve_user(&state, request.headers()).await?;
    request.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(request).await)
}

/// Role gate; must run after [`protect`].
pub async fn restrict_to(
    request: Request<Body>,
    next: Next,
    allowed: &'static [Role],
) -> Result<Response> {
    let current = request
        .extensions()
        .get::<CurrentUser>()
        .ok_or_else(|| Error::Internal("restrict_to layered without protect".to_string()))?;

    if !current.0.role.is_any_of(allowed) {
        return Err(Error::Forbidden(
            "You do not have permission to perform this action.".to_string(),
        ));
    }

    Ok(next.run(request).await)
}

impl FromRequestParts<AppState> for OptionalUser {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> std::result::Result<Self, Self::Rejection> {
        Ok(OptionalUser(resolve_user(state, &parts.headers).await.ok()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_token_extraction() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Bearer abc.def.ghi".parse().unwrap());
        assert_eq!(extract_token(&headers).as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn test_cookie_token_extraction() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            "theme=dark; jwt=abc.def.ghi; other=1".parse().unwrap(),
        );
        assert_eq!(extract_token(&headers).as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn test_bearer_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Bearer from-header".parse().unwrap());
        headers.insert(header::COOKIE, "jwt=from-cookie".parse().unwrap());
        assert_eq!(extract_token(&headers).as_deref(), Some("from-header"));
    }

    #[test]
    fn test_missing_token() {
        assert!(extract_token(&HeaderMap::new()).is_none());

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Basic xyz".parse().unwrap());
        headers.insert(header::COOKIE, "session=other".parse().unwrap());
        assert!(extract_token(&headers).is_none());
    }
}
