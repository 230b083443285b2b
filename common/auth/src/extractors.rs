use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::{request::Parts, HeaderMap};
use axum_extra::extract::cookie::CookieJar;

use crate::error::{AuthError, AuthResult};
use crate::session::SESSION_COOKIE;

/// Raw ID token presented in the session cookie, not yet verified.
#[derive(Debug, Clone)]
pub struct SessionToken(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for SessionToken
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        session_token(&parts.headers).map(SessionToken)
    }
}

/// Subject that passed verification and the allowlist, placed in request
/// extensions by the protected-route gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub subject: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .ok_or(AuthError::MissingCredential(SESSION_COOKIE))
    }
}

/// Undecodable `Cookie` headers are skipped, so they cannot hide a valid
/// `token` sent in another header.
fn session_token(headers: &HeaderMap) -> AuthResult<String> {
    let jar = CookieJar::from_headers(headers);
    let cookie = jar
        .get(SESSION_COOKIE)
        .ok_or(AuthError::MissingCredential(SESSION_COOKIE))?;

    let token = cookie.value().trim();
    if token.is_empty() {
        return Err(AuthError::MalformedCredential(SESSION_COOKIE));
    }
    Ok(token.to_owned())
}
