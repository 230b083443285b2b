use axum_extra::extract::cookie::{Cookie, SameSite};
use time::{Duration, OffsetDateTime};

/// Cookie carrying the raw ID token between requests.
pub const SESSION_COOKIE: &str = "token";

/// Google ID tokens last one hour; the cookie never outlives its token.
pub const TOKEN_LIFETIME: Duration = Duration::hours(1);

/// Outbound credential wrapping an already verified token.
///
/// There is no server-side session: every later request re-verifies the
/// wrapped token in full.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCredential {
    token: String,
    expires_at: OffsetDateTime,
}

impl SessionCredential {
    pub fn issue(raw_token: impl Into<String>) -> Self {
        Self::issue_at(raw_token, OffsetDateTime::now_utc())
    }

    pub fn issue_at(raw_token: impl Into<String>, now: OffsetDateTime) -> Self {
        Self {
            token: raw_token.into(),
            expires_at: now + TOKEN_LIFETIME,
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn expires_at(&self) -> OffsetDateTime {
        self.expires_at
    }

    /// HttpOnly, Secure and SameSite=Strict are always set.
    pub fn into_cookie(self) -> Cookie<'static> {
        Cookie::build((SESSION_COOKIE, self.token))
            .path("/")
            .expires(self.expires_at)
            .max_age(TOKEN_LIFETIME)
            .http_only(true)
            .secure(true)
            .same_site(SameSite::Strict)
            .build()
    }
}
