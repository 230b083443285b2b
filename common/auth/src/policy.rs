use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::claims::TokenClaims;
use crate::error::{AuthError, AuthResult};

/// Suffix shared by both forms of Google's issuer.
pub const GOOGLE_ISSUER_SUFFIX: &str = "accounts.google.com";

/// Application-level checks run on the claims the signature primitive
/// returns, whatever that primitive was configured to enforce.
#[derive(Debug, Clone)]
pub struct ClaimPolicy {
    audience: String,
    issuer_suffix: String,
}

impl ClaimPolicy {
    pub fn new(audience: impl Into<String>) -> Self {
        Self {
            audience: audience.into(),
            issuer_suffix: GOOGLE_ISSUER_SUFFIX.to_string(),
        }
    }

    pub fn audience(&self) -> &str {
        &self.audience
    }

    pub fn check(&self, claims: TokenClaims) -> AuthResult<TokenClaims> {
        self.check_at(claims, Utc::now())
    }

    /// Audience, issuer, expiry, issued-at; first failure wins.
    ///
    /// A token whose `exp` equals `now` is already expired.
    pub fn check_at(&self, claims: TokenClaims, now: DateTime<Utc>) -> AuthResult<TokenClaims> {
        if let Err(err) = self.evaluate(&claims, now) {
            warn!(subject = %claims.subject, error = %err, "token failed claim policy");
            return Err(err);
        }

        info!(
            subject = %claims.subject,
            claims = %claims.audit_pairs(),
            "verified token"
        );
        Ok(claims)
    }

    fn evaluate(&self, claims: &TokenClaims, now: DateTime<Utc>) -> AuthResult<()> {
        if claims.audience != self.audience {
            return Err(AuthError::AudienceMismatch(claims.audience.clone()));
        }

        if !claims.issuer.ends_with(&self.issuer_suffix) {
            return Err(AuthError::IssuerMismatch(claims.issuer.clone()));
        }

        if claims.expires_at <= now {
            return Err(AuthError::TokenExpired(claims.expires_at));
        }

        if claims.issued_at > now {
            return Err(AuthError::TokenNotYetValid(claims.issued_at));
        }

        Ok(())
    }
}
