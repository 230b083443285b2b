use serde_json::Value;

use crate::claims::TokenClaims;
use crate::error::{AuthError, AuthResult};

/// Stable principal identifier of verified claims.
pub fn subject(claims: &TokenClaims) -> AuthResult<&str> {
    if claims.subject.is_empty() {
        return Err(AuthError::MissingSubject);
    }
    Ok(&claims.subject)
}

/// Human-readable identity required to complete a sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignInIdentity {
    pub subject: String,
    pub email: String,
}

impl SignInIdentity {
    /// `None` unless `email_verified` is boolean `true` and `email` is a
    /// non-empty string. Callers end the sign-in without a diagnostic.
    pub fn from_claims(claims: &TokenClaims) -> Option<Self> {
        let subject = subject(claims).ok()?;

        match claims.claim("email_verified") {
            Some(Value::Bool(true)) => {}
            _ => return None,
        }

        let email = match claims.claim("email") {
            Some(Value::String(email)) if !email.is_empty() => email,
            _ => return None,
        };

        Some(Self {
            subject: subject.to_owned(),
            email: email.clone(),
        })
    }
}
