use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{AuthError, AuthResult};

/// Decoded ID token payload, produced fresh for every verification.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenClaims {
    pub subject: String,
    pub audience: String,
    pub issuer: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Every claim of the payload, standard ones included.
    pub claims: Map<String, Value>,
}

impl TokenClaims {
    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.claims.get(name)
    }

    /// `key=value` pairs for every claim, keys sorted, comma separated.
    pub fn audit_pairs(&self) -> String {
        let mut keys: Vec<&String> = self.claims.keys().collect();
        keys.sort();
        keys.into_iter()
            .map(|key| format!("{key}={}", display_value(&self.claims[key])))
            .collect::<Vec<_>>()
            .join(",")
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[derive(Debug, Deserialize)]
struct ClaimsRepr {
    #[serde(default)]
    sub: String,
    aud: AudienceRepr,
    iss: String,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AudienceRepr {
    Single(String),
    Many(Vec<String>),
}

fn timestamp(name: &'static str, seconds: i64) -> AuthResult<DateTime<Utc>> {
    Utc.timestamp_opt(seconds, 0)
        .single()
        .ok_or_else(|| AuthError::InvalidClaim(name, seconds.to_string()))
}

impl TryFrom<Value> for TokenClaims {
    type Error = AuthError;

    fn try_from(value: Value) -> AuthResult<Self> {
        let repr: ClaimsRepr = serde_json::from_value(value.clone())
            .map_err(|err| AuthError::InvalidJson(err.to_string()))?;

        let audience = match repr.aud {
            AudienceRepr::Single(item) => item,
            AudienceRepr::Many(mut items) if items.len() == 1 => items.remove(0),
            AudienceRepr::Many(items) => {
                return Err(AuthError::InvalidClaim("aud", items.join(",")));
            }
        };

        let claims = match value {
            Value::Object(map) => map,
            _ => return Err(AuthError::InvalidJson("payload is not an object".into())),
        };

        Ok(Self {
            subject: repr.sub,
            audience,
            issuer: repr.iss,
            issued_at: timestamp("iat", repr.iat)?,
            expires_at: timestamp("exp", repr.exp)?,
            claims,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_google_payload() {
        let claims = TokenClaims::try_from(json!({
            "sub": "110169484474386276334",
            "aud": "client.apps.googleusercontent.com",
            "iss": "https://accounts.google.com",
            "iat": 1_700_000_000,
            "exp": 1_700_003_600,
            "email": "a@example.com",
            "email_verified": true
        }))
        .expect("claims");

        assert_eq!(claims.subject, "110169484474386276334");
        assert_eq!(claims.audience, "client.apps.googleusercontent.com");
        assert_eq!(claims.expires_at.timestamp(), 1_700_003_600);
        assert_eq!(claims.claim("email_verified"), Some(&json!(true)));
    }

    #[test]
    fn single_element_audience_list_is_flattened() {
        let claims = TokenClaims::try_from(json!({
            "sub": "s", "aud": ["only"], "iss": "accounts.google.com", "iat": 1, "exp": 2
        }))
        .expect("claims");
        assert_eq!(claims.audience, "only");
    }

    #[test]
    fn multiple_audiences_are_rejected() {
        let err = TokenClaims::try_from(json!({
            "sub": "s", "aud": ["a", "b"], "iss": "accounts.google.com", "iat": 1, "exp": 2
        }))
        .expect_err("ambiguous audience");
        assert!(matches!(err, AuthError::InvalidClaim("aud", _)));
    }

    #[test]
    fn missing_expiry_is_malformed() {
        let err = TokenClaims::try_from(json!({
            "sub": "s", "aud": "a", "iss": "accounts.google.com", "iat": 1
        }))
        .expect_err("no exp");
        assert!(matches!(err, AuthError::InvalidJson(_)));
    }

    #[test]
    fn audit_pairs_sort_keys_and_unquote_strings() {
        let claims = TokenClaims::try_from(json!({
            "sub": "subject", "aud": "a", "iss": "accounts.google.com",
            "iat": 1, "exp": 2, "waldo": "fred", "baz": "qux"
        }))
        .expect("claims");

        assert_eq!(
            claims.audit_pairs(),
            "aud=a,baz=qux,exp=2,iat=1,iss=accounts.google.com,sub=subject,waldo=fred"
        );
    }
}
