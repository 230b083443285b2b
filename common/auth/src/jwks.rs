use jsonwebtoken::DecodingKey;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::config::GOOGLE_JWKS_URL;
use crate::error::{AuthError, AuthResult};

/// Client for a JSON Web Key Set document such as Google's
/// `oauth2/v3/certs`.
#[derive(Clone)]
pub struct JwksFetcher {
    client: Client,
    url: String,
}

impl Default for JwksFetcher {
    fn default() -> Self {
        Self::new(GOOGLE_JWKS_URL)
    }
}

impl JwksFetcher {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// RS256 keys of the current document, as `(kid, key)` pairs.
    pub async fn fetch(&self) -> AuthResult<Vec<(String, DecodingKey)>> {
        let document: JwkSet = self
            .client
            .get(&self.url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|err| AuthError::JwksFetch(err.to_string()))?
            .json()
            .await
            .map_err(|err| AuthError::JwksDecode(err.to_string()))?;

        let mut keys = Vec::with_capacity(document.keys.len());
        for entry in document.keys {
            if let Some(key) = entry.into_rs256_key()? {
                keys.push(key);
            }
        }
        Ok(keys)
    }
}

#[derive(Debug, Deserialize)]
struct JwkSet {
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
struct Jwk {
    kid: Option<String>,
    #[serde(default = "rsa")]
    kty: String,
    #[serde(default = "rs256")]
    alg: String,
    n: Option<String>,
    e: Option<String>,
}

fn rsa() -> String {
    "RSA".to_owned()
}

fn rs256() -> String {
    "RS256".to_owned()
}

impl Jwk {
    /// `None` for keys of another family; those are not an error.
    fn into_rs256_key(self) -> AuthResult<Option<(String, DecodingKey)>> {
        let kid = self.kid.ok_or(AuthError::JwksMissingKid)?;
        if self.kty != "RSA" || self.alg != "RS256" {
            debug!(kid, kty = %self.kty, alg = %self.alg, "ignoring JWKS entry");
            return Ok(None);
        }

        let (Some(n), Some(e)) = (self.n, self.e) else {
            return Err(AuthError::JwksMissingComponents(kid));
        };
        let key = DecodingKey::from_rsa_components(&n, &e)
            .map_err(|err| AuthError::KeyParse(kid.clone(), err.to_string()))?;
        Ok(Some((kid, key)))
    }
}
