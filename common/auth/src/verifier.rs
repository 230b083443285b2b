use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Instant;

use async_trait::async_trait;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde_json::Value;
use tracing::{debug, info};

use crate::claims::TokenClaims;
use crate::config::JwtConfig;
use crate::error::{AuthError, AuthResult};
use crate::jwks::JwksFetcher;

/// Signature and standard-claim validation of a raw token.
///
/// Implementations own key retrieval and caching. Any failure is reported as
/// [`AuthError::InvalidToken`] carrying the underlying cause.
#[async_trait]
pub trait TokenValidator: Send + Sync {
    async fn validate(&self, raw_token: &str, audience: &str) -> AuthResult<TokenClaims>;
}

/// Public keys indexed by `kid`, shared between request tasks and the
/// background JWKS refresher.
#[derive(Clone, Default)]
pub struct KeyRing {
    keys: Arc<RwLock<HashMap<String, DecodingKey>>>,
}

impl KeyRing {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, kid: impl Into<String>, key: DecodingKey) {
        self.keys
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(kid.into(), key);
    }

    pub fn add_rsa_pem(&self, kid: impl Into<String>, pem: &[u8]) -> AuthResult<()> {
        let kid = kid.into();
        match DecodingKey::from_rsa_pem(pem) {
            Ok(key) => {
                self.add(kid, key);
                Ok(())
            }
            Err(err) => Err(AuthError::KeyParse(kid, err.to_string())),
        }
    }

    pub fn lookup(&self, kid: &str) -> Option<DecodingKey> {
        self.keys
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(kid)
            .cloned()
    }

    pub fn kids(&self) -> Vec<String> {
        let mut kids: Vec<String> = self
            .keys
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        kids.sort();
        kids
    }

    pub fn len(&self) -> usize {
        self.keys.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Swap in a fresh key set; keys absent from `keys` are forgotten.
    pub fn rotate(&self, keys: Vec<(String, DecodingKey)>) {
        let fresh: HashMap<String, DecodingKey> = keys.into_iter().collect();
        *self.keys.write().unwrap_or_else(PoisonError::into_inner) = fresh;
    }
}

/// RS256 verifier for Google ID tokens.
///
/// Keys come either from a JWKS endpoint (production) or from PEMs added
/// through the builder (local development and tests).
#[derive(Clone)]
pub struct JwtVerifier {
    config: JwtConfig,
    keys: KeyRing,
    jwks: Option<JwksFetcher>,
    last_refresh: Arc<Mutex<Option<Instant>>>,
}

impl JwtVerifier {
    pub fn new(config: JwtConfig, keys: KeyRing) -> Self {
        Self::assemble(config, keys, None)
    }

    pub fn builder(config: JwtConfig) -> JwtVerifierBuilder {
        JwtVerifierBuilder {
            config,
            keys: KeyRing::new(),
            jwks: None,
        }
    }

    fn assemble(config: JwtConfig, keys: KeyRing, jwks: Option<JwksFetcher>) -> Self {
        Self {
            config,
            keys,
            jwks,
            last_refresh: Arc::new(Mutex::new(None)),
        }
    }

    pub fn keys(&self) -> &KeyRing {
        &self.keys
    }

    pub fn jwks_fetcher(&self) -> Option<&JwksFetcher> {
        self.jwks.as_ref()
    }

    fn validation(&self, audience: &str) -> Validation {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(self.config.issuers.as_slice());
        validation.set_audience(&[audience]);
        validation.set_required_spec_claims(&["exp", "iat", "aud", "iss"]);
        validation.leeway = u64::from(self.config.leeway_seconds);
        validation
    }

    /// Checks the RS256 signature plus `aud`, `iss` and `exp`, then decodes
    /// the payload into [`TokenClaims`].
    pub async fn verify(&self, token: &str, audience: &str) -> AuthResult<TokenClaims> {
        let kid = decode_header(token)
            .map_err(|err| AuthError::InvalidHeader(err.to_string()))?
            .kid
            .ok_or(AuthError::MissingKeyId)?;
        let key = self.signing_key(&kid).await?;

        let payload = decode::<Value>(token, &key, &self.validation(audience))?.claims;
        let claims = TokenClaims::try_from(payload)?;
        debug!(kid, subject = %claims.subject, "ID token signature verified");
        Ok(claims)
    }

    /// Google rotates keys; an unseen kid triggers a refresh, but no more
    /// than once per `refresh_cooldown` across all requests.
    async fn signing_key(&self, kid: &str) -> AuthResult<DecodingKey> {
        if let Some(key) = self.keys.lookup(kid) {
            return Ok(key);
        }

        let fetcher = match &self.jwks {
            Some(fetcher) if self.claim_refresh_slot() => fetcher,
            _ => {
                debug!(kid, "unknown kid; no key refresh due");
                return Err(AuthError::UnknownKeyId(kid.to_owned()));
            }
        };
        if self.load_keys(fetcher).await? == 0 {
            return Err(AuthError::UnknownKeyId(kid.to_owned()));
        }
        self.keys
            .lookup(kid)
            .ok_or_else(|| AuthError::UnknownKeyId(kid.to_owned()))
    }

    /// Records a refresh attempt unless one happened within the cooldown.
    fn claim_refresh_slot(&self) -> bool {
        let mut last = self
            .last_refresh
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        if (*last).is_some_and(|at| now.duration_since(at) < self.config.refresh_cooldown) {
            return false;
        }
        *last = Some(now);
        true
    }

    /// Reload the JWKS unconditionally. An empty document leaves the current
    /// keys in place.
    pub async fn refresh_jwks(&self) -> AuthResult<usize> {
        let Some(fetcher) = &self.jwks else {
            return Ok(0);
        };
        *self
            .last_refresh
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Instant::now());
        self.load_keys(fetcher).await
    }

    async fn load_keys(&self, fetcher: &JwksFetcher) -> AuthResult<usize> {
        let fetched = fetcher.fetch().await?;
        let count = fetched.len();
        if count > 0 {
            self.keys.rotate(fetched);
        }
        Ok(count)
    }
}

#[async_trait]
impl TokenValidator for JwtVerifier {
    async fn validate(&self, raw_token: &str, audience: &str) -> AuthResult<TokenClaims> {
        self.verify(raw_token, audience)
            .await
            .map_err(|err| AuthError::InvalidToken(err.to_string()))
    }
}

pub struct JwtVerifierBuilder {
    config: JwtConfig,
    keys: KeyRing,
    jwks: Option<JwksFetcher>,
}

impl JwtVerifierBuilder {
    pub fn with_rsa_pem(self, kid: impl Into<String>, pem: &[u8]) -> AuthResult<Self> {
        self.keys.add_rsa_pem(kid, pem)?;
        Ok(self)
    }

    pub fn with_jwks_url(mut self, url: impl Into<String>) -> Self {
        self.jwks = Some(JwksFetcher::new(url));
        self
    }

    /// Performs the first JWKS download when a URL was configured, so a
    /// verifier never starts with an empty key ring by accident.
    pub async fn build(self) -> AuthResult<JwtVerifier> {
        let verifier = JwtVerifier::assemble(self.config, self.keys, self.jwks);

        if verifier.jwks.is_some() {
            let count = verifier.refresh_jwks().await?;
            info!(count, "Google signing keys loaded");
        }
        Ok(verifier)
    }
}
