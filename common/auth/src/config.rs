use std::time::Duration;

/// Google's published signing keys for ID tokens.
pub const GOOGLE_JWKS_URL: &str = "https://www.googleapis.com/oauth2/v3/certs";

/// Issuer values Google places in the `iss` claim.
pub const GOOGLE_ISSUERS: &[&str] = &["accounts.google.com", "https://accounts.google.com"];

/// Runtime configuration for JWT verification. The expected audience is
/// supplied per call rather than fixed here.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Issuers accepted by the signature primitive.
    pub issuers: Vec<String>,
    /// Allowable clock skew in seconds when validating exp/nbf.
    pub leeway_seconds: u32,
    /// Minimum gap between two JWKS downloads triggered by an unknown `kid`.
    pub refresh_cooldown: Duration,
}

impl JwtConfig {
    /// Construct config for Google ID tokens: 30 second leeway, one
    /// kid-triggered key refresh per minute.
    pub fn google() -> Self {
        Self {
            issuers: GOOGLE_ISSUERS.iter().map(|value| value.to_string()).collect(),
            leeway_seconds: 30,
            refresh_cooldown: Duration::from_secs(60),
        }
    }

    /// Adjust the allowed leeway.
    pub fn with_leeway(mut self, seconds: u32) -> Self {
        self.leeway_seconds = seconds;
        self
    }

    pub fn with_refresh_cooldown(mut self, cooldown: Duration) -> Self {
        self.refresh_cooldown = cooldown;
        self
    }
}
