use anyhow::{anyhow, Context, Result};
use common_auth::GOOGLE_JWKS_URL;
use std::env;
use std::time::Duration;

/// Google appends this to every OAuth client id to form the token audience.
pub const AUDIENCE_SUFFIX: &str = ".apps.googleusercontent.com";

#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    /// Bare OAuth client id, without [`AUDIENCE_SUFFIX`].
    pub client_id: String,
    /// Expected `aud` of every ID token.
    pub audience: String,
    pub authorised_subjects: Vec<String>,
    pub manage: ManageConfig,
    pub jwt: JwtSettings,
    pub http: HttpLimits,
    pub host: String,
    pub port: u16,
}

/// Collaborators behind the `/manage` route group.
#[derive(Debug, Clone, Default)]
pub struct ManageConfig {
    pub project: String,
    pub bucket: String,
    pub object: String,
    pub access_token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct JwtSettings {
    pub jwks_url: String,
    pub jwks_refresh: Duration,
    pub leeway_seconds: u32,
    pub dev_public_key_pem: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct HttpLimits {
    pub request_timeout: Duration,
    pub max_in_flight: usize,
}

impl Default for HttpLimits {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            max_in_flight: 100,
        }
    }
}

pub fn load_console_config() -> Result<ConsoleConfig> {
    let raw_client_id = env::var("GOOGLE_CLIENT_ID")
        .ok()
        .and_then(|value| normalize_optional(&value))
        .ok_or_else(|| anyhow!("missing Google Client ID; set GOOGLE_CLIENT_ID"))?;
    let (client_id, audience) = client_id_and_audience(&raw_client_id);

    let authorised_subjects = env::var("AUTH_SUB")
        .ok()
        .map(|value| parse_subjects(&value))
        .unwrap_or_default();

    let manage = ManageConfig {
        project: env::var("CLOUDSDK_CORE_PROJECT").unwrap_or_default(),
        bucket: env::var("MANAGE_BUCKET").unwrap_or_default(),
        object: env::var("MANAGE_OBJECT").unwrap_or_default(),
        access_token: env::var("GCP_ACCESS_TOKEN")
            .ok()
            .and_then(|value| normalize_optional(&value)),
    };

    let jwt = JwtSettings {
        jwks_url: env::var("GOOGLE_JWKS_URL").unwrap_or_else(|_| GOOGLE_JWKS_URL.to_string()),
        jwks_refresh: Duration::from_secs(
            u64_from_env("JWKS_REFRESH_SECONDS")?.unwrap_or(300).max(60),
        ),
        leeway_seconds: u64_from_env("JWT_LEEWAY_SECONDS")?
            .map(u32::try_from)
            .transpose()
            .context("JWT_LEEWAY_SECONDS out of range")?
            .unwrap_or(30),
        dev_public_key_pem: env::var("JWT_DEV_PUBLIC_KEY_PEM")
            .ok()
            .and_then(|value| normalize_optional(&value)),
    };

    let defaults = HttpLimits::default();
    let http = HttpLimits {
        request_timeout: u64_from_env("REQUEST_TIMEOUT_SECONDS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.request_timeout),
        max_in_flight: u64_from_env("MAX_IN_FLIGHT_REQUESTS")?
            .map(|value| value.max(1) as usize)
            .unwrap_or(defaults.max_in_flight),
    };

    let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port = u64_from_env("PORT")?
        .map(u16::try_from)
        .transpose()
        .context("PORT out of range")?
        .unwrap_or(8080);

    Ok(ConsoleConfig {
        client_id,
        audience,
        authorised_subjects,
        manage,
        jwt,
        http,
        host,
        port,
    })
}

/// Accepts the client id with or without the Google suffix.
pub fn client_id_and_audience(raw: &str) -> (String, String) {
    match raw.strip_suffix(AUDIENCE_SUFFIX) {
        Some(bare) => (bare.to_string(), raw.to_string()),
        None => (raw.to_string(), format!("{raw}{AUDIENCE_SUFFIX}")),
    }
}

fn parse_subjects(value: &str) -> Vec<String> {
    value
        .split(|c: char| c == ',' || c == ';' || c.is_whitespace())
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn u64_from_env(key: &str) -> Result<Option<u64>> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse::<u64>()
            .map(Some)
            .with_context(|| format!("Failed to parse {key}")),
        Err(_) => Ok(None),
    }
}

fn normalize_optional(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
