#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header::COOKIE, Request};
use axum::Router;
use chrono::{Duration, Utc};
use common_auth::{
    AuthError, AuthResult, AuthorizedPrincipals, ClaimPolicy, IdTokenVerifier, TokenClaims,
    TokenValidator,
};
use console_service::cloud::{InstanceManager, Location};
use console_service::config::HttpLimits;
use console_service::metrics::ConsoleMetrics;
use console_service::{build_router, AppState};
use serde_json::{json, Map, Value};
use tokio::sync::Notify;

pub const CLIENT_ID: &str = "client_id";
pub const AUDIENCE: &str = "client_id.apps.googleusercontent.com";

/// Claims a real Google token for `subject` would carry.
pub fn google_claims(subject: &str) -> TokenClaims {
    let now = Utc::now();
    let mut claims = Map::new();
    claims.insert("sub".into(), json!(subject));
    claims.insert("aud".into(), json!(AUDIENCE));
    claims.insert("iss".into(), json!("https://accounts.google.com"));
    claims.insert("email".into(), json!(format!("{subject}@example.com")));
    claims.insert("email_verified".into(), Value::Bool(true));
    TokenClaims {
        subject: subject.to_owned(),
        audience: AUDIENCE.to_owned(),
        issuer: "https://accounts.google.com".to_owned(),
        issued_at: now - Duration::minutes(1),
        expires_at: now + Duration::hours(1),
        claims,
    }
}

/// Signature check stand-in: every registered token "verifies" to its claims.
#[derive(Default)]
pub struct FakeValidator {
    tokens: Mutex<HashMap<String, TokenClaims>>,
}

impl FakeValidator {
    pub fn register(&self, raw_token: &str, claims: TokenClaims) {
        self.tokens
            .lock()
            .expect("tokens lock")
            .insert(raw_token.to_owned(), claims);
    }
}

#[async_trait]
impl TokenValidator for FakeValidator {
    async fn validate(&self, raw_token: &str, _audience: &str) -> AuthResult<TokenClaims> {
        self.tokens
            .lock()
            .expect("tokens lock")
            .get(raw_token)
            .cloned()
            .ok_or_else(|| AuthError::InvalidToken("signature mismatch".into()))
    }
}

#[derive(Default)]
pub struct FakeInstances {
    pub deleted_in: Mutex<Vec<String>>,
    pub created: Mutex<Vec<(String, String)>>,
}

fn locations() -> Vec<Location> {
    vec![
        Location {
            location: "Frankfurt".into(),
            zone: "europe-west3-a".into(),
            default: false,
        },
        Location {
            location: "Iowa".into(),
            zone: "us-central1-a".into(),
            default: true,
        },
    ]
}

#[async_trait]
impl InstanceManager for FakeInstances {
    async fn load_locations(&self) -> Result<Vec<Location>> {
        Ok(locations())
    }

    async fn latest_template(&self) -> Result<String> {
        Ok("console-template-2".into())
    }

    async fn delete_running_instances(&self, locations: &[Location]) -> Result<usize> {
        let mut deleted = self.deleted_in.lock().expect("deleted lock");
        deleted.extend(locations.iter().map(|location| location.zone.clone()));
        Ok(1)
    }

    async fn create_instance(&self, template: &str, location: &Location) -> Result<String> {
        self.created
            .lock()
            .expect("created lock")
            .push((template.to_owned(), location.zone.clone()));
        Ok("console-1".into())
    }
}

/// Blocks in `load_locations` until released, keeping its request in flight.
#[derive(Default)]
pub struct ParkedInstances {
    pub entered: Notify,
    pub release: Notify,
}

#[async_trait]
impl InstanceManager for ParkedInstances {
    async fn load_locations(&self) -> Result<Vec<Location>> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(locations())
    }

    async fn latest_template(&self) -> Result<String> {
        Ok("console-template-2".into())
    }

    async fn delete_running_instances(&self, _locations: &[Location]) -> Result<usize> {
        Ok(0)
    }

    async fn create_instance(&self, _template: &str, _location: &Location) -> Result<String> {
        Ok("console-1".into())
    }
}

pub struct TestApp {
    pub router: Router,
    pub validator: Arc<FakeValidator>,
    pub instances: Arc<FakeInstances>,
}

impl TestApp {
    pub fn new(subjects: &[&str]) -> Self {
        let validator = Arc::new(FakeValidator::default());
        let instances = Arc::new(FakeInstances::default());
        let router = router_with(
            subjects,
            validator.clone(),
            instances.clone(),
            HttpLimits::default(),
        );
        Self {
            router,
            validator,
            instances,
        }
    }
}

pub fn router_with(
    subjects: &[&str],
    validator: Arc<FakeValidator>,
    instances: Arc<dyn InstanceManager>,
    limits: HttpLimits,
) -> Router {
    let verifier = IdTokenVerifier::new(validator, ClaimPolicy::new(AUDIENCE));
    let state = AppState::new(
        verifier,
        AuthorizedPrincipals::new(subjects.iter().copied()),
        instances,
        ConsoleMetrics::new().expect("metrics registry"),
    );
    build_router(state, limits)
}

pub fn sign_in_request(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/tokensignin")
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from(body.to_owned()))
        .expect("request")
}

pub fn manage_request(method: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri("/manage");
    if let Some(cookie) = cookie {
        builder = builder.header(COOKIE, cookie);
    }
    builder.body(Body::empty()).expect("request")
}
