use anyhow::Result;
use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;
use common_auth::AuthError;
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct ConsoleMetrics {
    registry: Registry,
    token_verifications: IntCounterVec,
    authorization_decisions: IntCounterVec,
}

impl ConsoleMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let token_verifications = IntCounterVec::new(
            Opts::new(
                "console_token_verifications_total",
                "Count of ID token verifications grouped by outcome",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(token_verifications.clone()))?;

        let authorization_decisions = IntCounterVec::new(
            Opts::new(
                "console_authorization_decisions_total",
                "Count of allowlist decisions on protected routes",
            ),
            &["decision"],
        )?;
        registry.register(Box::new(authorization_decisions.clone()))?;

        Ok(Self {
            registry,
            token_verifications,
            authorization_decisions,
        })
    }

    pub fn verification(&self, outcome: &str) {
        self.token_verifications.with_label_values(&[outcome]).inc();
    }

    pub fn verification_failed(&self, err: &AuthError) {
        self.verification(failure_label(err));
    }

    pub fn authorization(&self, decision: &str) {
        self.authorization_decisions
            .with_label_values(&[decision])
            .inc();
    }

    pub fn render(&self) -> Result<Response> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        let response = Response::builder()
            .status(StatusCode::OK)
            .header(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; version=0.0.4"),
            )
            .body(Body::from(buffer))?;
        Ok(response)
    }
}

/// Low-cardinality label; specific policy failures are only in the logs.
fn failure_label(err: &AuthError) -> &'static str {
    match err {
        AuthError::MissingCredential(_) | AuthError::MalformedCredential(_) => "no_credential",
        AuthError::MissingSubject => "no_subject",
        err if err.is_policy_failure() => "policy_rejected",
        _ => "invalid_token",
    }
}
