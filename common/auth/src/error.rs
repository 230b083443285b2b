use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("could not validate ID token: {0}")]
    InvalidToken(String),
    #[error("token audience does not match this app's client ID: {0}")]
    AudienceMismatch(String),
    #[error("token was not issued by Google Accounts: {0}")]
    IssuerMismatch(String),
    #[error("token already expired: {0}")]
    TokenExpired(DateTime<Utc>),
    #[error("token is issued in the future: {0}")]
    TokenNotYetValid(DateTime<Utc>),
    #[error("token carries no subject")]
    MissingSubject,
    #[error("subject is not authorised: {0}")]
    Unauthorized(String),
    #[error("credential '{0}' missing from request")]
    MissingCredential(&'static str),
    #[error("credential '{0}' malformed")]
    MalformedCredential(&'static str),

    #[error("token missing kid header")]
    MissingKeyId,
    #[error("no decoding key registered for kid '{0}'")]
    UnknownKeyId(String),
    #[error("failed to decode token header: {0}")]
    InvalidHeader(String),
    #[error("token verification failed: {0}")]
    Verification(String),
    #[error("invalid claim '{0}' with value '{1}'")]
    InvalidClaim(&'static str, String),
    #[error("malformed claim payload: {0}")]
    InvalidJson(String),
    #[error("failed to parse decoding key for kid '{0}': {1}")]
    KeyParse(String, String),
    #[error("failed to fetch JWKS: {0}")]
    JwksFetch(String),
    #[error("failed to parse JWKS response: {0}")]
    JwksDecode(String),
    #[error("JWKS entry missing key id (kid)")]
    JwksMissingKid,
    #[error("JWKS key '{0}' missing required RSA components")]
    JwksMissingComponents(String),
}

impl AuthError {
    /// Policy failures on a structurally valid token. They are told apart in
    /// logs only; callers see one outcome.
    pub fn is_policy_failure(&self) -> bool {
        matches!(
            self,
            AuthError::AudienceMismatch(_)
                | AuthError::IssuerMismatch(_)
                | AuthError::TokenExpired(_)
                | AuthError::TokenNotYetValid(_)
        )
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::MissingCredential(_) | AuthError::MalformedCredential(_) => {
                StatusCode::BAD_REQUEST
            }
            AuthError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AuthError::InvalidToken(_)
            | AuthError::AudienceMismatch(_)
            | AuthError::IssuerMismatch(_)
            | AuthError::TokenExpired(_)
            | AuthError::TokenNotYetValid(_)
            | AuthError::MissingSubject
            | AuthError::MissingKeyId
            | AuthError::UnknownKeyId(_)
            | AuthError::InvalidHeader(_)
            | AuthError::Verification(_)
            | AuthError::InvalidClaim(_, _)
            | AuthError::InvalidJson(_) => StatusCode::FORBIDDEN,
            AuthError::KeyParse(_, _)
            | AuthError::JwksFetch(_)
            | AuthError::JwksDecode(_)
            | AuthError::JwksMissingKid
            | AuthError::JwksMissingComponents(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self.status() {
            StatusCode::BAD_REQUEST => "AUTH_CREDENTIAL",
            StatusCode::UNAUTHORIZED => "AUTH_SUBJECT",
            StatusCode::FORBIDDEN => "AUTH_TOKEN",
            _ => "AUTH_KEYS",
        }
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(value: jsonwebtoken::errors::Error) -> Self {
        Self::Verification(value.to_string())
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: &'static str,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        // Detail stays in the logs; the caller only learns the failure class.
        let body = ErrorBody {
            code: self.code(),
            message: status.canonical_reason().unwrap_or("Error"),
        };
        (status, Json(body)).into_response()
    }
}
