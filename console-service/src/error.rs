use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;

/// Failures of the collaborators behind the protected routes.
#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("no locations configured")]
    NoLocations,
    #[error(transparent)]
    Collaborator(#[from] anyhow::Error),
}

impl IntoResponse for ConsoleError {
    fn into_response(self) -> Response {
        error!(error = %self, "manage operation failed");
        let status = StatusCode::INTERNAL_SERVER_ERROR;
        (status, status.canonical_reason().unwrap_or("Internal Server Error")).into_response()
    }
}
