use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use common_auth::{AuthError, Principal, SessionToken};
use tracing::warn;

use crate::AppState;

/// Guards the `/manage` route group.
///
/// Credential presence (400), then token trust (403), then the allowlist
/// (401). Only a listed subject reaches the wrapped handler.
pub async fn authorised_only(
    State(state): State<AppState>,
    token: Result<SessionToken, AuthError>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let SessionToken(token) = token.inspect_err(|err| {
        warn!(error = %err, "could not get token cookie");
        state.metrics.verification_failed(err);
    })?;

    let verified = state.verifier.verify(&token).await.inspect_err(|err| {
        warn!(error = %err, "error verifying token integrity");
        state.metrics.verification_failed(err);
    })?;
    state.metrics.verification("verified");

    if let Err(err) = state.principals.authorize(&verified.subject) {
        state.metrics.authorization("denied");
        return Err(err);
    }
    state.metrics.authorization("allowed");

    request.extensions_mut().insert(Principal {
        subject: verified.subject,
    });
    Ok(next.run(request).await)
}
