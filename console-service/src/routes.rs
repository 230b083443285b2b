use axum::extract::State;
use axum::http::StatusCode;
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::config::HttpLimits;
use crate::gate::authorised_only;
use crate::manage_handlers::{manage_overview, manage_recreate};
use crate::sign_in::{root_page, token_sign_in};
use crate::AppState;

async fn health() -> &'static str {
    "ok"
}

async fn ping() -> &'static str {
    "."
}

async fn metrics_endpoint(State(state): State<AppState>) -> Response {
    match state.metrics.render() {
        Ok(response) => response,
        Err(err) => {
            warn!(error = %err, "could not render metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Full application router. Dropping a request future (timeout or client
/// disconnect) also drops any token verification it is awaiting.
///
/// `Router::layer` wraps every route separately, so the in-flight cap uses a
/// single semaphore shared by all of them.
pub fn build_router(state: AppState, limits: HttpLimits) -> Router {
    let manage = Router::new()
        .route("/manage", get(manage_overview).post(manage_recreate))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            authorised_only,
        ));

    Router::new()
        .route("/", get(root_page))
        .route("/tokensignin", post(token_sign_in))
        .route("/healthz", get(health))
        .route("/ping", get(ping))
        .route("/metrics", get(metrics_endpoint))
        .merge(manage)
        .with_state(state)
        .layer(TimeoutLayer::new(limits.request_timeout))
        .layer(GlobalConcurrencyLimitLayer::new(limits.max_in_flight))
        .layer(TraceLayer::new_for_http())
}
