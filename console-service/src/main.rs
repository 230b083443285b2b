use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use common_auth::{AuthorizedPrincipals, ClaimPolicy, IdTokenVerifier, JwtConfig, JwtVerifier};
use console_service::cloud::GoogleCloud;
use console_service::config::{load_console_config, JwtSettings};
use console_service::metrics::ConsoleMetrics;
use console_service::{build_router, AppState};
use tokio::net::TcpListener;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = load_console_config()?;

    let jwt_verifier = build_jwt_verifier(&config.jwt).await?;
    spawn_jwks_refresh(jwt_verifier.clone(), config.jwt.jwks_refresh);

    let principals = AuthorizedPrincipals::new(config.authorised_subjects.clone());
    if principals.is_empty() {
        warn!("AUTH_SUB is empty; every request to /manage will be refused");
    }
    info!(count = principals.len(), audience = %config.audience, "authorised subjects loaded");

    let verifier = IdTokenVerifier::new(jwt_verifier, ClaimPolicy::new(config.audience.clone()));
    let state = AppState::new(
        verifier,
        principals,
        Arc::new(GoogleCloud::new(config.manage.clone())),
        ConsoleMetrics::new()?,
    );
    let app = build_router(state, config.http);

    let ip: std::net::IpAddr = config.host.parse().context("HOST is not an IP address")?;
    let addr = SocketAddr::from((ip, config.port));

    info!(%addr, "starting console-service");
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server has been shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "could not listen for interrupt signal");
        std::future::pending::<()>().await;
    }
    info!("interrupt signal received; server beginning shutdown");
}

async fn build_jwt_verifier(settings: &JwtSettings) -> anyhow::Result<Arc<JwtVerifier>> {
    let config = JwtConfig::google().with_leeway(settings.leeway_seconds);

    let builder = JwtVerifier::builder(config);
    let builder = match &settings.dev_public_key_pem {
        // A fixed dev key replaces the provider's JWKS entirely.
        Some(pem) => {
            warn!("Using JWT_DEV_PUBLIC_KEY_PEM for verification; do not enable in production");
            builder
                .with_rsa_pem("local-dev", pem.as_bytes())
                .map_err(anyhow::Error::from)?
        }
        None => {
            info!(jwks_url = %settings.jwks_url, "configuring JWKS fetcher");
            builder.with_jwks_url(settings.jwks_url.clone())
        }
    };

    let verifier = builder.build().await.map_err(anyhow::Error::from)?;
    info!("JWT verifier initialised");
    Ok(Arc::new(verifier))
}

fn spawn_jwks_refresh(verifier: Arc<JwtVerifier>, every: Duration) {
    let Some(fetcher) = verifier.jwks_fetcher() else {
        return;
    };
    let url = fetcher.url().to_owned();

    tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick fires immediately and the builder has just fetched.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match verifier.refresh_jwks().await {
                Ok(count) => {
                    debug!(count, jwks_url = %url, "Refreshed JWKS keys");
                }
                Err(err) => {
                    warn!(error = %err, jwks_url = %url, "Failed to refresh JWKS keys");
                }
            }
        }
    });
}
