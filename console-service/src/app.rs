use std::sync::Arc;

use common_auth::{AuthorizedPrincipals, IdTokenVerifier};
use tokio::sync::OnceCell;

use crate::cloud::{InstanceManager, Location};
use crate::error::ConsoleError;
use crate::metrics::ConsoleMetrics;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub verifier: Arc<IdTokenVerifier>,
    pub principals: Arc<AuthorizedPrincipals>,
    pub instances: Arc<dyn InstanceManager>,
    pub metrics: Arc<ConsoleMetrics>,
    locations: Arc<OnceCell<Vec<Location>>>,
}

impl AppState {
    pub fn new(
        verifier: IdTokenVerifier,
        principals: AuthorizedPrincipals,
        instances: Arc<dyn InstanceManager>,
        metrics: ConsoleMetrics,
    ) -> Self {
        Self {
            verifier: Arc::new(verifier),
            principals: Arc::new(principals),
            instances,
            metrics: Arc::new(metrics),
            locations: Arc::new(OnceCell::new()),
        }
    }

    pub fn audience(&self) -> &str {
        self.verifier.audience()
    }

    /// Locations are downloaded on first use and kept for the process
    /// lifetime; a failed download is retried by the next caller.
    pub async fn locations(&self) -> Result<&[Location], ConsoleError> {
        let locations = self
            .locations
            .get_or_try_init(|| self.instances.load_locations())
            .await?;
        Ok(locations.as_slice())
    }
}
