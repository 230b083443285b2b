use axum::extract::State;
use axum::Json;
use common_auth::Principal;
use serde::Serialize;
use tracing::info;

use crate::cloud::{default_location, Location};
use crate::error::ConsoleError;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct ManageOverview {
    pub template: String,
    pub locations: Vec<Location>,
}

/// GET /manage
pub async fn manage_overview(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<Json<ManageOverview>, ConsoleError> {
    let locations = state.locations().await?.to_vec();
    let template = state.instances.latest_template().await?;
    info!(subject = %principal.subject, template, "served manage overview");
    Ok(Json(ManageOverview {
        template,
        locations,
    }))
}

/// POST /manage: replace whatever is running with one fresh instance.
pub async fn manage_recreate(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<String, ConsoleError> {
    let locations = state.locations().await?;
    let target = default_location(locations).ok_or(ConsoleError::NoLocations)?;

    let deleted = state.instances.delete_running_instances(locations).await?;
    let template = state.instances.latest_template().await?;
    let instance = state.instances.create_instance(&template, target).await?;

    info!(
        subject = %principal.subject,
        deleted,
        template,
        instance,
        zone = %target.zone,
        "recreated console instance"
    );
    Ok(format!(
        "POST /manage\nTemplate: {template}\nInstance: {instance}\nLocation: {}",
        target.location
    ))
}
