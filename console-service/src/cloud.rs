use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use futures::future::join_all;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::config::ManageConfig;

const STORAGE_BASE_URL: &str = "https://storage.googleapis.com";
const COMPUTE_BASE_URL: &str = "https://compute.googleapis.com";
const METADATA_BASE_URL: &str = "http://metadata.google.internal";

/// One entry of the locations blob: which regions/zones the project uses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// Human friendly name.
    pub location: String,
    /// Google Cloud zone backing [`Location::location`].
    pub zone: String,
    /// True for exactly one entry.
    #[serde(default)]
    pub default: bool,
}

/// Pick the location flagged as default, falling back to the first entry.
pub fn default_location(locations: &[Location]) -> Option<&Location> {
    locations
        .iter()
        .find(|location| location.default)
        .or_else(|| locations.first())
}

/// Cloud operations reachable from the protected route group.
#[async_trait]
pub trait InstanceManager: Send + Sync {
    async fn load_locations(&self) -> Result<Vec<Location>>;

    /// Name of the most recently created instance template.
    async fn latest_template(&self) -> Result<String>;

    /// Deletes every instance in the given zones; returns how many deletes
    /// were started.
    async fn delete_running_instances(&self, locations: &[Location]) -> Result<usize>;

    /// Returns the name of the new instance.
    async fn create_instance(&self, template: &str, location: &Location) -> Result<String>;
}

/// REST client for Cloud Storage and Compute Engine.
#[derive(Clone)]
pub struct GoogleCloud {
    client: Client,
    config: ManageConfig,
    storage_base: String,
    compute_base: String,
    metadata_base: String,
}

#[derive(Debug, Deserialize)]
struct ItemList {
    #[serde(default)]
    items: Vec<NamedItem>,
}

#[derive(Debug, Deserialize)]
struct NamedItem {
    name: String,
}

#[derive(Debug, Deserialize)]
struct AccessToken {
    access_token: String,
}

impl GoogleCloud {
    pub fn new(config: ManageConfig) -> Self {
        Self::with_endpoints(
            Client::new(),
            config,
            STORAGE_BASE_URL,
            COMPUTE_BASE_URL,
            METADATA_BASE_URL,
        )
    }

    pub fn with_endpoints(
        client: Client,
        config: ManageConfig,
        storage_base: impl Into<String>,
        compute_base: impl Into<String>,
        metadata_base: impl Into<String>,
    ) -> Self {
        Self {
            client,
            config,
            storage_base: storage_base.into(),
            compute_base: compute_base.into(),
            metadata_base: metadata_base.into(),
        }
    }

    async fn access_token(&self) -> Result<String> {
        if let Some(token) = &self.config.access_token {
            return Ok(token.clone());
        }

        let url = format!(
            "{}/computeMetadata/v1/instance/service-accounts/default/token",
            self.metadata_base
        );
        let token: AccessToken = self
            .client
            .get(&url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .context("could not reach metadata server")?
            .error_for_status()
            .context("metadata server refused token request")?
            .json()
            .await
            .context("could not decode metadata access token")?;
        Ok(token.access_token)
    }

    async fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        Ok(request.bearer_auth(self.access_token().await?))
    }

    fn project(&self) -> Result<&str> {
        if self.config.project.is_empty() {
            bail!("CLOUDSDK_CORE_PROJECT is not configured");
        }
        Ok(&self.config.project)
    }

    fn zone_url(&self, zone: &str) -> Result<String> {
        Ok(format!(
            "{}/compute/v1/projects/{}/zones/{}/instances",
            self.compute_base,
            self.project()?,
            zone
        ))
    }

    async fn list_instances(&self, zone: &str) -> Result<Vec<String>> {
        let request = self.authorized(self.client.get(self.zone_url(zone)?)).await?;
        let list: ItemList = request
            .send()
            .await
            .context("could not list instances from Compute service")?
            .error_for_status()
            .context("could not list instances from Compute service")?
            .json()
            .await
            .context("could not decode instance list")?;
        Ok(list.items.into_iter().map(|item| item.name).collect())
    }

    async fn delete_instance(&self, zone: &str, name: &str) -> Result<()> {
        let url = format!("{}/{}", self.zone_url(zone)?, urlencoding::encode(name));
        let request = self.authorized(self.client.delete(url)).await?;
        request
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .with_context(|| format!("could not delete instance '{name}' from Compute service"))?;
        Ok(())
    }
}

#[async_trait]
impl InstanceManager for GoogleCloud {
    async fn load_locations(&self) -> Result<Vec<Location>> {
        let blob = format!("{}/{}", self.config.bucket, self.config.object);
        if self.config.bucket.is_empty() || self.config.object.is_empty() {
            bail!("MANAGE_BUCKET and MANAGE_OBJECT must be configured");
        }
        info!(blob, "downloading locations blob");

        let url = format!(
            "{}/storage/v1/b/{}/o/{}",
            self.storage_base,
            urlencoding::encode(&self.config.bucket),
            urlencoding::encode(&self.config.object)
        );
        let request = self
            .authorized(self.client.get(url).query(&[("alt", "media")]))
            .await?;
        let data = request
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .with_context(|| format!("could not get Storage object {blob}"))?
            .bytes()
            .await
            .with_context(|| format!("could not read Storage object {blob}"))?;

        let locations: Vec<Location> =
            serde_json::from_slice(&data).context("could not unmarshal location data")?;
        info!(blob, count = locations.len(), "locations blob downloaded");
        Ok(locations)
    }

    async fn latest_template(&self) -> Result<String> {
        let url = format!(
            "{}/compute/v1/projects/{}/global/instanceTemplates",
            self.compute_base,
            self.project()?
        );
        let request = self
            .authorized(
                self.client
                    .get(url)
                    .query(&[("maxResults", "1"), ("orderBy", "creationTimestamp desc")]),
            )
            .await?;
        let list: ItemList = request
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .context("could not list instance templates from Compute service")?
            .json()
            .await
            .context("could not decode instance template list")?;

        list.items
            .into_iter()
            .next()
            .map(|item| item.name)
            .ok_or_else(|| anyhow!("no instance template(s) found"))
    }

    async fn delete_running_instances(&self, locations: &[Location]) -> Result<usize> {
        let mut targets = Vec::new();
        for location in locations {
            for name in self.list_instances(&location.zone).await? {
                targets.push((location.zone.as_str(), name));
            }
        }

        let deletes = targets.iter().map(|(zone, name)| async move {
            info!(instance = %name, zone, "starting delete operation on instance");
            if let Err(err) = self.delete_instance(zone, name).await {
                warn!(error = %err, instance = %name, "could not delete instance");
            }
        });
        join_all(deletes).await;

        Ok(targets.len())
    }

    async fn create_instance(&self, template: &str, location: &Location) -> Result<String> {
        let name = format!("console-{}", Utc::now().format("%Y%m%d%H%M%S"));
        let source = format!(
            "projects/{}/global/instanceTemplates/{}",
            self.project()?,
            template
        );
        let request = self
            .authorized(
                self.client
                    .post(self.zone_url(&location.zone)?)
                    .query(&[("sourceInstanceTemplate", source.as_str())])
                    .json(&json!({ "name": name })),
            )
            .await?;
        request
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .context("could not create new instance")?;

        info!(instance = %name, zone = %location.zone, template, "instance creation started");
        Ok(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn cloud(server: &MockServer) -> GoogleCloud {
        GoogleCloud::with_endpoints(
            Client::new(),
            ManageConfig {
                project: "menagerie".into(),
                bucket: "config-bucket".into(),
                object: "locations.json".into(),
                access_token: None,
            },
            server.base_url(),
            server.base_url(),
            server.base_url(),
        )
    }

    fn mock_metadata_token(server: &MockServer) {
        server.mock(|when, then| {
            when.method(GET)
                .path("/computeMetadata/v1/instance/service-accounts/default/token")
                .header("Metadata-Flavor", "Google");
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"access_token":"ya29.test","expires_in":3599,"token_type":"Bearer"}"#);
        });
    }

    #[test]
    fn default_location_prefers_flagged_entry() {
        let locations = vec![
            Location { location: "London".into(), zone: "europe-west2-a".into(), default: false },
            Location { location: "Iowa".into(), zone: "us-central1-a".into(), default: true },
        ];
        assert_eq!(default_location(&locations).map(|l| l.zone.as_str()), Some("us-central1-a"));
        assert_eq!(
            default_location(&locations[..1]).map(|l| l.zone.as_str()),
            Some("europe-west2-a")
        );
        assert!(default_location(&[]).is_none());
    }

    #[tokio::test]
    async fn load_locations_reads_blob_with_metadata_token() {
        let server = MockServer::start();
        mock_metadata_token(&server);
        let blob = server.mock(|when, then| {
            when.method(GET)
                .path("/storage/v1/b/config-bucket/o/locations.json")
                .query_param("alt", "media")
                .header("authorization", "Bearer ya29.test");
            then.status(200).body(
                r#"[{"location":"London","zone":"europe-west2-a","default":true},
                    {"location":"Iowa","zone":"us-central1-a"}]"#,
            );
        });

        let locations = cloud(&server).load_locations().await.expect("locations");
        blob.assert();
        assert_eq!(locations.len(), 2);
        assert!(locations[0].default);
        assert!(!locations[1].default);
    }

    #[tokio::test]
    async fn latest_template_requires_at_least_one() {
        let server = MockServer::start();
        mock_metadata_token(&server);
        server.mock(|when, then| {
            when.method(GET)
                .path("/compute/v1/projects/menagerie/global/instanceTemplates")
                .query_param("maxResults", "1")
                .query_param("orderBy", "creationTimestamp desc");
            then.status(200).body("{}");
        });

        let err = cloud(&server).latest_template().await.expect_err("no templates");
        assert!(err.to_string().contains("no instance template"));
    }

    #[tokio::test]
    async fn delete_running_instances_deletes_each_listed_instance() {
        let server = MockServer::start();
        mock_metadata_token(&server);
        server.mock(|when, then| {
            when.method(GET)
                .path("/compute/v1/projects/menagerie/zones/europe-west2-a/instances");
            then.status(200)
                .body(r#"{"items":[{"name":"game-1"},{"name":"game-2"}]}"#);
        });
        let delete_one = server.mock(|when, then| {
            when.method(DELETE)
                .path("/compute/v1/projects/menagerie/zones/europe-west2-a/instances/game-1");
            then.status(200).body("{}");
        });
        let delete_two = server.mock(|when, then| {
            when.method(DELETE)
                .path("/compute/v1/projects/menagerie/zones/europe-west2-a/instances/game-2");
            then.status(500);
        });

        let locations = vec![Location {
            location: "London".into(),
            zone: "europe-west2-a".into(),
            default: true,
        }];
        let started = cloud(&server)
            .delete_running_instances(&locations)
            .await
            .expect("deletes started");
        assert_eq!(started, 2);
        delete_one.assert();
        delete_two.assert();
    }

    #[tokio::test]
    async fn static_access_token_skips_metadata_server() {
        let server = MockServer::start();
        let insert = server.mock(|when, then| {
            when.method(POST)
                .path("/compute/v1/projects/menagerie/zones/us-central1-a/instances")
                .query_param(
                    "sourceInstanceTemplate",
                    "projects/menagerie/global/instanceTemplates/game-template",
                )
                .header("authorization", "Bearer static-token");
            then.status(200).body(r#"{"kind":"compute#operation"}"#);
        });

        let mut cloud = cloud(&server);
        cloud.config.access_token = Some("static-token".into());
        let location = Location {
            location: "Iowa".into(),
            zone: "us-central1-a".into(),
            default: true,
        };
        let name = cloud
            .create_instance("game-template", &location)
            .await
            .expect("created");
        assert!(name.starts_with("console-"));
        insert.assert();
    }
}
