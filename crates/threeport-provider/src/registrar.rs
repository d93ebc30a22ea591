//! Control-plane registrar
//!
//! Seeds a freshly installed control plane with its default compute cluster
//! (the cluster it runs on) and the forward-proxy workload definition.

use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use threeport_common::{CredentialBundle, Error, ProviderKind, Result};

use crate::install::manifests;

/// Name of the compute cluster every control plane starts with
pub const DEFAULT_COMPUTE_CLUSTER_NAME: &str = "default-threeport-compute-space";

/// In-cluster API address of the default compute cluster
pub const DEFAULT_COMPUTE_CLUSTER_API_ENDPOINT: &str = "kubernetes.default";

/// Name of the seeded forward-proxy workload definition
pub const FORWARD_PROXY_DEFINITION_NAME: &str = "forwardProxy";

/// Owner of seeded objects until user management exists
pub const SUPERUSER_ID: u32 = 1;

const API_VERSION_PATH: &str = "v0";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A compute cluster known to the control plane
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WorkloadCluster {
    pub name: String,
    pub region: String,
    pub provider: String,
    #[serde(rename = "APIEndpoint")]
    pub api_endpoint: String,
    #[serde(rename = "CACertificate")]
    pub ca_certificate: String,
    pub certificate: String,
    pub key: String,
}

/// A reusable workload definition
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WorkloadDefinition {
    pub name: String,
    #[serde(rename = "YAMLDocument")]
    pub yaml_document: String,
    #[serde(rename = "UserID")]
    pub user_id: u32,
}

/// The remote control-plane API
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ControlPlaneApi: Send + Sync {
    /// Register a compute cluster
    async fn create_workload_cluster(&self, endpoint: &str, cluster: &WorkloadCluster) -> Result<()>;

    /// Register a workload definition
    async fn create_workload_definition(
        &self,
        endpoint: &str,
        definition: &WorkloadDefinition,
    ) -> Result<()>;
}

/// [`ControlPlaneApi`] over the threeport REST API
#[derive(Clone, Debug)]
pub struct RestApiClient {
    http: HttpClient,
}

impl RestApiClient {
    /// Create a client with the default request timeout
    pub fn new() -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::api("build client", e.to_string()))?;
        Ok(Self { http })
    }

    fn url(endpoint: &str, collection: &str) -> String {
        format!(
            "{}/{}/{}",
            endpoint.trim_end_matches('/'),
            API_VERSION_PATH,
            collection
        )
    }

    /// POST a JSON body, failing on any non-2xx status
    async fn post<T: Serialize + Sync>(
        &self,
        operation: &str,
        url: &str,
        body: &T,
    ) -> Result<()> {
        debug!(url = %url, "POST");
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::api(operation, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::api(
                operation,
                format!("{} returned {}: {}", url, status, body.trim()),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl ControlPlaneApi for RestApiClient {
    async fn create_workload_cluster(&self, endpoint: &str, cluster: &WorkloadCluster) -> Result<()> {
        let url = Self::url(endpoint, "workload-clusters");
        self.post("create workload cluster", &url, cluster).await
    }

    async fn create_workload_definition(
        &self,
        endpoint: &str,
        definition: &WorkloadDefinition,
    ) -> Result<()> {
        let url = Self::url(endpoint, "workload-definitions");
        self.post("create workload definition", &url, definition).await
    }
}

/// The default compute cluster record for a new control plane
pub fn default_compute_cluster(
    provider: ProviderKind,
    region: &str,
    credentials: &CredentialBundle,
) -> Result<WorkloadCluster> {
    Ok(WorkloadCluster {
        name: DEFAULT_COMPUTE_CLUSTER_NAME.to_string(),
        region: region.to_string(),
        provider: provider.engine_name().to_string(),
        api_endpoint: DEFAULT_COMPUTE_CLUSTER_API_ENDPOINT.to_string(),
        ca_certificate: credentials.ca_certificate_pem()?,
        certificate: credentials.client_certificate_pem()?,
        key: credentials.client_key_pem()?,
    })
}

/// The seeded forward-proxy definition
pub fn forward_proxy_definition() -> WorkloadDefinition {
    WorkloadDefinition {
        name: FORWARD_PROXY_DEFINITION_NAME.to_string(),
        yaml_document: manifests::forward_proxy(),
        user_id: SUPERUSER_ID,
    }
}

/// Registers a new control plane's seed objects
pub struct Registrar<'a> {
    api: &'a dyn ControlPlaneApi,
}

impl<'a> Registrar<'a> {
    /// Registrar calling `api`
    pub fn new(api: &'a dyn ControlPlaneApi) -> Self {
        Self { api }
    }

    /// Register the default compute cluster, then the seed definition.
    ///
    /// Single attempt each; a cluster registration failure skips the
    /// definition.
    pub async fn register(
        &self,
        endpoint: &str,
        provider: ProviderKind,
        region: &str,
        credentials: &CredentialBundle,
    ) -> Result<()> {
        let cluster = default_compute_cluster(provider, region, credentials)?;
        self.api.create_workload_cluster(endpoint, &cluster).await?;
        info!(cluster = %cluster.name, "default workload cluster for compute space set up");

        let definition = forward_proxy_definition();
        self.api
            .create_workload_definition(endpoint, &definition)
            .await?;
        info!(definition = %definition.name, "forward proxy workload definition added");
        Ok(())
    }
}
