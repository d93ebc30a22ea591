//! Cloud provider backed by EKS
//!
//! Cloud resources are created as a stack and recorded in a
//! [`ResourceInventory`]. The inventory is persisted after every creation
//! attempt so a partial stack can always be found and deleted again, either by
//! the immediate rollback here or by a later `delete`.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::Serialize;
use tracing::{debug, info, warn};

use threeport_common::kube_utils::poll_for;
use threeport_common::{
    Error, ProviderKind, Result, CONTROL_PLANE_NAMESPACE, SUPPORT_SERVICES_NAMESPACE,
};

use super::{remove_if_exists, InfraProvider, ProvisionedCluster};
use crate::admin::{AdminConnector, ClusterAdmin};
use crate::control_plane::ControlPlane;
use crate::inventory::{InventoryStore, ResourceInventory};
use crate::progress::{spawn_progress_relay, ProgressSender};

mod eksctl;

pub use eksctl::EksctlStackClient;

/// Worker node instance type
pub const EKS_INSTANCE_TYPE: &str = "t3.medium";

/// Service whose load balancer fronts the threeport API
pub const API_SERVER_SERVICE: &str = "threeport-api-server";

/// How long to wait for the API load balancer to get a hostname
pub const DEFAULT_ENDPOINT_TIMEOUT: Duration = Duration::from_secs(600);

/// How long to wait for load balancers to be released on delete
pub const DEFAULT_RELEASE_TIMEOUT: Duration = Duration::from_secs(300);

const DEFAULT_ENDPOINT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Desired shape of a cloud resource stack
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StackConfig {
    /// Cluster name (the derived "threeport-<instance>" name)
    pub name: String,
    /// Cloud region
    pub region: String,
    /// Worker instance types
    pub instance_types: Vec<String>,
    /// Tags applied to every created resource
    pub tags: BTreeMap<String, String>,
}

impl StackConfig {
    /// Stack config for a threeport cluster
    pub fn for_cluster(cluster_name: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            name: cluster_name.into(),
            region: region.into(),
            instance_types: vec![EKS_INSTANCE_TYPE.to_string()],
            tags: BTreeMap::from([("provisioner".to_string(), "threeport".to_string())]),
        }
    }
}

/// The cloud resource collaborator
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ResourceStackClient: Send + Sync {
    /// Create every resource for a cluster.
    ///
    /// The inventory is returned even when creation fails and records exactly
    /// what was created before the failure.
    async fn create_stack(
        &self,
        config: &StackConfig,
        progress: ProgressSender,
    ) -> (ResourceInventory, Result<()>);

    /// Delete every resource in an inventory
    async fn delete_stack(&self, inventory: &ResourceInventory, progress: ProgressSender)
        -> Result<()>;

    /// Write a kubeconfig for the cluster to `kubeconfig`
    async fn update_kubeconfig(&self, cluster_name: &str, region: &str, kubeconfig: &Path)
        -> Result<()>;
}

/// Cloud provider
pub struct EksProvider<S> {
    stacks: S,
    connector: Arc<dyn AdminConnector>,
    region: String,
    endpoint_timeout: Duration,
    endpoint_poll_interval: Duration,
    release_timeout: Duration,
}

impl<S: ResourceStackClient> EksProvider<S> {
    /// Create a provider for `region`
    pub fn new(stacks: S, connector: Arc<dyn AdminConnector>, region: impl Into<String>) -> Self {
        Self {
            stacks,
            connector,
            region: region.into(),
            endpoint_timeout: DEFAULT_ENDPOINT_TIMEOUT,
            endpoint_poll_interval: DEFAULT_ENDPOINT_POLL_INTERVAL,
            release_timeout: DEFAULT_RELEASE_TIMEOUT,
        }
    }

    /// Override how long to wait for the API endpoint and how often to check
    pub fn with_endpoint_timeout(mut self, timeout: Duration, poll_interval: Duration) -> Self {
        self.endpoint_timeout = timeout;
        self.endpoint_poll_interval = poll_interval;
        self
    }

    /// Override how long to wait for load balancers to be released
    pub fn with_release_timeout(mut self, timeout: Duration) -> Self {
        self.release_timeout = timeout;
        self
    }

    /// Delete compensation after a failed creation attempt
    async fn roll_back(
        &self,
        control_plane: &ControlPlane,
        store: &InventoryStore,
        inventory: ResourceInventory,
        create_err: Error,
        progress: ProgressSender,
    ) -> Error {
        let cluster = control_plane.cluster_name();
        warn!(
            cluster = %cluster,
            error = %create_err,
            resources = inventory.len(),
            "Problem encountered creating resources, deleting resources that were created..."
        );

        match self.stacks.delete_stack(&inventory, progress).await {
            Ok(()) => {
                if let Err(e) = store.remove(control_plane) {
                    warn!(error = %e, "resources deleted but inventory could not be removed");
                }
                Error::StackCreate {
                    cluster,
                    message: create_err.to_string(),
                    rolled_back: inventory.len(),
                }
            }
            Err(rollback_err) => Error::RollbackFailed {
                cluster,
                create: Box::new(create_err),
                rollback: Box::new(rollback_err),
                leftover: inventory.len(),
                inventory: store.path(control_plane),
            },
        }
    }

    /// Release cloud load balancers so the network can be torn down.
    ///
    /// Skipped when the cluster can't be reached, since it may already be
    /// partially gone. On a reachable cluster a failed release is fatal: the
    /// stack delete would otherwise stall on the load balancers' network
    /// interfaces.
    async fn release_load_balancers(&self, control_plane: &ControlPlane, kubeconfig: &Path) -> Result<()> {
        if !kubeconfig.exists() {
            warn!(path = %kubeconfig.display(), "kubeconfig not found, skipping load balancer cleanup");
            return Ok(());
        }
        let admin = match self.connector.connect(kubeconfig).await {
            Ok(admin) => admin,
            Err(e) => {
                warn!(error = %e, "cluster unreachable, skipping load balancer cleanup");
                return Ok(());
            }
        };
        for namespace in [SUPPORT_SERVICES_NAMESPACE, CONTROL_PLANE_NAMESPACE] {
            match admin.release_load_balancers(namespace, self.release_timeout).await {
                Ok(0) => debug!(namespace = %namespace, "no load balancers to release"),
                Ok(n) => info!(namespace = %namespace, count = n, "load balancers released"),
                Err(e) => {
                    return Err(Error::provider_for(
                        control_plane.cluster_name(),
                        ProviderKind::Cloud.to_string(),
                        format!(
                            "failed to release load balancers in {}: {}; cloud resources were not deleted",
                            namespace, e
                        ),
                    ))
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl<S: ResourceStackClient> InfraProvider for EksProvider<S> {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Cloud
    }

    fn region(&self) -> String {
        self.region.clone()
    }

    fn preflight(&self, control_plane: &ControlPlane, config_dir: &Path) -> Result<()> {
        let store = InventoryStore::new(config_dir);
        if store.exists(control_plane) {
            return Err(Error::StaleInventory {
                cluster: control_plane.cluster_name(),
                path: store.path(control_plane),
            });
        }
        Ok(())
    }

    fn has_leftovers(&self, control_plane: &ControlPlane, config_dir: &Path) -> bool {
        InventoryStore::new(config_dir).exists(control_plane)
    }

    async fn create(
        &self,
        control_plane: &ControlPlane,
        config_dir: &Path,
    ) -> Result<ProvisionedCluster> {
        let cluster = control_plane.cluster_name();
        let store = InventoryStore::new(config_dir);
        let config = StackConfig::for_cluster(&cluster, &self.region);
        let progress = spawn_progress_relay();

        info!(cluster = %cluster, region = %self.region, "Creating resources for EKS cluster...");
        let (inventory, created) = self.stacks.create_stack(&config, progress.clone()).await;

        // Written before anything else so the resources stay findable
        let saved = store.save(control_plane, &inventory);

        match (created, saved) {
            (Err(create_err), Err(save_err)) => Err(Error::inventory(
                store.path(control_plane),
                format!(
                    "resource creation failed ({}) and the inventory of {} created resource(s) could not be written ({})",
                    create_err,
                    inventory.len(),
                    save_err
                ),
            )),
            (Ok(()), Err(save_err)) => Err(save_err),
            (Err(create_err), Ok(_)) => Err(self
                .roll_back(control_plane, &store, inventory, create_err, progress)
                .await),
            (Ok(()), Ok(inventory_path)) => {
                info!(path = %inventory_path.display(), "EKS resources created");
                let kubeconfig = control_plane.kubeconfig_path(config_dir);
                self.stacks
                    .update_kubeconfig(&cluster, &self.region, &kubeconfig)
                    .await
                    .map_err(|e| {
                        Error::provider_for(
                            &cluster,
                            ProviderKind::Cloud.to_string(),
                            format!(
                                "failed to update kubeconfig: {}; the cluster is running and its inventory is kept at {}",
                                e,
                                inventory_path.display()
                            ),
                        )
                    })?;
                info!(path = %kubeconfig.display(), "kubeconfig written for EKS cluster");
                Ok(ProvisionedCluster { kubeconfig })
            }
        }
    }

    async fn delete(&self, control_plane: &ControlPlane, config_dir: &Path) -> Result<()> {
        let kubeconfig = control_plane.kubeconfig_path(config_dir);
        let store = InventoryStore::new(config_dir);

        self.release_load_balancers(control_plane, &kubeconfig).await?;

        let inventory = store.load(control_plane)?;
        info!(
            cluster = %inventory.cluster_name,
            resources = inventory.len(),
            "Deleting resources for EKS cluster..."
        );
        self.stacks
            .delete_stack(&inventory, spawn_progress_relay())
            .await?;
        info!(cluster = %inventory.cluster_name, "EKS resources deleted");

        if let Err(e) = store.remove(control_plane) {
            warn!(error = %e, "failed to remove inventory file");
        }
        if let Err(e) = remove_if_exists(&kubeconfig) {
            warn!(path = %kubeconfig.display(), error = %e, "failed to remove kubeconfig");
        }
        Ok(())
    }

    async fn api_endpoint(
        &self,
        control_plane: &ControlPlane,
        admin: &dyn ClusterAdmin,
    ) -> Result<String> {
        info!(service = API_SERVER_SERVICE, "Waiting for threeport API load balancer...");
        let host = poll_for(
            self.endpoint_timeout,
            self.endpoint_poll_interval,
            format!(
                "no load balancer address for {} on {} after {:?}",
                API_SERVER_SERVICE,
                control_plane.cluster_name(),
                self.endpoint_timeout
            ),
            || admin.load_balancer_host(CONTROL_PLANE_NAMESPACE, API_SERVER_SERVICE),
        )
        .await?;
        Ok(format!("http://{}", host))
    }
}
