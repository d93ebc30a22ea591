//! Cluster administrative interface
//!
//! Everything the lifecycle does against a cluster's API server goes through
//! [`ClusterAdmin`], so providers and the installer can be exercised without a
//! live cluster.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use kube::Client;
#[cfg(test)]
use mockall::automock;
use tracing::info;

use threeport_common::kube_utils;
use threeport_common::Result;

/// Administrative operations against one cluster
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterAdmin: Send + Sync {
    /// Server-side apply a multi-document YAML manifest
    async fn apply(&self, manifests: &str) -> Result<()>;

    /// Delete every LoadBalancer Service in `namespace` and wait for them to
    /// disappear, returning how many were deleted
    async fn release_load_balancers(&self, namespace: &str, timeout: Duration) -> Result<usize>;

    /// Hostname or IP assigned to a LoadBalancer Service, if provisioned yet
    async fn load_balancer_host(&self, namespace: &str, service: &str) -> Result<Option<String>>;
}

/// Builds a [`ClusterAdmin`] for the cluster a kubeconfig points at
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AdminConnector: Send + Sync {
    /// Connect using the kubeconfig's current context
    async fn connect(&self, kubeconfig: &Path) -> Result<Box<dyn ClusterAdmin>>;
}

/// [`ClusterAdmin`] backed by a kube-rs client
pub struct KubeAdmin {
    client: Client,
}

impl KubeAdmin {
    /// Wrap an existing client
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ClusterAdmin for KubeAdmin {
    async fn apply(&self, manifests: &str) -> Result<()> {
        kube_utils::apply_manifests(&self.client, manifests).await
    }

    async fn release_load_balancers(&self, namespace: &str, timeout: Duration) -> Result<usize> {
        let deleted = kube_utils::delete_load_balancer_services(&self.client, namespace).await?;
        if deleted.is_empty() {
            return Ok(0);
        }
        info!(
            namespace = %namespace,
            count = deleted.len(),
            "Waiting for load balancers to be released..."
        );
        kube_utils::wait_for_services_deleted(&self.client, namespace, &deleted, timeout).await?;
        Ok(deleted.len())
    }

    async fn load_balancer_host(&self, namespace: &str, service: &str) -> Result<Option<String>> {
        kube_utils::load_balancer_host(&self.client, namespace, service).await
    }
}

/// [`AdminConnector`] that builds kube-rs clients from kubeconfig files
#[derive(Clone, Copy, Debug, Default)]
pub struct KubeConnector;

#[async_trait]
impl AdminConnector for KubeConnector {
    async fn connect(&self, kubeconfig: &Path) -> Result<Box<dyn ClusterAdmin>> {
        let client = kube_utils::create_client(kubeconfig).await?;
        Ok(Box::new(KubeAdmin::new(client)))
    }
}
