//! Local provider backed by kind
//!
//! The API port is published from the worker node to the host, so the
//! control plane is reachable at a fixed local URL once installed.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

use threeport_common::{Error, ProviderKind, Result};

use super::{remove_if_exists, InfraProvider, ProvisionedCluster};
use crate::admin::ClusterAdmin;
use crate::control_plane::ControlPlane;

/// Port the threeport API listens on inside the cluster and on the host
pub const KIND_API_PORT: u16 = 1323;

/// Region reported for local clusters
pub const KIND_REGION: &str = "local";

/// Render the kind config for a cluster: one control-plane node and one worker
/// that publishes the API port
pub fn kind_config(cluster_name: &str) -> String {
    format!(
        r#"kind: Cluster
apiVersion: kind.x-k8s.io/v1alpha4
name: {cluster_name}
nodes:
- role: control-plane
- role: worker
  extraPortMappings:
    - containerPort: {port}
      hostPort: {port}
      protocol: TCP
"#,
        port = KIND_API_PORT
    )
}

/// URL the API is reachable at on a kind cluster
pub fn kind_api_endpoint() -> String {
    format!("http://localhost:{}", KIND_API_PORT)
}

/// The local cluster engine
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterEngine: Send + Sync {
    /// Create a cluster from a rendered config
    async fn create_cluster(&self, config: &str) -> Result<()>;

    /// Kubeconfig contents for a cluster
    async fn get_kubeconfig(&self, cluster_name: &str) -> Result<String>;

    /// Delete a cluster
    async fn delete_cluster(&self, cluster_name: &str) -> Result<()>;
}

/// [`ClusterEngine`] that shells out to the `kind` binary
#[derive(Clone, Copy, Debug, Default)]
pub struct KindCli;

fn kind_failed(action: &str, stderr: &[u8]) -> Error {
    Error::engine(
        "kind",
        format!("kind {} failed: {}", action, String::from_utf8_lossy(stderr).trim()),
    )
}

#[async_trait]
impl ClusterEngine for KindCli {
    async fn create_cluster(&self, config: &str) -> Result<()> {
        let mut child = Command::new("kind")
            .args(["create", "cluster", "--config", "-"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::engine("kind", format!("failed to run kind: {}", e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(config.as_bytes()).await?;
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(kind_failed("create cluster", &output.stderr));
        }
        Ok(())
    }

    async fn get_kubeconfig(&self, cluster_name: &str) -> Result<String> {
        let output = Command::new("kind")
            .args(["get", "kubeconfig", "--name", cluster_name])
            .output()
            .await
            .map_err(|e| Error::engine("kind", format!("failed to run kind: {}", e)))?;

        if !output.status.success() {
            return Err(kind_failed("get kubeconfig", &output.stderr));
        }
        String::from_utf8(output.stdout)
            .map_err(|e| Error::engine("kind", format!("kubeconfig is not valid UTF-8: {}", e)))
    }

    async fn delete_cluster(&self, cluster_name: &str) -> Result<()> {
        let output = Command::new("kind")
            .args(["delete", "cluster", "--name", cluster_name])
            .output()
            .await
            .map_err(|e| Error::engine("kind", format!("failed to run kind: {}", e)))?;

        if !output.status.success() {
            return Err(kind_failed("delete cluster", &output.stderr));
        }
        Ok(())
    }
}

/// Local provider
pub struct KindProvider<E> {
    engine: E,
}

impl<E: ClusterEngine> KindProvider<E> {
    /// Create a provider driving `engine`
    pub fn new(engine: E) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl<E: ClusterEngine> InfraProvider for KindProvider<E> {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Local
    }

    fn region(&self) -> String {
        KIND_REGION.to_string()
    }

    fn has_leftovers(&self, control_plane: &ControlPlane, config_dir: &Path) -> bool {
        control_plane.kubeconfig_path(config_dir).exists()
    }

    async fn create(
        &self,
        control_plane: &ControlPlane,
        config_dir: &Path,
    ) -> Result<ProvisionedCluster> {
        let cluster_name = control_plane.cluster_name();

        info!(cluster = %cluster_name, "Creating kind cluster (this could take a few minutes)...");
        self.engine.create_cluster(&kind_config(&cluster_name)).await?;
        info!(cluster = %cluster_name, "kind cluster created");

        let kubeconfig = self.engine.get_kubeconfig(&cluster_name).await?;
        let path = control_plane.kubeconfig_path(config_dir);
        tokio::fs::create_dir_all(config_dir).await?;
        tokio::fs::write(&path, kubeconfig).await?;
        info!(path = %path.display(), "kubeconfig for kind cluster written");

        Ok(ProvisionedCluster { kubeconfig: path })
    }

    async fn delete(&self, control_plane: &ControlPlane, config_dir: &Path) -> Result<()> {
        let cluster_name = control_plane.cluster_name();

        info!(cluster = %cluster_name, "Deleting kind cluster...");
        self.engine.delete_cluster(&cluster_name).await?;
        info!(cluster = %cluster_name, "kind cluster deleted");

        let path = control_plane.kubeconfig_path(config_dir);
        if let Err(e) = remove_if_exists(&path) {
            warn!(path = %path.display(), error = %e, "failed to remove kubeconfig");
        }
        Ok(())
    }

    async fn api_endpoint(
        &self,
        _control_plane: &ControlPlane,
        _admin: &dyn ClusterAdmin,
    ) -> Result<String> {
        let endpoint = kind_api_endpoint();
        debug!(endpoint = %endpoint, "using fixed local API endpoint");
        Ok(endpoint)
    }
}
