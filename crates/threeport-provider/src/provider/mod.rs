//! Infrastructure providers
//!
//! Each provider owns its resource stack end to end: it provisions a cluster,
//! writes the instance kubeconfig, cleans up after its own partial failures,
//! and tears everything down again on delete. The orchestrator only sees
//! [`InfraProvider`]; adding a provider means adding an implementation and a
//! [`ProviderKind`] variant.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use threeport_common::{ProviderKind, Result};

use crate::admin::ClusterAdmin;
use crate::control_plane::ControlPlane;

pub mod eks;
pub mod kind;

pub use eks::{EksProvider, EksctlStackClient, ResourceStackClient, StackConfig};
pub use kind::{ClusterEngine, KindCli, KindProvider};

/// A cluster a provider has finished provisioning
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProvisionedCluster {
    /// Kubeconfig for the new cluster, written by the provider
    pub kubeconfig: PathBuf,
}

/// Provider-specific resource stack management
#[async_trait]
pub trait InfraProvider: Send + Sync {
    /// Which provider this is
    fn kind(&self) -> ProviderKind;

    /// Region reported for the default compute cluster
    fn region(&self) -> String;

    /// Reject a create before any side effect if leftover state would make it
    /// unsafe
    fn preflight(&self, _control_plane: &ControlPlane, _config_dir: &Path) -> Result<()> {
        Ok(())
    }

    /// Whether local files show this provider still holds resources for an
    /// instance, registered or not
    fn has_leftovers(&self, control_plane: &ControlPlane, config_dir: &Path) -> bool;

    /// Provision the cluster and write its kubeconfig.
    ///
    /// On failure the provider has already done whatever compensation it can;
    /// the error says what, if anything, was left behind.
    async fn create(&self, control_plane: &ControlPlane, config_dir: &Path)
        -> Result<ProvisionedCluster>;

    /// Tear down everything `create` made, including local files
    async fn delete(&self, control_plane: &ControlPlane, config_dir: &Path) -> Result<()>;

    /// URL the installed threeport API is reachable at
    async fn api_endpoint(
        &self,
        control_plane: &ControlPlane,
        admin: &dyn ClusterAdmin,
    ) -> Result<String>;
}

/// The provider implementations available to the orchestrator
#[derive(Clone)]
pub struct Providers {
    local: Arc<dyn InfraProvider>,
    cloud: Arc<dyn InfraProvider>,
}

impl Providers {
    /// Bundle a local and a cloud provider
    pub fn new(local: Arc<dyn InfraProvider>, cloud: Arc<dyn InfraProvider>) -> Self {
        Self { local, cloud }
    }

    /// The provider for `kind`
    pub fn get(&self, kind: ProviderKind) -> &dyn InfraProvider {
        match kind {
            ProviderKind::Local => self.local.as_ref(),
            ProviderKind::Cloud => self.cloud.as_ref(),
        }
    }
}

/// Remove a local file, treating "already gone" as success
pub(crate) fn remove_if_exists(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_file(path) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}
