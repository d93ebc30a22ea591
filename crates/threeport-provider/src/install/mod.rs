//! Dependency installer
//!
//! Applies the control-plane components in a fixed order. Each step is one
//! multi-document manifest; the first failing step stops the install.

use tracing::info;

use threeport_common::{Error, ProviderKind, Result};

use crate::admin::ClusterAdmin;

pub mod manifests;

/// One named installation step
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstallStep {
    /// Step name reported in errors
    pub name: &'static str,
    /// Multi-document YAML applied by the step
    pub manifests: String,
}

/// Installs threeport's in-cluster dependencies for a provider
#[derive(Clone, Copy, Debug)]
pub struct DependencyInstaller {
    provider: ProviderKind,
}

impl DependencyInstaller {
    /// Installer for a cluster created by `provider`
    pub fn new(provider: ProviderKind) -> Self {
        Self { provider }
    }

    /// The ordered steps for this provider
    pub fn steps(&self) -> Vec<InstallStep> {
        let mut steps = Vec::with_capacity(3);
        if self.provider.is_cloud() {
            steps.push(InstallStep {
                name: "support-services-operator",
                manifests: manifests::support_services_operator(),
            });
        }
        steps.push(InstallStep {
            name: "api-server",
            manifests: manifests::api_server(self.provider),
        });
        steps.push(InstallStep {
            name: "workload-controller",
            manifests: manifests::workload_controller(),
        });
        steps
    }

    /// Apply every step in order
    pub async fn install(&self, admin: &dyn ClusterAdmin) -> Result<()> {
        for step in self.steps() {
            info!(step = step.name, "Installing threeport {}...", step.name);
            admin
                .apply(&step.manifests)
                .await
                .map_err(|e| Error::install(step.name, e.to_string()))?;
            info!(step = step.name, "threeport {} installed", step.name);
        }
        Ok(())
    }
}
