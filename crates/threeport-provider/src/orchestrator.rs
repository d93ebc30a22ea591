//! Lifecycle orchestrator
//!
//! Sequences one `create` or `delete` of a control-plane instance:
//!
//! ```text
//! create: validate -> provider create -> extract credentials -> install
//!         -> settle -> resolve endpoint -> register -> save registry
//! delete: look up instance or leftovers -> provider delete -> save registry
//! ```
//!
//! Nothing before the provider call has side effects. Provider failures are
//! returned unchanged (the provider has already compensated). Failures after
//! the cluster exists leave it running and the registry untouched; `delete`
//! by name still finds such instances through the provider's local files.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use threeport_common::{
    extract_credentials, Error, Instance, InstanceRegistry, Kubeconfig, ProviderKind, Result,
};

use crate::admin::{AdminConnector, KubeConnector};
use crate::control_plane::ControlPlane;
use crate::install::DependencyInstaller;
use crate::provider::{
    EksProvider, EksctlStackClient, InfraProvider, KindCli, KindProvider, Providers,
};
use crate::registrar::{ControlPlaneApi, Registrar, RestApiClient};

/// How long to wait after install for control-plane components to start
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(200);

/// Where the orchestrator keeps local state
#[derive(Clone, Debug)]
pub struct OrchestratorConfig {
    /// Instance registry file
    pub registry_path: PathBuf,
    /// Wait between install and registration
    pub settle_delay: Duration,
}

impl OrchestratorConfig {
    /// Config for a registry file with the default settle delay
    pub fn new(registry_path: impl Into<PathBuf>) -> Self {
        Self {
            registry_path: registry_path.into(),
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }

    /// Override the settle delay
    pub fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
        self.settle_delay = settle_delay;
        self
    }

    /// Directory holding kubeconfig and inventory files: the registry's
    /// directory
    pub fn config_dir(&self) -> PathBuf {
        match self.registry_path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }
}

/// A request to create a control-plane instance
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateRequest {
    /// Instance name
    pub name: String,
    /// Provider name as typed by the user
    pub provider: String,
    /// Replace an existing registry entry with the same name
    pub force_overwrite: bool,
}

/// Runs control-plane lifecycle operations
pub struct Orchestrator {
    config: OrchestratorConfig,
    providers: Providers,
    connector: Arc<dyn AdminConnector>,
    api: Arc<dyn ControlPlaneApi>,
}

impl Orchestrator {
    /// Orchestrator over explicit collaborators
    pub fn new(
        config: OrchestratorConfig,
        providers: Providers,
        connector: Arc<dyn AdminConnector>,
        api: Arc<dyn ControlPlaneApi>,
    ) -> Self {
        Self {
            config,
            providers,
            connector,
            api,
        }
    }

    /// Orchestrator using kind, eksctl, kube-rs and the REST API
    pub fn standard(config: OrchestratorConfig, aws_region: impl Into<String>) -> Result<Self> {
        let connector: Arc<dyn AdminConnector> = Arc::new(KubeConnector);
        let providers = Providers::new(
            Arc::new(KindProvider::new(KindCli)),
            Arc::new(EksProvider::new(EksctlStackClient, connector.clone(), aws_region)),
        );
        let api = Arc::new(RestApiClient::new()?);
        Ok(Self::new(config, providers, connector, api))
    }

    /// The config this orchestrator runs with
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Create a control-plane instance and register it as current
    pub async fn create(&self, request: &CreateRequest) -> Result<Instance> {
        let kind: ProviderKind = request.provider.parse()?;
        let control_plane = ControlPlane::new(request.name.as_str())?;
        let registry_path = &self.config.registry_path;
        let mut registry = InstanceRegistry::load(registry_path)?;
        registry.ensure_can_create(control_plane.instance_name(), request.force_overwrite)?;

        let provider = self.providers.get(kind);
        let config_dir = self.config.config_dir();
        provider.preflight(&control_plane, &config_dir)?;

        info!(
            instance = %control_plane.instance_name(),
            provider = %kind,
            "Creating threeport control plane..."
        );
        let provisioned = provider.create(&control_plane, &config_dir).await?;

        let endpoint = self
            .bootstrap(&control_plane, provider, &provisioned.kubeconfig)
            .await?;

        let instance = Instance {
            name: control_plane.instance_name().to_string(),
            provider: kind,
            api_server: endpoint,
        };
        registry.upsert_current(instance.clone());
        registry.save(registry_path)?;

        info!(
            instance = %instance.name,
            api_server = %instance.api_server,
            "threeport control plane created"
        );
        Ok(instance)
    }

    /// Steps after the cluster exists; none of them compensate
    async fn bootstrap(
        &self,
        control_plane: &ControlPlane,
        provider: &dyn InfraProvider,
        kubeconfig: &Path,
    ) -> Result<String> {
        let credentials = extract_credentials(&Kubeconfig::read_from(kubeconfig)?)?;

        let admin = self.connector.connect(kubeconfig).await?;
        DependencyInstaller::new(provider.kind())
            .install(admin.as_ref())
            .await?;

        info!(
            delay = ?self.config.settle_delay,
            "Waiting for control plane components to spin up..."
        );
        tokio::time::sleep(self.config.settle_delay).await;

        let endpoint = provider.api_endpoint(control_plane, admin.as_ref()).await?;
        Registrar::new(self.api.as_ref())
            .register(&endpoint, provider.kind(), &provider.region(), &credentials)
            .await?;
        Ok(endpoint)
    }

    /// Delete a control-plane instance.
    ///
    /// A name missing from the registry is still deleted when a provider holds
    /// leftovers for it (a failed rollback, or a create that failed after the
    /// cluster came up). The registry is only written when the name was
    /// registered.
    pub async fn delete(&self, name: &str) -> Result<Instance> {
        let registry_path = &self.config.registry_path;
        let config_dir = self.config.config_dir();
        let mut registry = InstanceRegistry::load(registry_path)?;

        let (instance, registered) = match registry.get(name) {
            Some(instance) => (instance.clone(), true),
            None => (self.unregistered_leftovers(name, &config_dir)?, false),
        };
        let control_plane = ControlPlane::new(name)?;

        info!(
            instance = %name,
            provider = %instance.provider,
            registered,
            "Deleting threeport control plane..."
        );
        self.providers
            .get(instance.provider)
            .delete(&control_plane, &config_dir)
            .await?;

        if !registered {
            info!(instance = %name, "leftover resources for unregistered instance deleted");
            return Ok(instance);
        }
        let removed = registry.remove(name)?;
        registry.save(registry_path)?;
        info!(instance = %name, "threeport control plane deleted");
        Ok(removed)
    }

    /// The provider still holding resources for an unregistered name
    fn unregistered_leftovers(&self, name: &str, config_dir: &Path) -> Result<Instance> {
        let not_found = || Error::InstanceNotFound {
            name: name.to_string(),
        };
        let control_plane = ControlPlane::new(name).map_err(|_| not_found())?;

        // Cloud first: a cloud instance also leaves a kubeconfig behind
        [ProviderKind::Cloud, ProviderKind::Local]
            .into_iter()
            .find(|kind| self.providers.get(*kind).has_leftovers(&control_plane, config_dir))
            .map(|provider| Instance {
                name: name.to_string(),
                provider,
                api_server: String::new(),
            })
            .ok_or_else(not_found)
    }
}
