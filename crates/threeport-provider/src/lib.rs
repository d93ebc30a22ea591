//! Control-plane lifecycle for tptctl
//!
//! The [`Orchestrator`] creates and deletes threeport control-plane instances
//! on a provider ([`KindProvider`] locally, [`EksProvider`] in the cloud),
//! installs the control plane onto the new cluster and registers it with its
//! own API.

pub mod admin;
pub mod control_plane;
pub mod install;
pub mod inventory;
pub mod orchestrator;
pub mod progress;
pub mod provider;
pub mod registrar;

pub use admin::{AdminConnector, ClusterAdmin, KubeAdmin, KubeConnector};
pub use control_plane::ControlPlane;
pub use install::DependencyInstaller;
pub use inventory::{InventoryStore, ResourceInventory, StackResource};
pub use orchestrator::{CreateRequest, Orchestrator, OrchestratorConfig, DEFAULT_SETTLE_DELAY};
pub use provider::{
    ClusterEngine, EksProvider, EksctlStackClient, InfraProvider, KindCli, KindProvider,
    ProvisionedCluster, Providers, ResourceStackClient, StackConfig,
};
pub use registrar::{ControlPlaneApi, Registrar, RestApiClient, WorkloadCluster, WorkloadDefinition};
