//! Common types for tptctl: errors, the instance registry, kubeconfig
//! credentials and Kubernetes utilities

#![deny(missing_docs)]

pub mod error;
pub mod kube_utils;
pub mod kubeconfig;
pub mod provider_kind;
pub mod registry;

pub use error::{Error, ErrorCategory};
pub use kubeconfig::{extract_credentials, CredentialBundle, Kubeconfig};
pub use provider_kind::ProviderKind;
pub use registry::{Instance, InstanceRegistry};

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Namespace the threeport control plane is installed into
pub const CONTROL_PLANE_NAMESPACE: &str = "threeport-control-plane";

/// Namespace the support-services operator is installed into (cloud only)
pub const SUPPORT_SERVICES_NAMESPACE: &str = "support-services-system";
