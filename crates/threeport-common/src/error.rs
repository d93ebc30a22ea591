//! Error types for tptctl
//!
//! Errors are grouped by what they imply about external state. A validation
//! error means nothing was touched. A provisioning error may leave resources
//! behind, and the message says how many. A compensation error always leaves
//! resources behind and keeps the inventory that describes them.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for control-plane lifecycle operations
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid input, rejected before any side effect
    #[error("validation error: {message}")]
    Validation {
        /// Description of what's invalid
        message: String,
    },

    /// An instance with this name is already registered
    #[error(
        "instance of Threeport with name {name} already exists (use --force-overwrite-config to replace its config)"
    )]
    DuplicateInstance {
        /// Instance name
        name: String,
    },

    /// No registered instance has this name
    #[error("config for threeport instance with name {name} not found")]
    InstanceNotFound {
        /// Instance name
        name: String,
    },

    /// A resource inventory from an earlier failed run still exists
    #[error(
        "inventory {} for {cluster} is left over from an earlier run; its resources may still exist, delete the control plane with this name before creating it again",
        .path.display()
    )]
    StaleInventory {
        /// Derived cluster name
        cluster: String,
        /// Path of the leftover inventory file
        path: PathBuf,
    },

    /// External cluster engine (kind, eksctl, aws) failed
    #[error("{engine} error: {message}")]
    Engine {
        /// Engine binary or collaborator name
        engine: String,
        /// Description of what failed
        message: String,
    },

    /// Stack creation failed and every created resource was deleted again
    #[error(
        "error creating resources for {cluster}: {message} ({rolled_back} created resource(s) deleted, nothing left behind)"
    )]
    StackCreate {
        /// Derived cluster name
        cluster: String,
        /// Creation failure
        message: String,
        /// Number of resources removed by compensating deletion
        rolled_back: usize,
    },

    /// Stack creation failed and compensating deletion failed as well
    #[error(
        "error creating resources for {cluster}: {create}; error deleting resources: {rollback}; {leftover} resource(s) may remain, inventory kept at {}",
        .inventory.display()
    )]
    RollbackFailed {
        /// Derived cluster name
        cluster: String,
        /// The creation failure
        create: Box<Error>,
        /// The compensating deletion failure
        rollback: Box<Error>,
        /// Number of resources recorded in the kept inventory
        leftover: usize,
        /// Inventory file left on disk for a later delete
        inventory: PathBuf,
    },

    /// Provider step failed after the cluster exists
    #[error("provider error [{provider}] for {cluster}: {message}")]
    Provider {
        /// Derived cluster name
        cluster: String,
        /// Provider name (local, cloud)
        provider: String,
        /// Description of what failed
        message: String,
    },

    /// No kubeconfig cluster entry matches the current context
    #[error("failed to get Kubernetes cluster CA: no cluster entry matches current context '{context}'")]
    ClusterNotFound {
        /// The kubeconfig's current context
        context: String,
    },

    /// No kubeconfig user entry matches the current context
    #[error(
        "failed to get user credentials to Kubernetes cluster: no user entry matches current context '{context}'"
    )]
    UserCredentialsNotFound {
        /// The kubeconfig's current context
        context: String,
    },

    /// Kubeconfig is unreadable or incomplete
    #[error("kubeconfig error: {message}")]
    Kubeconfig {
        /// Description of what's wrong
        message: String,
    },

    /// A dependency installation step failed
    #[error("failed to install {step}: {message}")]
    Install {
        /// Name of the failed step
        step: String,
        /// Description of what failed
        message: String,
    },

    /// Remote control-plane API call failed
    #[error("threeport API error [{operation}]: {message}")]
    Api {
        /// API operation (e.g. "create workload cluster")
        operation: String,
        /// Description of what failed
        message: String,
    },

    /// A bounded wait ran out of time
    #[error("timeout: {message}")]
    Timeout {
        /// What was being waited for
        message: String,
    },

    /// Kubernetes API error
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// Registry file could not be read or written
    #[error("failed to update threeport config {}: {message}", .path.display())]
    Registry {
        /// Registry file path
        path: PathBuf,
        /// Description of what failed
        message: String,
    },

    /// Inventory file could not be read, written or removed
    #[error("inventory error at {}: {message}", .path.display())]
    Inventory {
        /// Inventory file path
        path: PathBuf,
        /// Description of what failed
        message: String,
    },

    /// I/O error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML error
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON error
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// What a failure implies about external state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Rejected before any side effect
    Validation,
    /// Engine or stack failure; zero, partial or full resources may exist
    Provisioning,
    /// Compensating deletion failed; resources remain
    Compensation,
    /// The cluster exists and is left running
    PostProvisioning,
    /// Local registry or inventory file failure
    LocalIo,
}

impl Error {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create an engine error
    pub fn engine(engine: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Engine {
            engine: engine.into(),
            message: msg.into(),
        }
    }

    /// Create a provider error with full context
    pub fn provider_for(
        cluster: impl Into<String>,
        provider: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::Provider {
            cluster: cluster.into(),
            provider: provider.into(),
            message: msg.into(),
        }
    }

    /// Create a kubeconfig error
    pub fn kubeconfig(msg: impl Into<String>) -> Self {
        Self::Kubeconfig {
            message: msg.into(),
        }
    }

    /// Create an installation error for a named step
    pub fn install(step: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Install {
            step: step.into(),
            message: msg.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout {
            message: msg.into(),
        }
    }

    /// Create an API error for a named operation
    pub fn api(operation: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Api {
            operation: operation.into(),
            message: msg.into(),
        }
    }

    /// Create a registry file error
    pub fn registry(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::Registry {
            path: path.into(),
            message: msg.into(),
        }
    }

    /// Create an inventory file error
    pub fn inventory(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::Inventory {
            path: path.into(),
            message: msg.into(),
        }
    }

    /// Classify the error by what it implies about external state
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Validation { .. }
            | Error::DuplicateInstance { .. }
            | Error::InstanceNotFound { .. }
            | Error::StaleInventory { .. } => ErrorCategory::Validation,
            Error::Engine { .. } | Error::StackCreate { .. } => ErrorCategory::Provisioning,
            Error::RollbackFailed { .. } => ErrorCategory::Compensation,
            Error::Provider { .. }
            | Error::ClusterNotFound { .. }
            | Error::UserCredentialsNotFound { .. }
            | Error::Kubeconfig { .. }
            | Error::Install { .. }
            | Error::Api { .. }
            | Error::Timeout { .. }
            | Error::Kube { .. } => ErrorCategory::PostProvisioning,
            Error::Registry { .. }
            | Error::Inventory { .. }
            | Error::Io(_)
            | Error::Yaml(_)
            | Error::Json(_) => ErrorCategory::LocalIo,
        }
    }
}
