//! Per-operation naming for a control-plane instance
//!
//! Nothing here is persisted; every path and name is derived from the
//! instance name so `create` and `delete` agree without shared state.

use std::path::{Path, PathBuf};

use threeport_common::{Error, Result};

/// Prefix applied to every underlying cluster name
pub const CLUSTER_NAME_PREFIX: &str = "threeport-";

/// Orchestration context for one instance
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ControlPlane {
    instance_name: String,
}

impl ControlPlane {
    /// Create a context after validating the instance name.
    ///
    /// The name ends up in cluster, CloudFormation and file names, so it must
    /// be a lowercase DNS label that still fits once prefixed.
    pub fn new(instance_name: impl Into<String>) -> Result<Self> {
        let instance_name = instance_name.into();
        validate_instance_name(&instance_name)?;
        Ok(Self { instance_name })
    }

    /// The user-supplied instance name
    pub fn instance_name(&self) -> &str {
        &self.instance_name
    }

    /// Name of the underlying cluster (e.g. "threeport-dev")
    pub fn cluster_name(&self) -> String {
        format!("{}{}", CLUSTER_NAME_PREFIX, self.instance_name)
    }

    /// Kubeconfig written for this instance inside `config_dir`
    pub fn kubeconfig_path(&self, config_dir: &Path) -> PathBuf {
        config_dir.join(format!("kubeconfig-{}", self.cluster_name()))
    }

    /// Resource inventory for this instance inside `config_dir` (cloud only)
    pub fn inventory_path(&self, config_dir: &Path) -> PathBuf {
        config_dir.join(format!("eks-inventory-{}.json", self.cluster_name()))
    }
}

fn validate_instance_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::validation("instance name must not be empty"));
    }
    let max = 63 - CLUSTER_NAME_PREFIX.len();
    if name.len() > max {
        return Err(Error::validation(format!(
            "instance name '{}' is longer than {} characters",
            name, max
        )));
    }
    let valid_chars = name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if !valid_chars || name.starts_with('-') || name.ends_with('-') {
        return Err(Error::validation(format!(
            "instance name '{}' must consist of lowercase letters, digits and '-', and start and end with an alphanumeric character",
            name
        )));
    }
    Ok(())
}
