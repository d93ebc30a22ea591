//! Resource inventory store for cloud stacks
//!
//! The inventory records every cloud resource a stack-creation attempt made.
//! It is written after every attempt, successful or not, because a partial
//! stack still has billable resources that only the inventory can find again.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use threeport_common::{Error, Result};

use crate::control_plane::ControlPlane;

/// One cloud resource created for a stack
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackResource {
    /// Resource type (e.g. "CloudFormationStack")
    pub kind: String,
    /// Provider-side identifier
    pub id: String,
}

impl StackResource {
    /// Create a resource record
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
        }
    }
}

/// Every resource created for one cluster, in creation order
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceInventory {
    /// Derived cluster name the stack belongs to
    pub cluster_name: String,
    /// Cloud region the resources live in
    pub region: String,
    /// Created resources, oldest first
    #[serde(default)]
    pub resources: Vec<StackResource>,
}

impl ResourceInventory {
    /// Create an empty inventory
    pub fn new(cluster_name: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            cluster_name: cluster_name.into(),
            region: region.into(),
            resources: Vec::new(),
        }
    }

    /// Record a newly created resource
    pub fn record(&mut self, kind: impl Into<String>, id: impl Into<String>) {
        self.resources.push(StackResource::new(kind, id));
    }

    /// Number of recorded resources
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// True if nothing was created
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

/// Inventory files inside the provider config directory, keyed by cluster name
#[derive(Clone, Debug)]
pub struct InventoryStore {
    dir: PathBuf,
}

impl InventoryStore {
    /// Store rooted at `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Inventory path for a control plane
    pub fn path(&self, control_plane: &ControlPlane) -> PathBuf {
        control_plane.inventory_path(&self.dir)
    }

    /// True if an inventory file exists for the control plane
    pub fn exists(&self, control_plane: &ControlPlane) -> bool {
        self.path(control_plane).exists()
    }

    /// Write the inventory and flush it to disk before returning
    pub fn save(&self, control_plane: &ControlPlane, inventory: &ResourceInventory) -> Result<PathBuf> {
        let path = self.path(control_plane);
        let data = serde_json::to_vec_pretty(inventory)
            .map_err(|e| Error::inventory(&path, format!("failed to marshal inventory to JSON: {}", e)))?;

        std::fs::create_dir_all(&self.dir)
            .map_err(|e| Error::inventory(&path, format!("failed to create directory: {}", e)))?;
        write_synced(&path, &data)
            .map_err(|e| Error::inventory(&path, format!("failed to write inventory: {}", e)))?;

        debug!(path = %path.display(), resources = inventory.len(), "inventory written");
        Ok(path)
    }

    /// Read the inventory; a missing file is an error since deletion cannot
    /// proceed without it
    pub fn load(&self, control_plane: &ControlPlane) -> Result<ResourceInventory> {
        let path = self.path(control_plane);
        let data = std::fs::read(&path)
            .map_err(|e| Error::inventory(&path, format!("failed to read inventory file: {}", e)))?;
        serde_json::from_slice(&data)
            .map_err(|e| Error::inventory(&path, format!("failed to parse inventory file: {}", e)))
    }

    /// Remove the inventory file
    pub fn remove(&self, control_plane: &ControlPlane) -> Result<()> {
        let path = self.path(control_plane);
        std::fs::remove_file(&path)
            .map_err(|e| Error::inventory(&path, format!("failed to remove inventory file: {}", e)))
    }
}

fn write_synced(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut file = std::fs::File::create(path)?;
    file.write_all(data)?;
    file.sync_all()
}
