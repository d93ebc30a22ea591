//! Local registry of known threeport instances
//!
//! The registry is a YAML document (by default
//! `~/.config/threeport/config.yaml`) holding every instance this machine
//! created plus a pointer to the current one:
//!
//! ```yaml
//! Instances:
//! - Name: dev
//!   Provider: local
//!   APIServer: http://localhost:1323
//! CurrentInstance: dev
//! ```
//!
//! It is loaded once at the start of a lifecycle operation and written once at
//! the end. Writes go to a sibling temp file that is renamed over the original,
//! so a crash mid-write never leaves a truncated registry.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{Error, ProviderKind, Result};

/// One registered control-plane instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    /// Unique instance name
    #[serde(rename = "Name")]
    pub name: String,
    /// Provider the instance's cluster runs on
    #[serde(rename = "Provider", default)]
    pub provider: ProviderKind,
    /// URL of the instance's threeport API
    #[serde(rename = "APIServer", default)]
    pub api_server: String,
}

/// Persisted set of instances plus the current-instance pointer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceRegistry {
    /// Registered instances, in creation order
    #[serde(rename = "Instances", default)]
    pub instances: Vec<Instance>,
    /// Name of the current instance, empty when unset
    #[serde(rename = "CurrentInstance", default)]
    pub current_instance: String,
}

impl InstanceRegistry {
    /// Load the registry from `path`, returning an empty registry if the file
    /// doesn't exist yet
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "no threeport config yet, starting empty");
            return Ok(Self::default());
        }

        let data = std::fs::read_to_string(path)
            .map_err(|e| Error::registry(path, format!("failed to read: {}", e)))?;
        if data.trim().is_empty() {
            return Ok(Self::default());
        }

        let mut registry: Self = serde_yaml::from_str(&data)
            .map_err(|e| Error::registry(path, format!("failed to parse: {}", e)))?;

        if !registry.current_instance.is_empty()
            && registry.get(&registry.current_instance).is_none()
        {
            warn!(
                current = %registry.current_instance,
                "current instance is not registered, clearing pointer"
            );
            registry.current_instance.clear();
        }

        Ok(registry)
    }

    /// Write the registry to `path` via a temp file and rename
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::registry(path, format!("failed to create {}: {}", parent.display(), e))
            })?;
        }

        let data = serde_yaml::to_string(self)
            .map_err(|e| Error::registry(path, format!("failed to serialize: {}", e)))?;

        let tmp = temp_path(path);
        write_synced(&tmp, data.as_bytes())
            .map_err(|e| Error::registry(path, format!("failed to write {}: {}", tmp.display(), e)))?;
        std::fs::rename(&tmp, path).map_err(|e| {
            let _ = std::fs::remove_file(&tmp);
            Error::registry(path, format!("failed to replace config: {}", e))
        })
    }

    /// Look up an instance by name
    pub fn get(&self, name: &str) -> Option<&Instance> {
        self.instances.iter().find(|i| i.name == name)
    }

    /// Look up an instance by name, failing with `InstanceNotFound`
    pub fn require(&self, name: &str) -> Result<&Instance> {
        self.get(name).ok_or_else(|| Error::InstanceNotFound {
            name: name.to_string(),
        })
    }

    /// The current instance, if the pointer is set
    pub fn current(&self) -> Option<&Instance> {
        if self.current_instance.is_empty() {
            return None;
        }
        self.get(&self.current_instance)
    }

    /// Check that `name` may be created, failing with `DuplicateInstance`
    /// unless `force_overwrite` is set
    pub fn ensure_can_create(&self, name: &str, force_overwrite: bool) -> Result<()> {
        if self.get(name).is_some() && !force_overwrite {
            return Err(Error::DuplicateInstance {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    /// Add or replace `instance` and make it the current instance
    pub fn upsert_current(&mut self, instance: Instance) {
        let name = instance.name.clone();
        match self.instances.iter_mut().find(|i| i.name == name) {
            Some(existing) => *existing = instance,
            None => self.instances.push(instance),
        }
        self.current_instance = name;
    }

    /// Remove the instance named `name`, clearing the current pointer if it
    /// referenced it
    pub fn remove(&mut self, name: &str) -> Result<Instance> {
        let index = self
            .instances
            .iter()
            .position(|i| i.name == name)
            .ok_or_else(|| Error::InstanceNotFound {
                name: name.to_string(),
            })?;
        let removed = self.instances.remove(index);
        if self.current_instance == name {
            self.current_instance.clear();
        }
        Ok(removed)
    }
}

/// Write `data` and flush it to disk before the caller renames the file
fn write_synced(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut file = std::fs::File::create(path)?;
    file.write_all(data)?;
    file.sync_all()
}

fn temp_path(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "config.yaml".to_string());
    path.with_file_name(format!(".{}.tmp", file_name))
}
