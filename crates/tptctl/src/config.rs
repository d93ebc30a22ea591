//! Location of the threeport config file
//!
//! Resolution order (highest priority first):
//! 1. `--threeport-config` flag
//! 2. `THREEPORT_CONFIG` environment variable (handled by clap)
//! 3. `~/.config/threeport/config.yaml`
//!
//! The file's directory also holds per-instance kubeconfig and inventory
//! files, so it is created up front.

use std::path::{Path, PathBuf};

use crate::{Error, Result};

const CONFIG_DIR: &str = ".config/threeport";
const CONFIG_FILE_NAME: &str = "config.yaml";

/// `~/.config/threeport/config.yaml`
pub fn default_config_path() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| Error::command_failed("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR).join(CONFIG_FILE_NAME))
}

/// Resolve the config file path and make sure its directory exists
pub fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => default_config_path()?,
    };
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        if !dir.exists() {
            std::fs::create_dir_all(dir).map_err(|e| {
                Error::command_failed(format!("failed to create {}: {}", dir.display(), e))
            })?;
        }
    }
    Ok(path)
}
