//! `tptctl delete` - delete a threeport control plane

use std::path::Path;

use clap::{Args, Subcommand};
use tracing::info;

use threeport_provider::{Orchestrator, OrchestratorConfig};

use super::create::DEFAULT_AWS_REGION;
use crate::Result;

/// Delete threeport resources
#[derive(Args, Debug)]
pub struct DeleteArgs {
    #[command(subcommand)]
    pub resource: DeleteResource,
}

/// Resource to delete
#[derive(Subcommand, Debug)]
pub enum DeleteResource {
    /// Delete a threeport control plane and everything it runs on
    ControlPlane {
        /// Name of the control-plane instance
        #[arg(short, long)]
        name: String,
    },
}

/// Run the delete command
pub async fn run(args: DeleteArgs, config_path: &Path) -> Result<()> {
    match args.resource {
        DeleteResource::ControlPlane { name } => {
            // Cloud deletion takes its region from the instance's inventory
            let orchestrator =
                Orchestrator::standard(OrchestratorConfig::new(config_path), DEFAULT_AWS_REGION)?;
            let removed = orchestrator.delete(&name).await?;
            info!(
                "threeport control plane {} ({}) deleted",
                removed.name, removed.provider
            );
            Ok(())
        }
    }
}
