//! `tptctl create` - create a threeport control plane
//!
//! # Usage
//!
//! ```bash
//! # Local control plane on kind
//! tptctl create control-plane --name dev
//!
//! # Control plane on EKS
//! tptctl create control-plane --name prod --provider cloud --aws-region us-west-2
//! ```

use std::path::Path;
use std::time::Duration;

use clap::{Args, Subcommand};
use tracing::{info, warn};

use threeport_common::ErrorCategory;
use threeport_provider::{CreateRequest, Orchestrator, OrchestratorConfig};

use crate::Result;

/// Region used for cloud control planes when none is given
pub const DEFAULT_AWS_REGION: &str = "us-east-1";

/// Create threeport resources
#[derive(Args, Debug)]
pub struct CreateArgs {
    #[command(subcommand)]
    pub resource: CreateResource,
}

/// Resource to create
#[derive(Subcommand, Debug)]
pub enum CreateResource {
    /// Create a new threeport control plane
    ControlPlane(CreateControlPlaneArgs),
}

/// Arguments for `create control-plane`
#[derive(Args, Debug)]
pub struct CreateControlPlaneArgs {
    /// Name of the control-plane instance
    #[arg(short, long)]
    pub name: String,

    /// Infrastructure provider: local (kind) or cloud (EKS)
    #[arg(short, long, default_value = "local")]
    pub provider: String,

    /// Overwrite the config for an existing instance with the same name
    #[arg(long)]
    pub force_overwrite_config: bool,

    /// AWS region for cloud control planes
    #[arg(long, env = "AWS_REGION", default_value = DEFAULT_AWS_REGION)]
    pub aws_region: String,

    /// Seconds to wait after install for control-plane components to start
    #[arg(long, env = "THREEPORT_SETTLE_SECS", default_value_t = 200)]
    pub settle_secs: u64,
}

/// Run the create command
pub async fn run(args: CreateArgs, config_path: &Path) -> Result<()> {
    match args.resource {
        CreateResource::ControlPlane(args) => create_control_plane(args, config_path).await,
    }
}

async fn create_control_plane(args: CreateControlPlaneArgs, config_path: &Path) -> Result<()> {
    let config = OrchestratorConfig::new(config_path)
        .with_settle_delay(Duration::from_secs(args.settle_secs));
    let orchestrator = Orchestrator::standard(config, args.aws_region)?;

    let name = args.name;
    let instance = match orchestrator
        .create(&CreateRequest {
            name: name.clone(),
            provider: args.provider,
            force_overwrite: args.force_overwrite_config,
        })
        .await
    {
        Ok(instance) => instance,
        Err(e) => {
            if let Some(hint) = leftover_hint(&e, &name) {
                warn!("{}", hint);
            }
            return Err(e.into());
        }
    };

    info!(
        "threeport control plane {} created, API at {}",
        instance.name, instance.api_server
    );
    info!("threeport config updated: {}", config_path.display());
    Ok(())
}

/// Cleanup advice for a failed create that left resources behind
fn leftover_hint(err: &threeport_common::Error, name: &str) -> Option<String> {
    let left = match err.category() {
        ErrorCategory::Compensation => "cloud resources were left behind",
        ErrorCategory::PostProvisioning => "the cluster is still running",
        _ => return None,
    };
    Some(format!(
        "{}; run `tptctl delete control-plane --name {}` to remove it",
        left, name
    ))
}
