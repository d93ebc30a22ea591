//! tptctl library

pub mod commands;
pub mod config;
pub mod error;

pub use error::{Error, Result};

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// tptctl - Manage threeport control planes
#[derive(Parser, Debug)]
#[command(name = "tptctl")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to the threeport config file (default: ~/.config/threeport/config.yaml)
    #[arg(long, env = "THREEPORT_CONFIG", global = true)]
    pub threeport_config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create threeport resources
    Create(commands::create::CreateArgs),
    /// Delete threeport resources
    Delete(commands::delete::DeleteArgs),
    /// List threeport resources
    Get(commands::get::GetArgs),
    /// Print the tptctl version
    Version,
}

impl Cli {
    /// Run the CLI command
    pub async fn run(self) -> Result<()> {
        if let Commands::Version = self.command {
            commands::version::run();
            return Ok(());
        }

        let config_path = config::resolve_config_path(self.threeport_config.as_deref())?;
        match self.command {
            Commands::Create(args) => commands::create::run(args, &config_path).await,
            Commands::Delete(args) => commands::delete::run(args, &config_path).await,
            Commands::Get(args) => commands::get::run(args, &config_path),
            Commands::Version => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use commands::create::CreateResource;
    use commands::delete::DeleteResource;
    use commands::get::GetResource;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).expect("args should parse")
    }

    #[test]
    fn create_control_plane_defaults_to_local() {
        let cli = parse(&["tptctl", "create", "control-plane", "--name", "dev"]);
        let Commands::Create(args) = cli.command else {
            panic!("expected create");
        };
        let CreateResource::ControlPlane(args) = args.resource;
        assert_eq!(args.name, "dev");
        assert_eq!(args.provider, "local");
        assert!(!args.force_overwrite_config);
    }

    #[test]
    fn create_control_plane_accepts_every_flag() {
        let cli = parse(&[
            "tptctl",
            "--threeport-config",
            "/tmp/tp/config.yaml",
            "create",
            "control-plane",
            "--name",
            "prod",
            "--provider",
            "cloud",
            "--force-overwrite-config",
            "--aws-region",
            "eu-west-1",
            "--settle-secs",
            "5",
        ]);
        assert_eq!(
            cli.threeport_config.as_deref(),
            Some(std::path::Path::new("/tmp/tp/config.yaml"))
        );
        let Commands::Create(args) = cli.command else {
            panic!("expected create");
        };
        let CreateResource::ControlPlane(args) = args.resource;
        assert_eq!(args.provider, "cloud");
        assert!(args.force_overwrite_config);
        assert_eq!(args.aws_region, "eu-west-1");
        assert_eq!(args.settle_secs, 5);
    }

    #[test]
    fn delete_and_get_parse() {
        let cli = parse(&["tptctl", "delete", "control-plane", "-n", "dev"]);
        let Commands::Delete(args) = cli.command else {
            panic!("expected delete");
        };
        let DeleteResource::ControlPlane { name } = args.resource;
        assert_eq!(name, "dev");

        let cli = parse(&["tptctl", "get", "control-planes", "-o", "json"]);
        let Commands::Get(args) = cli.command else {
            panic!("expected get");
        };
        assert!(matches!(args.resource, GetResource::ControlPlanes));
    }

    #[test]
    fn create_requires_a_name() {
        assert!(Cli::try_parse_from(["tptctl", "create", "control-plane"]).is_err());
    }

    #[tokio::test]
    async fn get_on_a_fresh_config_lists_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("threeport/config.yaml");
        let cli = Cli::try_parse_from([
            "tptctl",
            "--threeport-config",
            path.to_str().unwrap(),
            "get",
            "control-planes",
        ])
        .unwrap();
        cli.run().await.unwrap();
        assert!(dir.path().join("threeport").is_dir());
        assert!(!path.exists());
    }
}
