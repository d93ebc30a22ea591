//! `tptctl get` - list registered threeport resources

use std::path::Path;

use clap::{Args, Subcommand, ValueEnum};

use threeport_common::InstanceRegistry;

use super::CommandErrorExt;
use crate::Result;

/// List threeport resources
#[derive(Args, Debug)]
pub struct GetArgs {
    #[command(subcommand)]
    pub resource: GetResource,

    /// Output format
    #[arg(short, long, default_value = "table", global = true)]
    pub output: OutputFormat,
}

/// Resource to get
#[derive(Subcommand, Debug)]
pub enum GetResource {
    /// List control planes in the threeport config
    ControlPlanes,
}

/// Output format
#[derive(Clone, Debug, Default, ValueEnum)]
pub enum OutputFormat {
    /// Columnar table (default)
    #[default]
    Table,
    /// JSON
    Json,
}

const HEADERS: [&str; 4] = ["NAME", "PROVIDER", "API SERVER", "CURRENT"];

/// Run the get command
pub fn run(args: GetArgs, config_path: &Path) -> Result<()> {
    match args.resource {
        GetResource::ControlPlanes => {
            let registry = InstanceRegistry::load(config_path)?;
            match args.output {
                OutputFormat::Table => print_table(&HEADERS, &control_plane_rows(&registry)),
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&registry).cmd_err()?)
                }
            }
            Ok(())
        }
    }
}

fn control_plane_rows(registry: &InstanceRegistry) -> Vec<Vec<String>> {
    registry
        .instances
        .iter()
        .map(|i| {
            let current = if i.name == registry.current_instance { "*" } else { "" };
            vec![
                i.name.clone(),
                i.provider.to_string(),
                i.api_server.clone(),
                current.to_string(),
            ]
        })
        .collect()
}

/// Print rows as a column-aligned table with headers
fn print_table(headers: &[&str], rows: &[Vec<String>]) {
    for line in table_lines(headers, rows) {
        println!("{}", line);
    }
}

fn table_lines(headers: &[&str], rows: &[Vec<String>]) -> Vec<String> {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate().take(widths.len()) {
            widths[i] = widths[i].max(cell.len());
        }
    }

    let render = |cells: Vec<&str>| {
        cells
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{:<width$}", c, width = widths[i]))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut lines = vec![render(headers.to_vec())];
    lines.extend(
        rows.iter()
            .map(|row| render(row.iter().map(String::as_str).collect())),
    );
    lines
}
