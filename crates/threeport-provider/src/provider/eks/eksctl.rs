//! [`ResourceStackClient`] driving the `eksctl` and `aws` CLIs
//!
//! eksctl provisions everything as CloudFormation stacks named
//! `eksctl-<cluster>-*`, so the inventory is the list of those stacks in
//! creation order and deletion walks it backwards.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

use threeport_common::{Error, Result};

use super::{ResourceStackClient, StackConfig};
use crate::inventory::ResourceInventory;
use crate::progress::{report, ProgressSender};

/// Inventory kind for a CloudFormation stack
pub const CLOUDFORMATION_STACK: &str = "CloudFormationStack";

/// Stack client shelling out to `eksctl` and `aws`
#[derive(Clone, Copy, Debug, Default)]
pub struct EksctlStackClient;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeStacksOutput {
    #[serde(default)]
    stacks: Vec<StackSummary>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StackSummary {
    stack_name: String,
    creation_time: String,
    #[serde(default)]
    tags: Vec<StackTag>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StackTag {
    key: String,
    value: String,
}

/// Tag eksctl puts on every stack it creates
const CLUSTER_NAME_TAG: &str = "alpha.eksctl.io/cluster-name";

impl StackSummary {
    fn belongs_to(&self, cluster_name: &str) -> bool {
        if let Some(tag) = self.tags.iter().find(|t| t.key == CLUSTER_NAME_TAG) {
            return tag.value == cluster_name;
        }
        // Untagged: fall back to eksctl's naming scheme
        let prefix = format!("eksctl-{}-", cluster_name);
        self.stack_name.strip_prefix(&prefix).is_some_and(|rest| {
            rest == "cluster" || rest.starts_with("nodegroup-") || rest.starts_with("addon-")
        })
    }
}

/// Arguments for `eksctl create cluster`
fn create_cluster_args(config: &StackConfig) -> Vec<String> {
    let tags = config
        .tags
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(",");
    vec![
        "create".to_string(),
        "cluster".to_string(),
        "--name".to_string(),
        config.name.clone(),
        "--region".to_string(),
        config.region.clone(),
        "--instance-types".to_string(),
        config.instance_types.join(","),
        "--tags".to_string(),
        tags,
        "--write-kubeconfig=false".to_string(),
    ]
}

/// Names of the stacks belonging to `cluster_name`, oldest first
fn cluster_stacks(describe_output: &[u8], cluster_name: &str) -> Result<Vec<String>> {
    let output: DescribeStacksOutput = serde_json::from_slice(describe_output)?;
    let mut stacks: Vec<StackSummary> = output
        .stacks
        .into_iter()
        .filter(|s| s.belongs_to(cluster_name))
        .collect();
    // ISO 8601 timestamps order lexically
    stacks.sort_by(|a, b| a.creation_time.cmp(&b.creation_time));
    Ok(stacks.into_iter().map(|s| s.stack_name).collect())
}

async fn run(program: &str, args: &[&str]) -> Result<Vec<u8>> {
    debug!(program, args = ?args, "running command");
    let output = Command::new(program)
        .args(args)
        .output()
        .await
        .map_err(|e| Error::engine(program, format!("failed to run {}: {}", program, e)))?;
    if !output.status.success() {
        return Err(Error::engine(
            program,
            format!(
                "{} {} failed: {}",
                program,
                args.first().copied().unwrap_or_default(),
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        ));
    }
    Ok(output.stdout)
}

async fn forward_lines<R: AsyncRead + Unpin>(reader: R, progress: &ProgressSender) {
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim();
        if !line.is_empty() {
            report(progress, line).await;
        }
    }
}

impl EksctlStackClient {
    async fn run_eksctl(&self, config: &StackConfig, progress: &ProgressSender) -> Result<()> {
        let mut child = Command::new("eksctl")
            .args(create_cluster_args(config))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::engine("eksctl", format!("failed to run eksctl: {}", e)))?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        tokio::join!(
            async {
                if let Some(out) = stdout {
                    forward_lines(out, progress).await;
                }
            },
            async {
                if let Some(err) = stderr {
                    forward_lines(err, progress).await;
                }
            },
        );

        let status = child.wait().await?;
        if !status.success() {
            return Err(Error::engine(
                "eksctl",
                format!("eksctl create cluster exited with {}", status),
            ));
        }
        Ok(())
    }

    async fn discover(&self, config: &StackConfig) -> Result<Vec<String>> {
        let output = run(
            "aws",
            &[
                "cloudformation",
                "describe-stacks",
                "--region",
                &config.region,
                "--output",
                "json",
            ],
        )
        .await?;
        cluster_stacks(&output, &config.name)
    }
}

#[async_trait]
impl ResourceStackClient for EksctlStackClient {
    async fn create_stack(
        &self,
        config: &StackConfig,
        progress: ProgressSender,
    ) -> (ResourceInventory, Result<()>) {
        let created = self.run_eksctl(config, &progress).await;

        let mut inventory = ResourceInventory::new(&config.name, &config.region);
        match self.discover(config).await {
            Ok(stacks) => {
                for stack in stacks {
                    inventory.record(CLOUDFORMATION_STACK, stack);
                }
            }
            Err(e) => {
                // The cluster stack is always created first; recording it keeps
                // the control plane deletable even if listing failed
                warn!(error = %e, "failed to list CloudFormation stacks for inventory");
                inventory.record(CLOUDFORMATION_STACK, format!("eksctl-{}-cluster", config.name));
            }
        }
        (inventory, created)
    }

    async fn delete_stack(&self, inventory: &ResourceInventory, progress: ProgressSender) -> Result<()> {
        let region = inventory.region.as_str();
        for resource in inventory.resources.iter().rev() {
            if resource.kind != CLOUDFORMATION_STACK {
                warn!(kind = %resource.kind, id = %resource.id, "skipping unknown resource kind");
                continue;
            }
            let stack = resource.id.as_str();
            report(&progress, format!("deleting CloudFormation stack {}", stack)).await;
            run(
                "aws",
                &["cloudformation", "delete-stack", "--region", region, "--stack-name", stack],
            )
            .await?;
            run(
                "aws",
                &[
                    "cloudformation",
                    "wait",
                    "stack-delete-complete",
                    "--region",
                    region,
                    "--stack-name",
                    stack,
                ],
            )
            .await?;
            report(&progress, format!("CloudFormation stack {} deleted", stack)).await;
        }
        Ok(())
    }

    async fn update_kubeconfig(&self, cluster_name: &str, region: &str, kubeconfig: &Path) -> Result<()> {
        let kubeconfig = kubeconfig
            .to_str()
            .ok_or_else(|| Error::validation("kubeconfig path contains invalid UTF-8"))?;
        run(
            "aws",
            &[
                "eks",
                "update-kubeconfig",
                "--name",
                cluster_name,
                "--region",
                region,
                "--kubeconfig",
                kubeconfig,
            ],
        )
        .await?;
        Ok(())
    }
}
