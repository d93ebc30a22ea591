//! Shared Kubernetes utilities using kube-rs
//!
//! Provides the kubectl-equivalent operations the lifecycle needs (apply,
//! load balancer teardown, endpoint lookup) without shelling out to kubectl.

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use k8s_openapi::api::core::v1::Service;
use kube::api::{Api, DeleteParams, DynamicObject, ListParams, Patch, PatchParams};
use kube::config::KubeConfigOptions;
use kube::core::GroupVersionKind;
use kube::discovery::{self, ApiResource, Scope};
use kube::{Client, Config};
use tracing::{debug, info, trace};

use crate::{Error, Result};

/// Default interval between polling attempts
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Field manager used for server-side apply
pub const FIELD_MANAGER: &str = "tptctl";

/// Poll until a condition is met or timeout is reached
///
/// `check_fn` returns `Ok(true)` when the condition is met and `Ok(false)` to
/// keep polling. Errors are treated as "not yet" since the API server may
/// still be coming up.
pub async fn poll_until<F, Fut>(
    timeout: Duration,
    poll_interval: Duration,
    timeout_msg: impl Into<String>,
    mut check_fn: F,
) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    poll_for(timeout, poll_interval, timeout_msg, || {
        let check = check_fn();
        async move { check.await.map(|met| met.then_some(())) }
    })
    .await
}

/// Poll until `check_fn` yields a value or timeout is reached
///
/// Like [`poll_until`], but the check returns `Ok(Some(value))` once ready.
pub async fn poll_for<T, F, Fut>(
    timeout: Duration,
    poll_interval: Duration,
    timeout_msg: impl Into<String>,
    mut check_fn: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let start = std::time::Instant::now();
    let timeout_msg = timeout_msg.into();

    loop {
        if start.elapsed() > timeout {
            return Err(Error::timeout(timeout_msg));
        }

        match check_fn().await {
            Ok(Some(value)) => return Ok(value),
            Ok(None) => trace!("Polling condition not yet met, retrying..."),
            Err(e) => trace!("Polling check returned error (retrying): {}", e),
        }

        tokio::time::sleep(poll_interval).await;
    }
}

/// Create a kube client from a kubeconfig file using its current context
pub async fn create_client(kubeconfig: &Path) -> Result<Client> {
    let kubeconfig_doc = kube::config::Kubeconfig::read_from(kubeconfig).map_err(|e| {
        Error::kubeconfig(format!(
            "failed to read kubeconfig {}: {}",
            kubeconfig.display(),
            e
        ))
    })?;
    let config = Config::from_custom_kubeconfig(kubeconfig_doc, &KubeConfigOptions::default())
        .await
        .map_err(|e| Error::kubeconfig(format!("failed to load kubeconfig: {}", e)))?;
    Client::try_from(config).map_err(Error::from)
}

/// A single parsed manifest document
#[derive(Debug, Clone)]
pub struct ManifestMetadata {
    /// The full manifest as JSON
    pub value: serde_json::Value,
    /// Group/version/kind
    pub gvk: GroupVersionKind,
    /// metadata.name
    pub name: String,
    /// metadata.namespace, if set
    pub namespace: Option<String>,
}

/// Parse a YAML manifest document and extract its identity
pub fn parse_manifest(manifest: &str) -> Result<ManifestMetadata> {
    let value: serde_json::Value = serde_yaml::from_str(manifest)?;

    let api_version = value
        .get("apiVersion")
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::validation("manifest missing apiVersion"))?;
    let kind = value
        .get("kind")
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::validation("manifest missing kind"))?;
    let name = value
        .pointer("/metadata/name")
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::validation(format!("{} manifest missing metadata.name", kind)))?
        .to_string();
    let namespace = value
        .pointer("/metadata/namespace")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());

    let (group, version) = parse_api_version(api_version);
    let gvk = GroupVersionKind::gvk(&group, &version, kind);

    Ok(ManifestMetadata {
        value,
        gvk,
        name,
        namespace,
    })
}

/// Parse apiVersion into (group, version)
///
/// # Examples
/// ```
/// use threeport_common::kube_utils::parse_api_version;
///
/// assert_eq!(parse_api_version("apps/v1"), ("apps".to_string(), "v1".to_string()));
/// assert_eq!(parse_api_version("v1"), (String::new(), "v1".to_string()));
/// ```
pub fn parse_api_version(api_version: &str) -> (String, String) {
    match api_version.split_once('/') {
        Some((group, version)) => (group.to_string(), version.to_string()),
        None => (String::new(), api_version.to_string()),
    }
}

/// Split a multi-document YAML string into its non-empty documents
pub fn split_documents(manifests: &str) -> Vec<&str> {
    manifests
        .split("\n---")
        .map(|doc| doc.trim().trim_start_matches("---").trim())
        .filter(|doc| doc.contains("apiVersion"))
        .collect()
}

/// Apply a single manifest using server-side apply
///
/// The resource type is resolved through discovery so that CRD-backed kinds
/// and cluster-scoped kinds are handled the same way as built-ins.
pub async fn apply_manifest(client: &Client, manifest: &str) -> Result<()> {
    let metadata = parse_manifest(manifest)?;
    let (resource, caps) = discovery::pinned_kind(client, &metadata.gvk).await?;
    let api = dynamic_api(client, &resource, caps.scope, metadata.namespace.as_deref());

    let params = PatchParams::apply(FIELD_MANAGER).force();
    api.patch(&metadata.name, &params, &Patch::Apply(&metadata.value))
        .await?;
    debug!(kind = %metadata.gvk.kind, name = %metadata.name, "applied manifest");
    Ok(())
}

fn dynamic_api(
    client: &Client,
    resource: &ApiResource,
    scope: Scope,
    namespace: Option<&str>,
) -> Api<DynamicObject> {
    match scope {
        Scope::Namespaced => {
            Api::namespaced_with(client.clone(), namespace.unwrap_or("default"), resource)
        }
        Scope::Cluster => Api::all_with(client.clone(), resource),
    }
}

/// Apply a multi-document YAML manifest (documents separated by ---)
pub async fn apply_manifests(client: &Client, manifests: &str) -> Result<()> {
    for doc in split_documents(manifests) {
        apply_manifest(client, doc).await?;
    }
    Ok(())
}

/// Delete every LoadBalancer Service in `namespace`, returning their names
pub async fn delete_load_balancer_services(client: &Client, namespace: &str) -> Result<Vec<String>> {
    let services: Api<Service> = Api::namespaced(client.clone(), namespace);
    let list = match services.list(&ListParams::default()).await {
        Ok(list) => list,
        Err(kube::Error::Api(e)) if e.code == 404 => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut deleted = Vec::new();
    for svc in list.items.iter().filter(|s| is_load_balancer(s)) {
        let Some(name) = svc.metadata.name.as_deref() else {
            continue;
        };
        info!(namespace = %namespace, service = %name, "Deleting LoadBalancer service");
        match services.delete(name, &DeleteParams::default()).await {
            Ok(_) => deleted.push(name.to_string()),
            Err(kube::Error::Api(e)) if e.code == 404 => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(deleted)
}

/// Wait until none of `names` exist in `namespace`
pub async fn wait_for_services_deleted(
    client: &Client,
    namespace: &str,
    names: &[String],
    timeout: Duration,
) -> Result<()> {
    let services: Api<Service> = Api::namespaced(client.clone(), namespace);
    poll_until(
        timeout,
        DEFAULT_POLL_INTERVAL,
        format!("timeout waiting for load balancers in {} to be released", namespace),
        || {
            let services = services.clone();
            async move {
                for name in names {
                    if services.get_opt(name).await?.is_some() {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
        },
    )
    .await
}

/// Hostname (or IP) assigned to a LoadBalancer Service, if provisioned yet
pub async fn load_balancer_host(client: &Client, namespace: &str, name: &str) -> Result<Option<String>> {
    let services: Api<Service> = Api::namespaced(client.clone(), namespace);
    let Some(svc) = services.get_opt(name).await? else {
        return Ok(None);
    };
    Ok(svc
        .status
        .and_then(|s| s.load_balancer)
        .and_then(|lb| lb.ingress)
        .and_then(|ingress| ingress.into_iter().next())
        .and_then(|i| i.hostname.or(i.ip)))
}

fn is_load_balancer(svc: &Service) -> bool {
    svc.spec
        .as_ref()
        .and_then(|s| s.type_.as_deref())
        .is_some_and(|t| t == "LoadBalancer")
}
