//! Kubeconfig model and credential extraction
//!
//! Only the fields needed to pull a client-certificate credential bundle out of
//! a kubeconfig are modelled; everything else in the document is ignored.
//! Extraction fails closed: if the current context has no matching cluster or
//! user entry, or a matching entry lacks embedded certificate data, no bundle
//! is produced.

use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Kubeconfig document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Kubeconfig {
    /// Clusters
    #[serde(default)]
    pub clusters: Vec<NamedCluster>,
    /// Users
    #[serde(default)]
    pub users: Vec<NamedUser>,
    /// Contexts
    #[serde(default)]
    pub contexts: Vec<NamedContext>,
    /// Current context
    #[serde(default)]
    pub current_context: String,
}

/// Cluster entry in kubeconfig
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedCluster {
    /// Cluster name
    pub name: String,
    /// Cluster config
    #[serde(default)]
    pub cluster: ClusterConfig,
}

/// Cluster configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ClusterConfig {
    /// API server URL
    #[serde(default)]
    pub server: String,
    /// CA certificate (base64 encoded PEM)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_authority_data: Option<String>,
}

/// User entry in kubeconfig
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedUser {
    /// User name
    pub name: String,
    /// User config
    #[serde(default)]
    pub user: UserConfig,
}

/// User configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct UserConfig {
    /// Client certificate (base64 encoded PEM)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_certificate_data: Option<String>,
    /// Client key (base64 encoded PEM)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_key_data: Option<String>,
}

/// Context entry in kubeconfig
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedContext {
    /// Context name
    pub name: String,
    /// Context config
    #[serde(default)]
    pub context: ContextConfig,
}

/// Context configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Cluster entry this context points at
    #[serde(default)]
    pub cluster: String,
    /// User entry this context points at
    #[serde(default)]
    pub user: String,
}

impl Kubeconfig {
    /// Parse a kubeconfig from YAML text
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| Error::kubeconfig(format!("failed to parse kubeconfig: {}", e)))
    }

    /// Read and parse a kubeconfig file
    pub fn read_from(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path).map_err(|e| {
            Error::kubeconfig(format!("failed to read kubeconfig {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&data)
    }
}

/// Client-certificate credentials for one cluster
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialBundle {
    /// Cluster CA certificate (PEM bytes)
    pub ca_certificate: Vec<u8>,
    /// Client certificate (PEM bytes)
    pub client_certificate: Vec<u8>,
    /// Client private key (PEM bytes)
    pub client_key: Vec<u8>,
}

impl std::fmt::Debug for CredentialBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialBundle")
            .field("ca_certificate", &format_args!("{} bytes", self.ca_certificate.len()))
            .field(
                "client_certificate",
                &format_args!("{} bytes", self.client_certificate.len()),
            )
            .field("client_key", &"<redacted>")
            .finish()
    }
}

impl CredentialBundle {
    /// CA certificate as PEM text
    pub fn ca_certificate_pem(&self) -> Result<String> {
        pem_text(&self.ca_certificate, "certificate-authority-data")
    }

    /// Client certificate as PEM text
    pub fn client_certificate_pem(&self) -> Result<String> {
        pem_text(&self.client_certificate, "client-certificate-data")
    }

    /// Client key as PEM text
    pub fn client_key_pem(&self) -> Result<String> {
        pem_text(&self.client_key, "client-key-data")
    }
}

fn pem_text(bytes: &[u8], field: &str) -> Result<String> {
    String::from_utf8(bytes.to_vec())
        .map_err(|_| Error::kubeconfig(format!("{} is not valid PEM text", field)))
}

/// Extract the credential bundle for the kubeconfig's current context.
///
/// The cluster and user entries are matched by name against the current
/// context, which is how kind and the cloud CLI name all three entries.
pub fn extract_credentials(kubeconfig: &Kubeconfig) -> Result<CredentialBundle> {
    let context = kubeconfig.current_context.as_str();
    if context.is_empty() {
        return Err(Error::kubeconfig("kubeconfig has no current-context"));
    }

    let cluster = kubeconfig
        .clusters
        .iter()
        .find(|c| c.name == context)
        .ok_or_else(|| Error::ClusterNotFound {
            context: context.to_string(),
        })?;
    let ca_certificate = decode_field(
        cluster.cluster.certificate_authority_data.as_deref(),
        "cluster",
        context,
        "certificate-authority-data",
    )?;

    let user = kubeconfig
        .users
        .iter()
        .find(|u| u.name == context)
        .ok_or_else(|| Error::UserCredentialsNotFound {
            context: context.to_string(),
        })?;
    let client_certificate = decode_field(
        user.user.client_certificate_data.as_deref(),
        "user",
        context,
        "client-certificate-data",
    )?;
    let client_key = decode_field(
        user.user.client_key_data.as_deref(),
        "user",
        context,
        "client-key-data",
    )?;

    Ok(CredentialBundle {
        ca_certificate,
        client_certificate,
        client_key,
    })
}

fn decode_field(value: Option<&str>, entry: &str, name: &str, field: &str) -> Result<Vec<u8>> {
    let encoded = value.filter(|v| !v.trim().is_empty()).ok_or_else(|| {
        Error::kubeconfig(format!("{} '{}' has no {}", entry, name, field))
    })?;
    STANDARD
        .decode(encoded.trim())
        .map_err(|e| Error::kubeconfig(format!("{} '{}' has invalid {}: {}", entry, name, field, e)))
}
