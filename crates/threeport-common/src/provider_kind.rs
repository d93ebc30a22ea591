//! Infrastructure provider kinds

use serde::{Deserialize, Serialize};

use crate::Error;

/// Infrastructure substrate an instance's cluster runs on
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Local kind cluster
    #[default]
    #[serde(alias = "kind")]
    Local,
    /// Cloud-managed EKS cluster
    #[serde(alias = "eks")]
    Cloud,
}

impl ProviderKind {
    /// Every supported provider, in display order
    pub const ALL: [ProviderKind; 2] = [ProviderKind::Local, ProviderKind::Cloud];

    /// Returns true if this provider is cloud-managed
    pub fn is_cloud(&self) -> bool {
        matches!(self, Self::Cloud)
    }

    /// Name of the engine behind this provider, as reported to the threeport API
    pub fn engine_name(&self) -> &'static str {
        match self {
            Self::Local => "kind",
            Self::Cloud => "eks",
        }
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" | "kind" => Ok(Self::Local),
            "cloud" | "eks" => Ok(Self::Cloud),
            _ => Err(Error::validation(format!(
                "infra provider {s} not supported, expected one of: local, cloud"
            ))),
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Cloud => write!(f, "cloud"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_allow_list_and_engine_spellings() {
        assert_eq!("local".parse::<ProviderKind>().unwrap(), ProviderKind::Local);
        assert_eq!("kind".parse::<ProviderKind>().unwrap(), ProviderKind::Local);
        assert_eq!("Cloud".parse::<ProviderKind>().unwrap(), ProviderKind::Cloud);
        assert_eq!("eks".parse::<ProviderKind>().unwrap(), ProviderKind::Cloud);
    }

    #[test]
    fn rejects_anything_else_as_validation_error() {
        for bad in ["", "gcp", "docker", "local ", "k8s"] {
            let err = bad.parse::<ProviderKind>().unwrap_err();
            assert!(
                matches!(err, Error::Validation { .. }),
                "expected validation error for {bad:?}"
            );
        }
    }

    #[test]
    fn serializes_lowercase_and_reads_aliases() {
        assert_eq!(serde_json::to_string(&ProviderKind::Cloud).unwrap(), "\"cloud\"");
        let parsed: ProviderKind = serde_json::from_str("\"eks\"").unwrap();
        assert_eq!(parsed, ProviderKind::Cloud);
    }

    #[test]
    fn display_roundtrips_through_from_str() {
        for kind in ProviderKind::ALL {
            assert_eq!(kind.to_string().parse::<ProviderKind>().unwrap(), kind);
        }
    }
}
