//! Platform description parsing.

use crate::nodes::{get_first_string_arg, get_string_prop, require_string_prop};
use crate::{ConfigError, ConfigResult};
use kdl::KdlDocument;
use serde::{Deserialize, Serialize};
use std::path::Path;

const DEFAULT_STORAGE_CLASS: &str = "standard";

/// What a target platform offers to composed applications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformConfig {
    pub name: String,
    pub storage: StorageClasses,
    /// Absent when the platform cannot expose services.
    pub ingress: Option<IngressConfig>,
    /// Absent when the platform has no deploy identity.
    pub cicd: Option<CicdConfig>,
}

/// Storage class per storage tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageClasses {
    pub fast: String,
    pub cheap: String,
}

impl Default for StorageClasses {
    fn default() -> Self {
        Self {
            fast: DEFAULT_STORAGE_CLASS.to_string(),
            cheap: DEFAULT_STORAGE_CLASS.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngressConfig {
    pub class: Option<String>,
    /// cert-manager cluster issuer used for TLS.
    pub tls_issuer: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CicdConfig {
    pub service_account: String,
    pub namespace: String,
}

/// Read and parse a platform description from a file.
pub fn load_platform(path: impl AsRef<Path>) -> ConfigResult<PlatformConfig> {
    let text = std::fs::read_to_string(path)?;
    parse_platform(&text)
}

/// Parse a platform description from KDL text.
pub fn parse_platform(kdl: &str) -> ConfigResult<PlatformConfig> {
    let doc: KdlDocument = kdl.parse()?;

    let node = doc
        .nodes()
        .iter()
        .find(|n| n.name().value() == "platform")
        .ok_or_else(|| ConfigError::MissingField("platform".to_string()))?;

    let name = get_first_string_arg(node)
        .ok_or_else(|| ConfigError::MissingField("platform name".to_string()))?;

    let mut storage = StorageClasses::default();
    let mut ingress = None;
    let mut cicd = None;

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "storage-class" => {
                    if let Some(fast) = get_string_prop(child, "fast") {
                        storage.fast = fast;
                    }
                    if let Some(cheap) = get_string_prop(child, "cheap") {
                        storage.cheap = cheap;
                    }
                }
                "ingress" => {
                    ingress = Some(IngressConfig {
                        class: get_string_prop(child, "class"),
                        tls_issuer: get_string_prop(child, "tls-issuer"),
                    });
                }
                "cicd" => {
                    cicd = Some(CicdConfig {
                        service_account: require_string_prop(
                            child,
                            "service-account",
                            "cicd service-account",
                        )?,
                        namespace: require_string_prop(child, "namespace", "cicd namespace")?,
                    });
                }
                _ => {} // Ignore unknown nodes
            }
        }
    }

    Ok(PlatformConfig {
        name,
        storage,
        ingress,
        cicd,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_platform() {
        let kdl = r#"
            platform "gke-prod" {
                storage-class fast="premium-rwo" cheap="standard-rwo"
                ingress class="nginx" tls-issuer="letsencrypt"
                cicd service-account="deployer" namespace="ci"
            }
        "#;

        let platform = parse_platform(kdl).unwrap();
        assert_eq!(platform.name, "gke-prod");
        assert_eq!(platform.storage.fast, "premium-rwo");
        assert_eq!(platform.storage.cheap, "standard-rwo");
        assert_eq!(
            platform.ingress,
            Some(IngressConfig {
                class: Some("nginx".to_string()),
                tls_issuer: Some("letsencrypt".to_string()),
            })
        );
        assert_eq!(
            platform.cicd,
            Some(CicdConfig {
                service_account: "deployer".to_string(),
                namespace: "ci".to_string(),
            })
        );
    }

    #[test]
    fn test_bare_platform_defaults() {
        let platform = parse_platform(r#"platform "local""#).unwrap();
        assert_eq!(platform.storage, StorageClasses::default());
        assert_eq!(platform.storage.fast, "standard");
        assert!(platform.ingress.is_none());
        assert!(platform.cicd.is_none());
    }

    #[test]
    fn test_partial_storage_classes() {
        let platform = parse_platform(
            r#"
            platform "kind" {
                storage-class fast="local-path"
                ingress
            }
            "#,
        )
        .unwrap();
        assert_eq!(platform.storage.fast, "local-path");
        assert_eq!(platform.storage.cheap, "standard");
        assert_eq!(platform.ingress, Some(IngressConfig::default()));
    }

    #[test]
    fn test_cicd_requires_identity() {
        let err = parse_platform(
            r#"
            platform "gke" {
                cicd service-account="deployer"
            }
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(ref f) if f == "cicd namespace"));
    }

    #[test]
    fn test_missing_platform_name() {
        let err = parse_platform("platform").unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(_)));
    }
}
