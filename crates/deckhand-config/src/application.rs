//! Application description parsing.

use crate::nodes::{
    get_all_string_args, get_bool_prop, get_first_int_arg, get_first_string_arg, get_int_prop,
    get_string_prop, narrow, require_string_prop,
};
use crate::variables::{environment_from, references};
use crate::{ConfigError, ConfigResult};
use deckhand_core::{Application, DeploymentConfig, Domain, HealthCheck, ScalerSpec, Toggle};
use kdl::{KdlDocument, KdlNode};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tracing::warn;

/// Read and parse an application description from a file.
pub fn load_application(path: impl AsRef<Path>) -> ConfigResult<Application> {
    let text = std::fs::read_to_string(path)?;
    parse_application(&text)
}

/// Parse an application description from KDL text.
pub fn parse_application(kdl: &str) -> ConfigResult<Application> {
    let doc: KdlDocument = kdl.parse()?;

    let node = doc
        .nodes()
        .iter()
        .find(|n| n.name().value() == "application")
        .ok_or_else(|| ConfigError::MissingField("application".to_string()))?;

    let name = get_first_string_arg(node)
        .ok_or_else(|| ConfigError::MissingField("application name".to_string()))?;

    let mut application = Application::new(&name);
    application.namespace = get_string_prop(node, "namespace");
    application.cicd = Toggle::from(get_bool_prop(node, "cicd"));

    let mut deployment_names = HashSet::new();
    let mut env_values = BTreeMap::new();

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "service" => {
                    let service = get_first_string_arg(child)
                        .ok_or_else(|| ConfigError::MissingField("service name".to_string()))?;
                    if application.services.contains(&service) {
                        return Err(ConfigError::Duplicate(format!("service '{}'", service)));
                    }
                    application.services.push(service);
                }
                "env" => {
                    if let Some(vars) = child.children() {
                        for var in vars.nodes() {
                            let key = var.name().value().to_string();
                            if let Some(val) = get_first_string_arg(var) {
                                env_values.insert(key, val);
                            }
                        }
                    }
                }
                "deployment" => {
                    let deployment = parse_deployment(child)?;
                    let effective = deployment.name.clone().unwrap_or_else(|| name.clone());
                    if !deployment_names.insert(effective.clone()) {
                        return Err(ConfigError::Duplicate(format!("deployment '{}'", effective)));
                    }
                    application.deployments.push(deployment);
                }
                _ => {} // Ignore unknown nodes
            }
        }
    }

    for value in env_values.values() {
        for reference in references(value) {
            if !application.services.contains(&reference.service) {
                warn!(
                    application = %name,
                    service = %reference.service,
                    "Environment references an undeclared service"
                );
            }
        }
    }

    if !env_values.is_empty() {
        application.environment = Some(environment_from(env_values));
    }

    Ok(application)
}

fn parse_deployment(node: &KdlNode) -> ConfigResult<DeploymentConfig> {
    let mut config = DeploymentConfig {
        name: get_first_string_arg(node),
        ..DeploymentConfig::default()
    };
    let label = config.name.clone().unwrap_or_else(|| "<unnamed>".to_string());

    let mut image = None;

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "image" => image = get_first_string_arg(child),
                "tag" => {
                    if let Some(tag) = get_first_string_arg(child) {
                        config.tag = tag;
                    }
                }
                "port" => {
                    let port = get_first_int_arg(child).ok_or_else(|| {
                        ConfigError::MissingField(format!("deployment '{}' port", label))
                    })?;
                    config.container_port = Some(narrow(port, "port")?);
                }
                "domain" => {
                    config.domains.push(Domain {
                        zone: require_string_prop(child, "zone", "domain zone")?,
                        subdomain: require_string_prop(child, "subdomain", "domain subdomain")?,
                    });
                }
                "health-check" => config.health_check = Some(parse_health_check(child)?),
                "annotation" => {
                    let args = get_all_string_args(child);
                    let [key, value] = args.as_slice() else {
                        return Err(ConfigError::InvalidValue {
                            field: "annotation".to_string(),
                            message: "expected a key and a value".to_string(),
                        });
                    };
                    config.annotations.insert(key.clone(), value.clone());
                }
                "scaler" => config.scaler = Some(parse_scaler(child)?),
                "secrets" => config.secrets = get_first_string_arg(child),
                "container-override" => {
                    config.container_override = Some(parse_override(child, "container-override")?);
                }
                "deployment-override" => {
                    config.deployment_override =
                        Some(parse_override(child, "deployment-override")?);
                }
                _ => {} // Ignore unknown nodes
            }
        }
    }

    config.image = image
        .ok_or_else(|| ConfigError::MissingField(format!("deployment '{}' image", label)))?;

    Ok(config)
}

fn parse_health_check(node: &KdlNode) -> ConfigResult<HealthCheck> {
    let path = get_first_string_arg(node)
        .ok_or_else(|| ConfigError::MissingField("health-check path".to_string()))?;

    let seconds = |name: &str| -> ConfigResult<Option<u32>> {
        get_int_prop(node, name)
            .map(|v| narrow(v, &format!("health-check {}", name)))
            .transpose()
    };

    Ok(HealthCheck {
        path,
        initial_delay_seconds: seconds("initial-delay")?,
        period_seconds: seconds("period")?,
        timeout_seconds: seconds("timeout")?,
        failure_threshold: seconds("failure-threshold")?,
    })
}

fn parse_scaler(node: &KdlNode) -> ConfigResult<ScalerSpec> {
    let required = |name: &str| -> ConfigResult<u32> {
        let value = get_int_prop(node, name)
            .ok_or_else(|| ConfigError::MissingField(format!("scaler {}", name)))?;
        narrow(value, &format!("scaler {}", name))
    };

    Ok(ScalerSpec {
        min_replicas: required("min")?,
        max_replicas: required("max")?,
        target_cpu_utilization: required("cpu")?,
    })
}

fn parse_override(node: &KdlNode, field: &str) -> ConfigResult<Value> {
    let text = get_first_string_arg(node)
        .ok_or_else(|| ConfigError::MissingField(field.to_string()))?;
    let value: Value = serde_json::from_str(&text).map_err(|source| ConfigError::InvalidJson {
        field: field.to_string(),
        source,
    })?;
    if !value.is_object() {
        return Err(ConfigError::InvalidValue {
            field: field.to_string(),
            message: "expected a JSON object".to_string(),
        });
    }
    Ok(value)
}
