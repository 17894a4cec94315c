//! Deployment composition.
//!
//! Builds the container and workload documents from defaults plus caller
//! overrides, emits the workload, then delegates exposure to the platform and
//! scaling to the autoscaler composer.

use deckhand_core::{
    Cluster, DeploymentConfig, Error, ExposedService, ExposedServiceArgs, FactoryContext,
    IngressSpec, ResourceHandle, ResourceKind, ResourceSpec, Result, ServiceExposer, merge,
    merge_into,
};
use k8s_openapi::api::apps::v1::Deployment;
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::scaler::{ComposedScaler, compose_scaler};

/// Name of the container port the probes and services refer to.
pub const HTTP_PORT_NAME: &str = "http";

/// Fields changed by autoscaling and releases after creation.
pub const REPLICAS_POINTER: &str = "/spec/replicas";
pub const IMAGE_POINTER: &str = "/spec/template/spec/containers/0/image";

/// Everything emitted for one deployment.
#[derive(Debug, Clone)]
pub struct ComposedDeployment {
    pub name: String,
    pub container_port: Option<u16>,
    pub workload: ResourceHandle,
    pub exposure: Option<ExposedService>,
    pub scaler: Option<ComposedScaler>,
}

/// Compose one deployment into `namespace`.
///
/// Configuration errors are raised before anything is emitted.
pub fn compose_deployment(
    config: &DeploymentConfig,
    namespace: &str,
    cluster: &Cluster,
    context: &FactoryContext,
) -> Result<ComposedDeployment> {
    let name = config.name.clone().ok_or_else(|| {
        Error::InvalidInput(format!("deployment of image '{}' has no name", config.image))
    })?;

    let exposer = check_exposure(&name, config, context)?;

    let probe = derive_probe(config);
    let container = compose_container(&name, config, probe);
    let body = compose_workload(&name, namespace, config, container)?;

    let workload = cluster.emit(
        ResourceSpec::new(ResourceKind::Deployment, &name)
            .in_namespace(namespace)
            .with_body(body)
            .ignore_changes(REPLICAS_POINTER)
            .ignore_changes(IMAGE_POINTER),
    )?;
    info!(deployment = %name, image = %config.image_ref(), "Composed deployment");

    let exposure = match (exposer, config.container_port) {
        (Some(exposer), Some(container_port)) => {
            let args = ExposedServiceArgs {
                config: config.clone(),
                namespace: namespace.to_string(),
                name: name.clone(),
                container_port,
                ingress: IngressSpec {
                    domains: config.domains.clone(),
                    health_check: config.health_check.clone(),
                    annotations: config.annotations.clone(),
                },
                workload: workload.reference.clone(),
            };
            debug!(deployment = %name, domains = config.domains.len(), "Exposing deployment");
            Some(exposer.expose_service(cluster, args)?)
        }
        _ => None,
    };

    let scaler = config
        .scaler
        .as_ref()
        .map(|spec| compose_scaler(&name, spec, namespace, cluster))
        .transpose()?;

    Ok(ComposedDeployment {
        name,
        container_port: config.container_port,
        workload,
        exposure,
        scaler,
    })
}

/// A deployment with domains needs a container port and a platform that can
/// expose services.
fn check_exposure<'a>(
    name: &str,
    config: &DeploymentConfig,
    context: &'a FactoryContext,
) -> Result<Option<&'a dyn ServiceExposer>> {
    if !config.wants_ingress() {
        return Ok(None);
    }

    if config.container_port.is_none() {
        return Err(Error::MissingContainerPort {
            deployment: name.to_string(),
        });
    }

    context
        .platform
        .service_exposer()
        .map(Some)
        .ok_or_else(|| Error::MissingExposeService {
            deployment: name.to_string(),
        })
}

/// HTTP probe shared by liveness and readiness, when a port and health check exist.
fn derive_probe(config: &DeploymentConfig) -> Option<Value> {
    let (Some(_), Some(check)) = (config.container_port, &config.health_check) else {
        return None;
    };

    let mut probe = json!({
        "httpGet": {
            "path": check.path,
            "port": HTTP_PORT_NAME,
        },
    });
    let timings = [
        ("initialDelaySeconds", check.initial_delay_seconds),
        ("periodSeconds", check.period_seconds),
        ("timeoutSeconds", check.timeout_seconds),
        ("failureThreshold", check.failure_threshold),
    ];
    for (field, value) in timings {
        if let Some(value) = value {
            probe[field] = json!(value);
        }
    }
    Some(probe)
}

fn compose_container(name: &str, config: &DeploymentConfig, probe: Option<Value>) -> Value {
    let mut container = json!({
        "name": name,
        "image": config.image_ref(),
    });

    if let Some(port) = config.container_port {
        container["ports"] = json!([{
            "name": HTTP_PORT_NAME,
            "containerPort": port,
            "protocol": "TCP",
        }]);
    }

    if let Some(secrets) = &config.secrets {
        container["envFrom"] = json!([{ "secretRef": { "name": secrets } }]);
    }

    if let Some(probe) = probe {
        container["livenessProbe"] = probe.clone();
        container["readinessProbe"] = probe;
    }

    match &config.container_override {
        Some(overrides) => merge(&container, overrides),
        None => container,
    }
}

fn compose_workload(
    name: &str,
    namespace: &str,
    config: &DeploymentConfig,
    container: Value,
) -> Result<Value> {
    let labels = json!({ "app": name });
    let mut body = ResourceKind::Deployment.manifest(name, Some(namespace));
    merge_into(
        &mut body,
        json!({
            "metadata": { "labels": labels },
            "spec": {
                "replicas": 1,
                "selector": { "matchLabels": labels },
                "template": {
                    "metadata": { "labels": labels },
                    "spec": { "containers": [container] },
                },
            },
        }),
    );

    if let Some(overrides) = &config.deployment_override {
        merge_into(&mut body, overrides.clone());
    }

    serde_json::from_value::<Deployment>(body.clone()).map_err(|e| {
        Error::InvalidInput(format!(
            "deployment '{}' is not a valid Deployment: {}",
            name, e
        ))
    })?;

    Ok(body)
}
