//! Application and deployment descriptions.
//!
//! An Application is the high-level unit a caller composes: a namespace, the
//! named services it needs, its environment and its container deployments.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::context::ServiceResult;
use crate::deferred::Deferred;

/// Environment variable name to (possibly deferred) value.
pub type EnvMap = BTreeMap<String, Deferred<String>>;

/// Service name to the result of its constructor.
pub type ResolvedServices = BTreeMap<String, ServiceResult>;

type DeriveEnv = dyn Fn(&ResolvedServices) -> EnvMap + Send + Sync;

/// Environment of an application.
#[derive(Clone)]
pub enum Environment {
    /// A fixed mapping.
    Static(EnvMap),
    /// Computed from the resolved services once all of them are constructed.
    Derived(Arc<DeriveEnv>),
}

impl Environment {
    pub fn derived<F>(f: F) -> Self
    where
        F: Fn(&ResolvedServices) -> EnvMap + Send + Sync + 'static,
    {
        Self::Derived(Arc::new(f))
    }

    pub fn evaluate(&self, services: &ResolvedServices) -> EnvMap {
        match self {
            Environment::Static(env) => env.clone(),
            Environment::Derived(derive) => derive(services),
        }
    }
}

impl From<EnvMap> for Environment {
    fn from(env: EnvMap) -> Self {
        Self::Static(env)
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Static(env) => f.debug_tuple("Static").field(&env.keys()).finish(),
            Environment::Derived(_) => f.write_str("Derived(..)"),
        }
    }
}

/// Optional flag that distinguishes "not said" from an explicit `false`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Toggle {
    #[default]
    Unset,
    Off,
    On,
}

impl Toggle {
    pub fn is_off(self) -> bool {
        self == Toggle::Off
    }
}

impl From<Option<bool>> for Toggle {
    fn from(flag: Option<bool>) -> Self {
        match flag {
            None => Toggle::Unset,
            Some(false) => Toggle::Off,
            Some(true) => Toggle::On,
        }
    }
}

impl fmt::Display for Toggle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Toggle::Unset => write!(f, "unset"),
            Toggle::Off => write!(f, "off"),
            Toggle::On => write!(f, "on"),
        }
    }
}

/// A DNS name a deployment should be reachable under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    pub zone: String,
    pub subdomain: String,
}

impl Domain {
    pub fn new(zone: impl Into<String>, subdomain: impl Into<String>) -> Self {
        Self {
            zone: zone.into(),
            subdomain: subdomain.into(),
        }
    }

    /// Fully qualified host name.
    pub fn host(&self) -> String {
        if self.subdomain.is_empty() {
            self.zone.clone()
        } else {
            format!("{}.{}", self.subdomain, self.zone)
        }
    }
}

/// HTTP health check used for liveness and readiness.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheck {
    pub path: String,
    pub initial_delay_seconds: Option<u32>,
    pub period_seconds: Option<u32>,
    pub timeout_seconds: Option<u32>,
    pub failure_threshold: Option<u32>,
}

impl HealthCheck {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            initial_delay_seconds: None,
            period_seconds: None,
            timeout_seconds: None,
            failure_threshold: None,
        }
    }
}

/// CPU based horizontal scaling bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScalerSpec {
    pub min_replicas: u32,
    pub max_replicas: u32,
    /// Target average CPU utilization in percent.
    pub target_cpu_utilization: u32,
}

/// One container deployment of an application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DeploymentConfig {
    /// Defaults to the application name.
    pub name: Option<String>,
    pub image: String,
    pub tag: String,
    pub container_port: Option<u16>,
    /// Deep-merged over the generated container.
    pub container_override: Option<Value>,
    /// Deep-merged over the generated deployment.
    pub deployment_override: Option<Value>,
    /// Non-empty when the deployment must be exposed.
    pub domains: Vec<Domain>,
    pub health_check: Option<HealthCheck>,
    pub annotations: BTreeMap<String, String>,
    pub scaler: Option<ScalerSpec>,
    /// Name of the secret bundle injected into the container environment.
    pub secrets: Option<String>,
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            name: None,
            image: String::new(),
            tag: "latest".to_string(),
            container_port: None,
            container_override: None,
            deployment_override: None,
            domains: Vec::new(),
            health_check: None,
            annotations: BTreeMap::new(),
            scaler: None,
            secrets: None,
        }
    }
}

impl DeploymentConfig {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.container_port = Some(port);
        self
    }

    pub fn with_domain(mut self, domain: Domain) -> Self {
        self.domains.push(domain);
        self
    }

    pub fn with_health_check(mut self, health_check: HealthCheck) -> Self {
        self.health_check = Some(health_check);
        self
    }

    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    pub fn with_scaler(mut self, scaler: ScalerSpec) -> Self {
        self.scaler = Some(scaler);
        self
    }

    pub fn with_secrets(mut self, secrets: impl Into<String>) -> Self {
        self.secrets = Some(secrets.into());
        self
    }

    pub fn with_container_override(mut self, overrides: Value) -> Self {
        self.container_override = Some(overrides);
        self
    }

    pub fn with_deployment_override(mut self, overrides: Value) -> Self {
        self.deployment_override = Some(overrides);
        self
    }

    /// Full image reference, `image:tag`.
    pub fn image_ref(&self) -> String {
        format!("{}:{}", self.image, self.tag)
    }

    pub fn wants_ingress(&self) -> bool {
        !self.domains.is_empty()
    }
}

/// Top-level description composed into a resource graph.
#[derive(Debug, Clone)]
pub struct Application {
    pub name: String,
    /// Defaults to the application name.
    pub namespace: Option<String>,
    /// Service names, constructed in this order.
    pub services: Vec<String>,
    pub environment: Option<Environment>,
    pub deployments: Vec<DeploymentConfig>,
    pub cicd: Toggle,
}

impl Application {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            services: Vec::new(),
            environment: None,
            deployments: Vec::new(),
            cicd: Toggle::Unset,
        }
    }

    pub fn namespace(&self) -> &str {
        self.namespace.as_deref().unwrap_or(&self.name)
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Declare a service. Repeating a name keeps the first declaration.
    pub fn with_service(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.services.contains(&name) {
            self.services.push(name);
        }
        self
    }

    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = Some(environment);
        self
    }

    pub fn with_deployment(mut self, deployment: DeploymentConfig) -> Self {
        self.deployments.push(deployment);
        self
    }

    pub fn with_cicd(mut self, cicd: Toggle) -> Self {
        self.cicd = cicd;
        self
    }
}
