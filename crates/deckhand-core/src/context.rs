//! Platform context and service constructor contracts.
//!
//! The platform context is supplied once by the caller and read by every
//! composition step. Exposure and CI/CD identity are optional capabilities:
//! a platform that lacks them returns `None` from the accessor.

use derive_more::Display;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::Result;
use crate::application::{DeploymentConfig, Domain, HealthCheck};
use crate::cluster::Cluster;
use crate::deferred::Deferred;
use crate::resource::ResourceRef;

/// Storage tier requested from the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
pub enum StorageTier {
    #[display("fast")]
    Fast,
    #[display("cheap")]
    Cheap,
}

/// Identity the CI/CD system deploys with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Display)]
#[display("{namespace}/{name}")]
pub struct ServiceAccountRef {
    pub name: String,
    pub namespace: String,
}

/// Ingress settings forwarded to the platform when exposure is requested.
#[derive(Debug, Clone, Default)]
pub struct IngressSpec {
    pub domains: Vec<Domain>,
    pub health_check: Option<HealthCheck>,
    pub annotations: BTreeMap<String, String>,
}

/// Arguments passed to [`ServiceExposer::expose_service`].
#[derive(Debug, Clone)]
pub struct ExposedServiceArgs {
    /// The deployment configuration as composed.
    pub config: DeploymentConfig,
    pub namespace: String,
    pub name: String,
    pub container_port: u16,
    pub ingress: IngressSpec,
    /// Workload the exposure resources depend on.
    pub workload: ResourceRef,
}

/// Whatever the platform reports after exposing a deployment.
#[derive(Debug, Clone)]
pub struct ExposedService {
    pub details: Value,
    pub resources: Vec<ResourceRef>,
}

/// Makes deployments reachable (ingress, load balancer, ...).
pub trait ServiceExposer: Send + Sync {
    fn expose_service(&self, cluster: &Cluster, args: ExposedServiceArgs)
    -> Result<ExposedService>;
}

/// Supplies the identity CI/CD deploys with.
pub trait CicdProvider: Send + Sync {
    /// `None` when the platform offers no deploy identity for `cluster`.
    fn deploy_service_account(
        &self,
        cluster: &Cluster,
    ) -> Result<Option<Deferred<ServiceAccountRef>>>;
}

/// Platform callbacks consulted during composition.
pub trait PlatformContext: Send + Sync {
    /// Storage class name to use for the given tier.
    fn storage_class(&self, cluster: &Cluster, tier: StorageTier) -> Result<String>;

    fn service_exposer(&self) -> Option<&dyn ServiceExposer> {
        None
    }

    fn cicd(&self) -> Option<&dyn CicdProvider> {
        None
    }
}

/// Result of a service constructor: named outputs plus what it emitted.
#[derive(Debug, Clone, Default)]
pub struct ServiceResult {
    pub outputs: BTreeMap<String, Deferred<String>>,
    pub resources: Vec<ResourceRef>,
}

impl ServiceResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_output(mut self, name: impl Into<String>, value: Deferred<String>) -> Self {
        self.outputs.insert(name.into(), value);
        self
    }

    pub fn with_resource(mut self, resource: ResourceRef) -> Self {
        self.resources.push(resource);
        self
    }

    pub fn output(&self, name: &str) -> Option<&Deferred<String>> {
        self.outputs.get(name)
    }
}

/// Everything a service constructor may use.
#[derive(Debug, Clone, Copy)]
pub struct ServiceContext<'a> {
    pub application_name: &'a str,
    pub namespace: &'a str,
    pub cluster: &'a Cluster,
    pub context: &'a FactoryContext,
}

/// Creates the resources of one named service.
pub trait ServiceConstructor: Send + Sync {
    fn construct(&self, ctx: &ServiceContext<'_>) -> Result<ServiceResult>;
}

impl<F> ServiceConstructor for F
where
    F: Fn(&ServiceContext<'_>) -> Result<ServiceResult> + Send + Sync,
{
    fn construct(&self, ctx: &ServiceContext<'_>) -> Result<ServiceResult> {
        self(ctx)
    }
}

pub type ServiceMap = BTreeMap<String, Arc<dyn ServiceConstructor>>;

/// Platform callbacks plus the service constructors available to applications.
#[derive(Clone)]
pub struct FactoryContext {
    pub platform: Arc<dyn PlatformContext>,
    pub services: ServiceMap,
}

impl FactoryContext {
    pub fn new(platform: Arc<dyn PlatformContext>, services: ServiceMap) -> Self {
        Self { platform, services }
    }

    pub fn service(&self, name: &str) -> Option<&Arc<dyn ServiceConstructor>> {
        self.services.get(name)
    }
}

impl fmt::Debug for FactoryContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactoryContext")
            .field("services", &self.services.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}
