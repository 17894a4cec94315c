//! Resource specifications handed to the provisioning engine.

use k8s_openapi::Resource;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::autoscaling::v2::HorizontalPodAutoscaler;
use k8s_openapi::api::core::v1::{Namespace, Secret, Service};
use k8s_openapi::api::networking::v1::Ingress;
use k8s_openapi::api::rbac::v1::{Role, RoleBinding};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt;

use crate::deferred::{Deferred, Unresolved};

/// API group for resources owned by the provisioning engine itself.
pub const ENGINE_API_VERSION: &str = "deckhand.dev/v1";

/// Kind of an emitted resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Namespace,
    Secret,
    Deployment,
    HorizontalPodAutoscaler,
    Role,
    RoleBinding,
    Service,
    Ingress,
    /// A Helm chart release.
    HelmRelease,
    /// A password generated by the engine, exposed as the `result` output.
    RandomPassword,
    Custom { api_version: String, kind: String },
}

impl ResourceKind {
    pub fn api_version(&self) -> &str {
        match self {
            ResourceKind::Namespace => Namespace::API_VERSION,
            ResourceKind::Secret => Secret::API_VERSION,
            ResourceKind::Deployment => Deployment::API_VERSION,
            ResourceKind::HorizontalPodAutoscaler => HorizontalPodAutoscaler::API_VERSION,
            ResourceKind::Role => Role::API_VERSION,
            ResourceKind::RoleBinding => RoleBinding::API_VERSION,
            ResourceKind::Service => Service::API_VERSION,
            ResourceKind::Ingress => Ingress::API_VERSION,
            ResourceKind::HelmRelease => "helm.toolkit.fluxcd.io/v2",
            ResourceKind::RandomPassword => ENGINE_API_VERSION,
            ResourceKind::Custom { api_version, .. } => api_version,
        }
    }

    pub fn kind(&self) -> &str {
        match self {
            ResourceKind::Namespace => Namespace::KIND,
            ResourceKind::Secret => Secret::KIND,
            ResourceKind::Deployment => Deployment::KIND,
            ResourceKind::HorizontalPodAutoscaler => HorizontalPodAutoscaler::KIND,
            ResourceKind::Role => Role::KIND,
            ResourceKind::RoleBinding => RoleBinding::KIND,
            ResourceKind::Service => Service::KIND,
            ResourceKind::Ingress => Ingress::KIND,
            ResourceKind::HelmRelease => "HelmRelease",
            ResourceKind::RandomPassword => "RandomPassword",
            ResourceKind::Custom { kind, .. } => kind,
        }
    }

    /// Skeleton manifest with `apiVersion`, `kind` and `metadata`.
    pub fn manifest(&self, name: &str, namespace: Option<&str>) -> Value {
        let mut metadata = json!({ "name": name });
        if let Some(namespace) = namespace {
            metadata["namespace"] = json!(namespace);
        }
        json!({
            "apiVersion": self.api_version(),
            "kind": self.kind(),
            "metadata": metadata,
        })
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind())
    }
}

/// Stable logical identity of an emitted resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceRef {
    pub kind: ResourceKind,
    pub name: String,
    pub namespace: Option<String>,
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(namespace) => write!(f, "{}/{}/{}", self.kind, namespace, self.name),
            None => write!(f, "{}/{}", self.kind, self.name),
        }
    }
}

/// A resource the composition wants the provisioning engine to create.
#[derive(Debug, Clone)]
pub struct ResourceSpec {
    pub kind: ResourceKind,
    pub name: String,
    pub namespace: Option<String>,
    /// Desired document, possibly depending on values not yet known.
    pub body: Deferred<Value>,
    /// Resources that must exist before this one.
    pub depends_on: Vec<ResourceRef>,
    /// JSON pointers the engine must not reconcile after creation.
    pub ignore_changes: Vec<String>,
}

impl ResourceSpec {
    pub fn new(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            namespace: None,
            body: Deferred::known(Value::Null),
            depends_on: Vec::new(),
            ignore_changes: Vec::new(),
        }
    }

    pub fn in_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Deferred::known(body);
        self
    }

    pub fn with_deferred_body(mut self, body: Deferred<Value>) -> Self {
        self.body = body;
        self
    }

    pub fn depends_on(mut self, resource: &ResourceRef) -> Self {
        self.depends_on.push(resource.clone());
        self
    }

    pub fn ignore_changes(mut self, pointer: impl Into<String>) -> Self {
        self.ignore_changes.push(pointer.into());
        self
    }

    pub fn reference(&self) -> ResourceRef {
        ResourceRef {
            kind: self.kind.clone(),
            name: self.name.clone(),
            namespace: self.namespace.clone(),
        }
    }
}

/// Handle to a registered resource.
#[derive(Debug, Clone)]
pub struct ResourceHandle {
    pub reference: ResourceRef,
    /// Live document as reported by the engine once the resource exists.
    pub outputs: Deferred<Value>,
}

impl ResourceHandle {
    pub fn new(reference: ResourceRef, outputs: Deferred<Value>) -> Self {
        Self { reference, outputs }
    }

    pub fn name(&self) -> &str {
        &self.reference.name
    }

    /// Value at a JSON pointer of the live document, `null` when absent.
    pub fn output(&self, pointer: &str) -> Deferred<Value> {
        let pointer = pointer.to_string();
        self.outputs
            .map(move |doc| doc.pointer(&pointer).cloned().unwrap_or(Value::Null))
    }

    /// String at a JSON pointer of the live document.
    pub fn output_string(&self, pointer: &str) -> Deferred<String> {
        let pointer = pointer.to_string();
        let label = format!("{}#{}", self.reference, pointer);
        self.outputs.try_map(move |doc| {
            doc.pointer(&pointer)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| Unresolved::new(label))
        })
    }
}
