//! CI/CD access composition.
//!
//! Grants the platform's deploy identity a namespace-scoped role that can
//! watch workloads, roll them and run one-off jobs.

use deckhand_core::{
    Cluster, Deferred, FactoryContext, ResourceHandle, ResourceKind, ResourceSpec, Result,
    ServiceAccountRef, merge_into,
};
use serde_json::{Value, json};
use tracing::info;

const READ_VERBS: [&str; 3] = ["get", "list", "watch"];
const UPDATE_VERBS: [&str; 5] = ["get", "list", "watch", "update", "patch"];
const LIFECYCLE_VERBS: [&str; 6] = ["get", "list", "watch", "create", "update", "delete"];

/// Result of CI/CD composition.
#[derive(Debug, Clone)]
pub enum CicdOutcome {
    /// The platform offers no deploy identity.
    Skipped,
    Bound(CicdBinding),
}

/// Role and binding granted to the deploy identity.
#[derive(Debug, Clone)]
pub struct CicdBinding {
    pub role: ResourceHandle,
    pub binding: ResourceHandle,
    pub subject: Deferred<ServiceAccountRef>,
}

impl CicdOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, CicdOutcome::Skipped)
    }

    pub fn binding(&self) -> Option<&CicdBinding> {
        match self {
            CicdOutcome::Skipped => None,
            CicdOutcome::Bound(binding) => Some(binding),
        }
    }

    /// `{"skipped": true}` or `{"role": {"name": ..., "subjects": ...}}`.
    ///
    /// `subjects` is `"deferred"` while the deploy identity is still unknown.
    pub fn summary(&self) -> Value {
        match self {
            CicdOutcome::Skipped => json!({ "skipped": true }),
            CicdOutcome::Bound(binding) => {
                let subjects = match binding.subject.peek() {
                    Some(account) => json!([{
                        "kind": "ServiceAccount",
                        "name": account.name,
                        "namespace": account.namespace,
                    }]),
                    None => json!("deferred"),
                };
                json!({ "role": { "name": binding.role.name(), "subjects": subjects } })
            }
        }
    }
}

/// Bind the platform's deploy identity to a least-privilege role in `namespace`.
///
/// Emits a role and a binding, or nothing when the platform has no CI/CD
/// support or declines to name an identity for this cluster.
pub fn compose_cicd(
    application_name: &str,
    namespace: &str,
    cluster: &Cluster,
    context: &FactoryContext,
) -> Result<CicdOutcome> {
    let Some(provider) = context.platform.cicd() else {
        info!(application = %application_name, "Platform has no CI/CD support, skipping");
        return Ok(CicdOutcome::Skipped);
    };

    let Some(subject) = provider.deploy_service_account(cluster)? else {
        info!(application = %application_name, "No deploy identity for cluster, skipping CI/CD");
        return Ok(CicdOutcome::Skipped);
    };

    let name = format!("{}-deployer", application_name);

    let mut role_body = ResourceKind::Role.manifest(&name, Some(namespace));
    merge_into(&mut role_body, json!({ "rules": deployer_rules() }));
    let role = cluster.emit(
        ResourceSpec::new(ResourceKind::Role, &name)
            .in_namespace(namespace)
            .with_body(role_body),
    )?;

    let binding_base = ResourceKind::RoleBinding.manifest(&name, Some(namespace));
    let role_name = name.clone();
    let binding_body = subject.map(move |account| {
        let mut body = binding_base;
        merge_into(
            &mut body,
            json!({
                "roleRef": {
                    "apiGroup": "rbac.authorization.k8s.io",
                    "kind": ResourceKind::Role.kind(),
                    "name": role_name,
                },
                "subjects": [{
                    "kind": "ServiceAccount",
                    "name": account.name,
                    "namespace": account.namespace,
                }],
            }),
        );
        body
    });
    let binding = cluster.emit(
        ResourceSpec::new(ResourceKind::RoleBinding, &name)
            .in_namespace(namespace)
            .with_deferred_body(binding_body)
            .depends_on(&role.reference),
    )?;

    info!(application = %application_name, role = %name, "Bound deploy identity");

    Ok(CicdOutcome::Bound(CicdBinding {
        role,
        binding,
        subject,
    }))
}

fn deployer_rules() -> Value {
    json!([
        {
            "apiGroups": ["apps"],
            "resources": ["deployments", "replicasets", "statefulsets"],
            "verbs": UPDATE_VERBS,
        },
        {
            "apiGroups": [""],
            "resources": ["pods", "pods/log"],
            "verbs": READ_VERBS,
        },
        {
            "apiGroups": ["batch"],
            "resources": ["cronjobs"],
            "verbs": UPDATE_VERBS,
        },
        {
            "apiGroups": ["batch"],
            "resources": ["jobs"],
            "verbs": LIFECYCLE_VERBS,
        },
    ])
}
