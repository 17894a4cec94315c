//! In-memory plan engine.
//!
//! Records every registered resource and, on [`PlanEngine::apply`], resolves
//! all bodies concurrently. Each resource publishes its live document to its
//! dependants as soon as its own body is known, so registration order does
//! not matter. Nothing is sent to a real cluster.

use deckhand_core::{
    Deferred, Error, Provisioner, Resolver, ResourceHandle, ResourceKind, ResourceRef,
    ResourceSpec, Result,
};
use futures::future;
use serde::Serialize;
use serde_json::{Value, json};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};
use uuid::Uuid;

/// Length of generated passwords when the body does not set one.
const DEFAULT_PASSWORD_LENGTH: usize = 32;

/// A resource with its body fully resolved.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedResource {
    pub resource: ResourceRef,
    pub body: Value,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<ResourceRef>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ignore_changes: Vec<String>,
}

struct Registration {
    spec: ResourceSpec,
    resolver: Resolver<Value>,
}

/// Provisioner that plans resources instead of creating them.
#[derive(Default)]
pub struct PlanEngine {
    registrations: Mutex<Vec<Registration>>,
}

impl PlanEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<Registration>>> {
        self.registrations
            .lock()
            .map_err(|_| Error::Provisioner("plan engine state poisoned".to_string()))
    }

    /// References of everything registered and not yet applied, in order.
    pub fn resources(&self) -> Result<Vec<ResourceRef>> {
        Ok(self.lock()?.iter().map(|r| r.spec.reference()).collect())
    }

    /// Number of pending resources of the given kind.
    pub fn count(&self, kind: &ResourceKind) -> Result<usize> {
        Ok(self.resources()?.iter().filter(|r| &r.kind == kind).count())
    }

    /// Resolve every registered resource, returning them in registration order.
    pub async fn apply(&self) -> Result<Vec<PlannedResource>> {
        let registrations = std::mem::take(&mut *self.lock()?);
        info!(resources = registrations.len(), "Applying plan");

        let applies = registrations.into_iter().map(|Registration { spec, resolver }| async move {
            let reference = spec.reference();
            let body = spec.body.resolve().await?;
            resolver.resolve(live_document(&spec.kind, &body));
            debug!(resource = %reference, "Resolved resource");
            Ok::<_, Error>(PlannedResource {
                resource: reference,
                body,
                depends_on: spec.depends_on,
                ignore_changes: spec.ignore_changes,
            })
        });

        future::try_join_all(applies).await
    }
}

impl Provisioner for PlanEngine {
    fn name(&self) -> &'static str {
        "plan"
    }

    fn register(&self, spec: ResourceSpec) -> Result<ResourceHandle> {
        let reference = spec.reference();
        let mut registrations = self.lock()?;

        let known = |wanted: &ResourceRef| {
            registrations
                .iter()
                .any(|r| r.spec.reference() == *wanted)
        };
        if known(&reference) {
            return Err(Error::Provisioner(format!(
                "resource {} registered twice",
                reference
            )));
        }
        if let Some(missing) = spec.depends_on.iter().find(|dep| !known(dep)) {
            return Err(Error::Provisioner(format!(
                "resource {} depends on unknown resource {}",
                reference, missing
            )));
        }

        let (outputs, resolver) = Deferred::pending(reference.to_string());
        debug!(resource = %reference, "Registered resource");
        registrations.push(Registration { spec, resolver });

        Ok(ResourceHandle::new(reference, outputs))
    }
}

/// What the engine reports back for a created resource.
fn live_document(kind: &ResourceKind, body: &Value) -> Value {
    let mut live = body.clone();
    if *kind == ResourceKind::RandomPassword {
        let length = body
            .pointer("/spec/length")
            .and_then(Value::as_u64)
            .and_then(|len| usize::try_from(len).ok())
            .unwrap_or(DEFAULT_PASSWORD_LENGTH);
        live["result"] = json!(generate_password(length));
    }
    live
}

fn generate_password(length: usize) -> String {
    let mut password = String::with_capacity(length);
    while password.len() < length {
        password.push_str(&Uuid::new_v4().simple().to_string());
    }
    password.truncate(length);
    password
}
