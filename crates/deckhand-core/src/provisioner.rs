//! Boundary to the provisioning engine.

use crate::Result;
use crate::resource::{ResourceHandle, ResourceSpec};

/// Accepts resource specifications for later provisioning.
///
/// Registering never waits for the resource to exist: the returned handle's
/// outputs resolve once the engine has created it. Implementations decide
/// ordering, parallelism and retries from the declared dependencies.
pub trait Provisioner: Send + Sync {
    /// Name of this provisioner.
    fn name(&self) -> &'static str;

    /// Register a resource and get a handle to its future outputs.
    fn register(&self, spec: ResourceSpec) -> Result<ResourceHandle>;
}
