//! Target cluster identity.

use std::fmt;
use std::sync::Arc;

use crate::Result;
use crate::provisioner::Provisioner;
use crate::resource::{ResourceHandle, ResourceSpec};

/// Target environment of a composition plus the provisioner used to emit
/// resources into it. Shared read-only by every composed unit.
#[derive(Clone)]
pub struct Cluster {
    pub platform: String,
    provisioner: Arc<dyn Provisioner>,
}

impl Cluster {
    pub fn new(platform: impl Into<String>, provisioner: Arc<dyn Provisioner>) -> Self {
        Self {
            platform: platform.into(),
            provisioner,
        }
    }

    /// Register a resource with this cluster's provisioner.
    pub fn emit(&self, spec: ResourceSpec) -> Result<ResourceHandle> {
        self.provisioner.register(spec)
    }
}

impl fmt::Debug for Cluster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cluster")
            .field("platform", &self.platform)
            .field("provisioner", &self.provisioner.name())
            .finish()
    }
}
