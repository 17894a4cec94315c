//! Application composition for Deckhand.
//!
//! Turns an [`Application`](deckhand_core::Application) into a graph of
//! resource specifications:
//! - Service registry with the built-in cache service
//! - Deployment, autoscaler and CI/CD composers
//! - Application orchestrator
//! - In-memory plan engine for dry runs

pub mod cicd;
pub mod deployment;
pub mod orchestrator;
pub mod plan;
pub mod redis;
pub mod registry;
pub mod scaler;

#[cfg(test)]
pub(crate) mod testing;

pub use cicd::{CicdBinding, CicdOutcome, compose_cicd};
pub use deployment::{ComposedDeployment, compose_deployment};
pub use orchestrator::{Composition, compose_application};
pub use plan::{PlanEngine, PlannedResource};
pub use redis::RedisService;
pub use registry::{Factory, builtin_services};
pub use scaler::{ComposedScaler, compose_scaler};
