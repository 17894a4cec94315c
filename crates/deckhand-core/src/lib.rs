//! Core domain types and traits for Deckhand.
//!
//! This crate contains:
//! - Error taxonomy for composition failures
//! - Deep merge of default documents with caller overrides
//! - Deferred values resolved later by a provisioning engine
//! - Resource specifications, references and handles
//! - Application and deployment configuration types
//! - Platform context and service constructor traits

pub mod application;
pub mod cluster;
pub mod context;
pub mod deferred;
pub mod error;
pub mod merge;
pub mod provisioner;
pub mod resource;

pub use application::{
    Application, DeploymentConfig, Domain, EnvMap, Environment, HealthCheck, ResolvedServices,
    ScalerSpec, Toggle,
};
pub use cluster::Cluster;
pub use context::{
    CicdProvider, ExposedService, ExposedServiceArgs, FactoryContext, IngressSpec,
    PlatformContext, ServiceAccountRef, ServiceConstructor, ServiceContext, ServiceExposer,
    ServiceMap, ServiceResult, StorageTier,
};
pub use deferred::{Deferred, Resolver, Unresolved};
pub use error::{Error, Result};
pub use merge::{merge, merge_into};
pub use provisioner::Provisioner;
pub use resource::{ResourceHandle, ResourceKind, ResourceRef, ResourceSpec};
