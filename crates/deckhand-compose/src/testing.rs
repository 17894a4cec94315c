//! Test platform and helpers shared by the composer tests.

use deckhand_core::{
    CicdProvider, Cluster, Deferred, Error, ExposedService, ExposedServiceArgs, FactoryContext,
    PlatformContext, ResourceKind, ResourceSpec, Result, ServiceAccountRef, ServiceExposer,
    StorageTier,
};
use serde_json::json;
use std::sync::{Arc, Mutex};

use crate::plan::PlanEngine;
use crate::registry::Factory;

/// Records exposure requests and emits one Service per request.
#[derive(Default)]
pub struct RecordingExposer {
    pub calls: Mutex<Vec<ExposedServiceArgs>>,
}

impl ServiceExposer for RecordingExposer {
    fn expose_service(
        &self,
        cluster: &Cluster,
        args: ExposedServiceArgs,
    ) -> Result<ExposedService> {
        let service = cluster.emit(
            ResourceSpec::new(ResourceKind::Service, &args.name)
                .in_namespace(&args.namespace)
                .with_body(json!({"port": args.container_port}))
                .depends_on(&args.workload),
        )?;
        let hosts: Vec<String> = args.ingress.domains.iter().map(|d| d.host()).collect();
        self.calls.lock().unwrap().push(args);
        Ok(ExposedService {
            details: json!({"hosts": hosts}),
            resources: vec![service.reference],
        })
    }
}

pub enum CicdMode {
    Account(ServiceAccountRef),
    Decline,
    Fail,
}

impl CicdProvider for CicdMode {
    fn deploy_service_account(
        &self,
        _cluster: &Cluster,
    ) -> Result<Option<Deferred<ServiceAccountRef>>> {
        match self {
            CicdMode::Account(account) => Ok(Some(Deferred::known(account.clone()))),
            CicdMode::Decline => Ok(None),
            CicdMode::Fail => Err(Error::Platform("identity service unavailable".to_string())),
        }
    }
}

#[derive(Default)]
pub struct TestPlatform {
    pub exposer: Option<RecordingExposer>,
    pub cicd: Option<CicdMode>,
}

impl TestPlatform {
    pub fn with_exposer(mut self) -> Self {
        self.exposer = Some(RecordingExposer::default());
        self
    }

    pub fn with_cicd(mut self, mode: CicdMode) -> Self {
        self.cicd = Some(mode);
        self
    }
}

impl PlatformContext for TestPlatform {
    fn storage_class(&self, _cluster: &Cluster, tier: StorageTier) -> Result<String> {
        Ok(format!("test-{}", tier))
    }

    fn service_exposer(&self) -> Option<&dyn ServiceExposer> {
        self.exposer.as_ref().map(|e| e as &dyn ServiceExposer)
    }

    fn cicd(&self) -> Option<&dyn CicdProvider> {
        self.cicd.as_ref().map(|c| c as &dyn CicdProvider)
    }
}

pub fn deployer_account() -> ServiceAccountRef {
    ServiceAccountRef {
        name: "deployer".to_string(),
        namespace: "ci".to_string(),
    }
}

pub fn test_cluster() -> (Arc<PlanEngine>, Cluster) {
    let engine = Arc::new(PlanEngine::new());
    let cluster = Cluster::new("test", engine.clone());
    (engine, cluster)
}

pub fn test_context(platform: TestPlatform) -> FactoryContext {
    Factory::new(Arc::new(platform)).context().clone()
}
